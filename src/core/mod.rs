// Core modules implementing identifiers, storage targets, allocation, and error modeling.
pub mod alloc;
pub mod error;
pub mod ids;
pub mod target;
