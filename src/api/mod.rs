//! Purpose: Public API for hosting providers and calling them locally or remotely.
//! Exports: Runtime, providers, region ops, clients, bulk buffers, and core types.
//! Role: The surface used by the CLI, the HTTP server, embedders, and tests.
//! Invariants: Wire shapes live in `wire`; both client and server use them.
//! Invariants: Core storage types are re-exported, never wrapped.

mod bulk;
mod client;
mod ops;
mod provider;
mod runtime;
mod transport;
pub mod wire;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::ids::{REGION_ID_LEN, RegionId, TargetId};
pub use crate::core::target::{PoolOptions, Target, TargetInfo, make_pool};
pub use bulk::{BulkAccess, BulkHandle, BulkRegistry};
pub use client::{Client, DEFAULT_EAGER_LIMIT, ProviderHandle};
pub use ops::{MigratedRegion, MigratedTarget, MigrationDestination};
pub use provider::Provider;
pub use runtime::{Executor, Runtime};
pub use transport::{Transport, resolve_address};
