//! Purpose: Library crate behind the `bakehouse` CLI, embedders, and tests.
//! Exports: `core` (targets, ids, errors), `api` (providers, ops, client), `serve`.
//! Role: Region storage engine plus the HTTP transport that exposes it.
//! Invariants: Core modules perform no network I/O; `api` owns all transport use.
//! Invariants: Every fallible operation returns `core::error::Error` with a stable kind.
pub mod api;
pub mod core;
pub mod serve;
