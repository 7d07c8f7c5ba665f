//! Domain logic shared by every coordination-core binary: cluster
//! membership, shard assignment, succession ordering, the HTTP control
//! plane's client and wire types, and distributed cache routing.
//!
//! This crate has no opinion on role (coordinator/worker/temporary
//! coordinator) or transport framing beyond the wire DTOs — that dispatch
//! lives in `crust` (coordinator-mode handlers) and `stratum` (worker-mode
//! handlers and the unified node entrypoint).

pub mod assign;
pub mod cache;
pub mod env;
pub mod error;
pub mod http_client;
pub mod local_cache;
pub mod model;
pub mod registry;
pub mod shard;
pub mod succession;
pub mod wire;

pub use error::{CoordError, Result};
