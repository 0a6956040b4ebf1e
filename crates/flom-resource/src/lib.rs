//! Resource locking engine for the FLoM lock manager.
//!
//! Every named resource is a [`ResourceState`]: a simple lock with VMS style
//! modes, a numeric pool, a hierarchical tree of paths, a sequence or
//! timestamp generator, or a set of named elements. A [`ResourceRegistry`]
//! creates resources from their names, routes requests to them and cleans up
//! after connections that go away.
//!
//! The engine is synchronous and owns no connection and no timer: grants for
//! former waiters go out through an [`AnswerSink`](flom_core::AnswerSink),
//! and timestamp resources return the deadline at which the host should call
//! [`ResourceRegistry::on_timeout`].

pub mod config;
pub mod hier;
pub mod name;
pub mod numeric;
mod reactivate;
pub mod record;
pub mod registry;
pub mod sequence;
pub mod set;
pub mod simple;
pub mod state;
pub mod timestamp;

pub use config::{RegistryConfig, RegistryConfigBuilder};
pub use name::{split_path, ResourceKind, ResourceSpec};
pub use record::{ConnectionLockRecord, LockInfo};
pub use registry::ResourceRegistry;
pub use state::{MessageOutcome, ResourceState};
