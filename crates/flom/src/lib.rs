//! Resource locking engine of the FLoM distributed lock manager.
//!
//! Clients name a resource and ask for a lock on it; the engine grants the
//! lock, queues the request, or tells the client it is busy. When a holder
//! goes away the queue is rescanned and every request that became
//! satisfiable is granted through an [`AnswerSink`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flom::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = ChannelSink::new();
//!     let mut answers = sink.register(ConnectionId(1));
//!
//!     let mut registry = ResourceRegistry::new(RegistryConfig::default())?;
//!     let outcome = registry.handle_message(
//!         &LockSpec::new("printer").into(),
//!         ConnectionId(1),
//!         &sink,
//!     )?;
//!     assert!(outcome.answer.map_or(false, |a| a.is_granted()));
//!
//!     registry.handle_message(&UnlockSpec::new("printer").into(), ConnectionId(1), &sink)?;
//!     registry.on_disconnect(ConnectionId(1), &sink);
//!     assert!(answers.try_recv().is_err());
//!     Ok(())
//! }
//! ```
//!
//! # Resource Kinds
//!
//! The name decides the kind:
//!
//! | name | kind |
//! |------|------|
//! | `printer` | simple lock with NL, CR, CW, PR, PW and EX modes |
//! | `pool[3]` | numeric pool of three units |
//! | `/dir/file` | hierarchical path |
//! | `_s_ids[2]`, `_S_ids[2]` | sequence, transactional with `_S_` |
//! | `_t_%Y%m%d%H%M%S#fff` | timestamp generator |
//! | `red.green.blue` | set of named elements |
//!
//! # Timers
//!
//! Timestamp resources can only serve one request per interval. When a
//! request has to wait for the next interval, the outcome carries a
//! deadline; the host calls [`ResourceRegistry::on_timeout`] once it has
//! passed. A request waiting for a holder slot has no deadline: the release
//! of that slot serves it.
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `flom-core`: requests, answers, lock modes, errors and host traits
//! - `flom-resource`: resource kinds, the reactivation logic and the registry
//!
//! For fine-grained control, you can depend on individual crates instead.

// Re-export core types and traits
pub use flom_core::*;

// Re-export the engine
#[allow(ambiguous_glob_reexports)]
pub use flom_resource::*;
