//! Core traits and types for the FLoM lock manager engine.

pub mod error;
pub mod message;
pub mod mode;
pub mod prelude;
pub mod sink;
pub mod timeout;
pub mod traits;

pub use error::{FlomError, FlomResult};
pub use prelude::*;
