//! Convenience prelude for FLoM engine types.

pub use crate::error::{FlomError, FlomResult};
pub use crate::message::{AnswerKind, AnswerStatus, LockAnswer, LockRequest, LockSpec, UnlockSpec};
pub use crate::mode::{compatible, LockMode};
pub use crate::sink::ChannelSink;
pub use crate::timeout::{Deadline, Timeval};
pub use crate::traits::{AnswerSink, Clock, ConnectionId, SystemClock};
