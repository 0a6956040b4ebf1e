//! Lock modes and their compatibility table.
//!
//! The six modes come from the VMS distributed lock manager and are ordered
//! from the least to the most restrictive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::FlomError;

/// Lock mode asked for a simple or hierarchical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LockMode {
    /// NL: null lock, only signals interest.
    Null,
    /// CR: concurrent read.
    ConcurrentRead,
    /// CW: concurrent write.
    ConcurrentWrite,
    /// PR: protected read (shared).
    ProtectedRead,
    /// PW: protected write (update).
    ProtectedWrite,
    /// EX: exclusive.
    #[default]
    Exclusive,
}

/// Number of lock modes.
pub const LOCK_MODE_COUNT: usize = 6;

/// `COMPATIBILITY[held][requested]`.
const COMPATIBILITY: [[bool; LOCK_MODE_COUNT]; LOCK_MODE_COUNT] = [
    //  NL    CR     CW     PR     PW     EX
    [true, true, true, true, true, true],     // NL
    [true, true, true, true, true, false],    // CR
    [true, true, true, false, false, false],  // CW
    [true, true, false, true, false, false],  // PR
    [true, true, false, false, false, false], // PW
    [true, false, false, false, false, false], // EX
];

impl LockMode {
    /// All modes, least restrictive first.
    pub const ALL: [LockMode; LOCK_MODE_COUNT] = [
        LockMode::Null,
        LockMode::ConcurrentRead,
        LockMode::ConcurrentWrite,
        LockMode::ProtectedRead,
        LockMode::ProtectedWrite,
        LockMode::Exclusive,
    ];

    /// Position of the mode in [`LockMode::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Two-letter code of the mode.
    pub fn code(self) -> &'static str {
        match self {
            LockMode::Null => "NL",
            LockMode::ConcurrentRead => "CR",
            LockMode::ConcurrentWrite => "CW",
            LockMode::ProtectedRead => "PR",
            LockMode::ProtectedWrite => "PW",
            LockMode::Exclusive => "EX",
        }
    }

    /// Can a lock in this mode be granted while `held` is already granted?
    pub fn is_compatible_with(self, held: LockMode) -> bool {
        compatible(self, held)
    }
}

/// Can `requested` coexist with an already granted `held` lock?
pub fn compatible(requested: LockMode, held: LockMode) -> bool {
    let ok = COMPATIBILITY[held.index()][requested.index()];
    trace!(requested = %requested, held = %held, compatible = ok, "lock table lookup");
    ok
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LockMode {
    type Err = FlomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockMode::ALL
            .into_iter()
            .find(|mode| mode.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| FlomError::Protocol(format!("unknown lock mode '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LockMode::*;

    #[test]
    fn test_null_is_compatible_with_everything() {
        for held in LockMode::ALL {
            assert!(compatible(Null, held));
            assert!(compatible(held, Null));
        }
    }

    #[test]
    fn test_exclusive_only_with_null() {
        for held in LockMode::ALL {
            assert_eq!(compatible(Exclusive, held), held == Null);
        }
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("pw".parse::<LockMode>().unwrap(), ProtectedWrite);
        assert_eq!("EX".parse::<LockMode>().unwrap(), Exclusive);
        assert!("XX".parse::<LockMode>().is_err());
        for mode in LockMode::ALL {
            assert_eq!(mode.to_string().parse::<LockMode>().unwrap(), mode);
        }
    }
}
