//! The ordered access-level vocabulary shared by every access decision.
//!
//! `none < read < edit < create`. A higher level implies every lower one, and
//! delete rights are granted at the `create` tier.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::AccessError;

/// Per-page, per-role access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    Edit,
    Create,
}

impl AccessLevel {
    /// Every level, lowest first.
    pub const ALL: [AccessLevel; 4] = [Self::None, Self::Read, Self::Edit, Self::Create];

    /// Position in the hierarchy: `none = 0` through `create = 3`.
    pub const fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Read => 1,
            Self::Edit => 2,
            Self::Create => 3,
        }
    }

    /// `true` when holding `self` is enough for an operation that needs `need`.
    pub const fn satisfies(self, need: AccessLevel) -> bool {
        self.rank() >= need.rank()
    }

    /// Wire token for this level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Create => "create",
        }
    }

    /// Interpret a level read back from storage.
    ///
    /// Unknown tokens never widen access: they resolve to `none` and are logged.
    pub fn from_stored(raw: &str) -> Self {
        match raw.parse() {
            Ok(level) => level,
            Err(_) => {
                warn!(value = %raw, "Unknown stored access level; treating as none");
                counter!("accessgate_unknown_levels_total").increment(1);
                Self::None
            }
        }
    }
}

/// Free-function form of [`AccessLevel::satisfies`].
pub const fn satisfies(have: AccessLevel, need: AccessLevel) -> bool {
    have.satisfies(need)
}

impl PartialOrd for AccessLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccessLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse used on every write path. Only the four canonical tokens are accepted.
impl FromStr for AccessLevel {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "read" => Ok(Self::Read),
            "edit" => Ok(Self::Edit),
            "create" => Ok(Self::Create),
            other => Err(AccessError::unknown_access_level(other)),
        }
    }
}
