pub mod config;
pub mod health;
pub mod matrix;
pub mod nav;
pub mod permissions;
pub mod roles;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Access level tokens accepted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    None,
    Read,
    Edit,
    Create,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Create => "create",
        }
    }
}
