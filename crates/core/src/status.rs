//! Session status values and the helm status translator.
//!
//! The string constants must match the CHECK constraint on
//! `dev_sessions.status`.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_ERROR: &str = "error";

/// All valid session status strings.
pub const VALID_STATUSES: &[&str] = &[STATUS_PENDING, STATUS_RUNNING, STATUS_STOPPED, STATUS_ERROR];

/// Lifecycle state of a dev session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Stopped,
    Error,
}

impl SessionStatus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            STATUS_PENDING => Ok(Self::Pending),
            STATUS_RUNNING => Ok(Self::Running),
            STATUS_STOPPED => Ok(Self::Stopped),
            STATUS_ERROR => Ok(Self::Error),
            _ => Err(format!(
                "Invalid session status '{s}'. Must be one of: {}",
                VALID_STATUSES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::Running => STATUS_RUNNING,
            Self::Stopped => STATUS_STOPPED,
            Self::Error => STATUS_ERROR,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw helm release status onto [`SessionStatus`].
///
/// Total over every input. Anything outside the known vocabulary is
/// `Error`: an unknown state must never present as `Running`.
pub fn translate(raw: &str) -> SessionStatus {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "deployed" | "succeeded" => SessionStatus::Running,
        "installing" | "upgrading" => SessionStatus::Pending,
        "failed" => SessionStatus::Error,
        "uninstalling" | "uninstalled" => SessionStatus::Stopped,
        s if s.starts_with("pending-") => SessionStatus::Pending,
        _ => SessionStatus::Error,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
