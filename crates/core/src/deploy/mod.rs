//! Deployment driver: applies and removes a project's workload.
//!
//! [`DeploymentDriver`] is the seam the reconciler talks to. [`HelmDriver`]
//! implements it by running helm and kubectl through a [`CommandRunner`].
//! Every operation validates the identity before building any argument.

pub mod args;
pub mod command;
pub mod helm;

use async_trait::async_trait;

use crate::identity::{IdentityError, ProjectIdentity};
use crate::status::SessionStatus;
use crate::types::DbId;

pub use command::{CommandError, CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use helm::{DriverConfig, HelmDriver};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),

    #[error("{operation} timed out after {elapsed_ms}ms: {output}")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
        output: String,
    },

    #[error("{operation} failed with exit code {exit_code}: {output}")]
    CommandFailed {
        operation: &'static str,
        exit_code: i32,
        output: String,
    },

    #[error("{operation} could not run: {source}")]
    Spawn {
        operation: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("unparseable helm status output: {0}")]
    StatusParse(String),
}

impl DeployError {
    /// Wrap a runner failure, keeping any diagnostic output it captured.
    pub(crate) fn from_command(operation: &'static str, err: CommandError) -> Self {
        match err {
            CommandError::Timeout {
                elapsed_ms, output, ..
            } => DeployError::Timeout {
                operation,
                elapsed_ms,
                output,
            },
            other => DeployError::Spawn {
                operation,
                source: other,
            },
        }
    }

    /// Diagnostic text the tool produced, if any.
    pub fn diagnostic_output(&self) -> Option<&str> {
        match self {
            Self::Timeout { output, .. } | Self::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Validate a raw identity the way every driver operation does.
pub fn validate_identity(raw: &str) -> Result<ProjectIdentity, DeployError> {
    Ok(ProjectIdentity::parse(raw)?)
}

/// Applies and tears down the workload for a project identity.
///
/// Identities arrive raw; implementations must reject malformed ones with
/// [`DeployError::InvalidIdentity`] before any external call.
#[async_trait]
pub trait DeploymentDriver: Send + Sync {
    /// Install or upgrade in place, creating the namespace if absent.
    async fn apply(
        &self,
        identity: &str,
        owner_project_id: DbId,
        owner_user_id: DbId,
    ) -> Result<(), DeployError>;

    /// Uninstall the release. Succeeds if it is already gone. The namespace
    /// is left in place.
    async fn remove(&self, identity: &str) -> Result<(), DeployError>;

    /// Current release state, already translated.
    async fn status(&self, identity: &str) -> Result<SessionStatus, DeployError>;

    /// Delete the namespace itself. Slow; never part of [`remove`](Self::remove).
    async fn release_namespace(&self, identity: &str) -> Result<(), DeployError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
