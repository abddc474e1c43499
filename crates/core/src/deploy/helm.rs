//! Helm-backed [`DeploymentDriver`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::status::{translate, SessionStatus};
use crate::types::DbId;

use super::args::{self, DeploymentDescriptor};
use super::command::{CommandOutput, CommandRunner, CommandSpec};
use super::{validate_identity, DeployError, DeploymentDriver};

/// Default location of the workload chart.
pub const DEFAULT_CHART_PATH: &str = "./helm/dev-session-template";

/// Default bound on `--wait` for install, upgrade and uninstall.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Extra time the process gets beyond helm's own `--timeout`, so helm's
/// diagnostics arrive before we kill it.
const KILL_GRACE: Duration = Duration::from_secs(30);

/// Bound on quick queries (`helm status`, namespace deletion).
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub helm_bin: String,
    pub kubectl_bin: String,
    pub chart_path: String,
    pub timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            helm_bin: "helm".to_string(),
            kubectl_bin: "kubectl".to_string(),
            chart_path: DEFAULT_CHART_PATH.to_string(),
            timeout: DEFAULT_DEPLOY_TIMEOUT,
        }
    }
}

/// Subset of `helm status --output json`.
#[derive(Debug, Deserialize)]
struct HelmStatus {
    info: HelmStatusInfo,
}

#[derive(Debug, Deserialize)]
struct HelmStatusInfo {
    status: String,
}

pub struct HelmDriver {
    config: DriverConfig,
    runner: Arc<dyn CommandRunner>,
}

impl HelmDriver {
    pub fn new(config: DriverConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Run `spec`, turning timeouts and non-zero exits into [`DeployError`].
    async fn exec(
        &self,
        operation: &'static str,
        spec: CommandSpec,
        timeout: Duration,
    ) -> Result<CommandOutput, DeployError> {
        tracing::debug!(command = %spec, "Running {operation}");
        let output = self
            .runner
            .run(&spec, timeout)
            .await
            .map_err(|e| DeployError::from_command(operation, e))?;

        if !output.success() {
            return Err(DeployError::CommandFailed {
                operation,
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl DeploymentDriver for HelmDriver {
    async fn apply(
        &self,
        identity: &str,
        owner_project_id: DbId,
        owner_user_id: DbId,
    ) -> Result<(), DeployError> {
        let descriptor = DeploymentDescriptor {
            identity: validate_identity(identity)?,
            owner_project_id,
            owner_user_id,
        };
        let release = descriptor.identity.release_name();
        tracing::info!(
            release = %release,
            namespace = %descriptor.identity.namespace(),
            owner_project_id,
            owner_user_id,
            "Applying dev session release"
        );

        let spec = args::helm_apply(&self.config, &descriptor);
        match self
            .exec("helm upgrade", spec, self.config.timeout + KILL_GRACE)
            .await
        {
            Ok(output) => {
                tracing::info!(release = %release, duration_ms = output.duration_ms, "Release applied");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    release = %release,
                    error = %e,
                    output = e.diagnostic_output().unwrap_or_default(),
                    "Failed to apply release"
                );
                Err(e)
            }
        }
    }

    async fn remove(&self, identity: &str) -> Result<(), DeployError> {
        let identity = validate_identity(identity)?;
        let release = identity.release_name();
        tracing::info!(release = %release, namespace = %identity.namespace(), "Removing dev session release");

        let spec = args::helm_uninstall(&self.config, &identity);
        match self
            .exec("helm uninstall", spec, self.config.timeout + KILL_GRACE)
            .await
        {
            Ok(_) => {
                tracing::info!(release = %release, "Release removed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    release = %release,
                    error = %e,
                    output = e.diagnostic_output().unwrap_or_default(),
                    "Failed to remove release"
                );
                Err(e)
            }
        }
    }

    async fn status(&self, identity: &str) -> Result<SessionStatus, DeployError> {
        let identity = validate_identity(identity)?;
        let spec = args::helm_status(&self.config, &identity);
        let output = self.exec("helm status", spec, QUERY_TIMEOUT).await?;

        let parsed: HelmStatus = serde_json::from_str(output.stdout.trim())
            .map_err(|e| DeployError::StatusParse(e.to_string()))?;
        let status = translate(&parsed.info.status);
        tracing::debug!(
            release = %identity.release_name(),
            helm_status = %parsed.info.status,
            %status,
            "Sampled release status"
        );
        Ok(status)
    }

    async fn release_namespace(&self, identity: &str) -> Result<(), DeployError> {
        let identity = validate_identity(identity)?;
        tracing::info!(namespace = %identity.namespace(), "Deleting session namespace");
        let spec = args::kubectl_delete_namespace(&self.config, &identity);
        self.exec("kubectl delete namespace", spec, QUERY_TIMEOUT)
            .await
            .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
