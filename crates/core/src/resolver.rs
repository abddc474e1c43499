//! Endpoint resolution for deployed workloads.
//!
//! Looks up the front-door service address and expands it into an
//! [`EndpointSet`]. A failed or empty lookup is not an error: the workload
//! may still be starting, so the resolver returns an unresolved set and
//! leaves retrying to the caller.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::deploy::args;
use crate::deploy::command::CommandRunner;
use crate::endpoints::EndpointSet;
use crate::identity::ProjectIdentity;

/// Bound on a single address lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Values kubectl prints when a service has no address.
const SENTINEL_ADDRESSES: &[&str] = &["", "<none>", "None"];

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("workload {workload_name} does not belong to project {identity}")]
    WorkloadMismatch {
        identity: String,
        workload_name: String,
    },
}

#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Current endpoints of `workload_name`. `resolved` is `false` when no
    /// usable address was found.
    async fn resolve(
        &self,
        identity: &ProjectIdentity,
        workload_name: &str,
    ) -> Result<EndpointSet, ResolveError>;
}

/// Resolves the front-door cluster IP with `kubectl get service`.
pub struct KubectlResolver {
    kubectl_bin: String,
    runner: Arc<dyn CommandRunner>,
}

impl KubectlResolver {
    pub fn new(kubectl_bin: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            kubectl_bin: kubectl_bin.into(),
            runner,
        }
    }
}

#[async_trait]
impl EndpointResolver for KubectlResolver {
    async fn resolve(
        &self,
        identity: &ProjectIdentity,
        workload_name: &str,
    ) -> Result<EndpointSet, ResolveError> {
        if workload_name != identity.release_name() {
            return Err(ResolveError::WorkloadMismatch {
                identity: identity.to_string(),
                workload_name: workload_name.to_string(),
            });
        }

        let spec = args::kubectl_front_door_ip(&self.kubectl_bin, identity);
        let output = match self.runner.run(&spec, LOOKUP_TIMEOUT).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                tracing::warn!(
                    workload = workload_name,
                    exit_code = output.exit_code,
                    output = %output.combined(),
                    "Front-door lookup failed, endpoints left unresolved"
                );
                return Ok(EndpointSet::unresolved());
            }
            Err(e) => {
                tracing::warn!(workload = workload_name, error = %e, "Front-door lookup failed, endpoints left unresolved");
                return Ok(EndpointSet::unresolved());
            }
        };

        match parse_address(&output.stdout) {
            Some(address) => {
                tracing::info!(workload = workload_name, %address, "Resolved session endpoints");
                Ok(EndpointSet::at(&host_for(address)))
            }
            None => {
                tracing::warn!(
                    workload = workload_name,
                    raw = output.stdout.trim(),
                    "Front-door has no address yet"
                );
                Ok(EndpointSet::unresolved())
            }
        }
    }
}

/// Parse kubectl's jsonpath output into an IP, rejecting sentinels.
fn parse_address(raw: &str) -> Option<IpAddr> {
    let trimmed = raw.trim();
    if SENTINEL_ADDRESSES.contains(&trimmed) {
        return None;
    }
    trimmed.parse().ok()
}

/// Address as it appears in a URL authority.
fn host_for(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
