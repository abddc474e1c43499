//! Allow-listed argument vectors for helm and kubectl.
//!
//! Builders accept only typed inputs: a validated [`ProjectIdentity`],
//! numeric owner ids and operator configuration. Each flag is a fixed
//! literal, and each value fills exactly one argv slot.

use crate::identity::ProjectIdentity;
use crate::types::DbId;

use super::command::CommandSpec;
use super::helm::DriverConfig;

/// Parameters for one workload template render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    pub identity: ProjectIdentity,
    pub owner_project_id: DbId,
    pub owner_user_id: DbId,
}

/// `helm upgrade --install`: creates the release or upgrades it in place.
pub fn helm_apply(config: &DriverConfig, descriptor: &DeploymentDescriptor) -> CommandSpec {
    let identity = &descriptor.identity;
    CommandSpec::new(&config.helm_bin)
        .arg("upgrade")
        .arg("--install")
        .arg(identity.release_name())
        .arg(&config.chart_path)
        .arg("--namespace")
        .arg(identity.namespace())
        .arg("--create-namespace")
        .arg("--set")
        .arg(format!("project.uuid={identity}"))
        .arg("--set")
        .arg(format!("project.id={}", descriptor.owner_project_id))
        .arg("--set")
        .arg(format!("user.id={}", descriptor.owner_user_id))
        .arg("--wait")
        .arg("--timeout")
        .arg(helm_duration(config))
}

/// `helm uninstall`, tolerant of a release that is already gone.
pub fn helm_uninstall(config: &DriverConfig, identity: &ProjectIdentity) -> CommandSpec {
    CommandSpec::new(&config.helm_bin)
        .arg("uninstall")
        .arg(identity.release_name())
        .arg("--namespace")
        .arg(identity.namespace())
        .arg("--ignore-not-found")
        .arg("--wait")
        .arg("--timeout")
        .arg(helm_duration(config))
}

/// `helm status` as JSON.
pub fn helm_status(config: &DriverConfig, identity: &ProjectIdentity) -> CommandSpec {
    CommandSpec::new(&config.helm_bin)
        .arg("status")
        .arg(identity.release_name())
        .arg("--namespace")
        .arg(identity.namespace())
        .arg("--output")
        .arg("json")
}

/// Delete the namespace without waiting for finalizers.
pub fn kubectl_delete_namespace(config: &DriverConfig, identity: &ProjectIdentity) -> CommandSpec {
    CommandSpec::new(&config.kubectl_bin)
        .arg("delete")
        .arg("namespace")
        .arg(identity.namespace())
        .arg("--ignore-not-found")
        .arg("--wait=false")
}

/// Cluster IP of the front-door service.
pub fn kubectl_front_door_ip(kubectl_bin: &str, identity: &ProjectIdentity) -> CommandSpec {
    CommandSpec::new(kubectl_bin)
        .arg("get")
        .arg("service")
        .arg(identity.front_door_service())
        .arg("--namespace")
        .arg(identity.namespace())
        .arg("--output")
        .arg("jsonpath={.spec.clusterIP}")
}

fn helm_duration(config: &DriverConfig) -> String {
    format!("{}s", config.timeout.as_secs())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
