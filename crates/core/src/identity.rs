//! Project identity validation and name derivation.
//!
//! A project identity is an externally issued UUID that doubles as the
//! cluster namespace and the helm release key. It is interpolated into
//! resource names and command arguments, so nothing crosses a process
//! boundary until it has passed [`ProjectIdentity::parse`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Canonical 8-4-4-4-12 hex shape. Anchored, no braces, no `urn:` prefix.
const IDENTITY_PATTERN: &str =
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

static IDENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTITY_PATTERN).expect("valid regex"));

/// Prefix of every helm release / workload name.
pub const RELEASE_PREFIX: &str = "dev-session-";

/// Suffix the chart gives the front-door load balancer service.
pub const FRONT_DOOR_SUFFIX: &str = "-dev-session-template-lb";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid project identity {0:?}: expected a canonical UUID")]
    Invalid(String),
}

/// A validated, lowercase project identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectIdentity(String);

impl ProjectIdentity {
    /// Validate `raw` against the canonical UUID shape.
    ///
    /// Either hex case is accepted; the stored form is lowercase because
    /// namespaces must be RFC 1123 labels.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        if IDENTITY_RE.is_match(raw) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(IdentityError::Invalid(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace that scopes every object of this project.
    pub fn namespace(&self) -> &str {
        &self.0
    }

    /// Helm release name, also used as the workload name.
    pub fn release_name(&self) -> String {
        format!("{RELEASE_PREFIX}{}", self.0)
    }

    /// Name of the service whose cluster IP fronts all three endpoints.
    pub fn front_door_service(&self) -> String {
        format!("{}{FRONT_DOOR_SUFFIX}", self.release_name())
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key a raw identity is stored and looked up under.
///
/// Case variants of one UUID share a namespace and a release, so they
/// must also share a session.
pub fn canonical_identity(raw: &str) -> String {
    raw.to_ascii_lowercase()
}

/// Workload name recorded for a raw identity before it is validated.
pub fn workload_name_for(raw: &str) -> String {
    format!("{RELEASE_PREFIX}{}", canonical_identity(raw))
}

/// Isolation key recorded for a raw identity before it is validated.
pub fn isolation_key_for(raw: &str) -> String {
    canonical_identity(raw)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
