//! Endpoint set exposed by a dev-session workload.
//!
//! The chart publishes three services behind one front-door object. Route
//! paths are static; only the base address comes from the cluster.

use serde::{Deserialize, Serialize};

/// One of the three services exposed by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Preview,
    Chat,
    Editor,
}

impl EndpointKind {
    /// Path the front door routes to this service.
    pub fn route_path(&self) -> &'static str {
        match self {
            Self::Preview => "/preview",
            Self::Chat => "/chat",
            Self::Editor => "/vscode",
        }
    }
}

/// A single endpoint: reachable base address plus the fixed route path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Empty until resolution succeeds.
    pub base_address: String,
    pub route_path: String,
}

impl Endpoint {
    fn new(kind: EndpointKind, base_address: &str) -> Self {
        Self {
            base_address: base_address.to_string(),
            route_path: kind.route_path().to_string(),
        }
    }

    /// Full URL, or `None` while the address is unresolved.
    pub fn url(&self) -> Option<String> {
        if self.base_address.is_empty() {
            None
        } else {
            Some(format!("http://{}{}", self.base_address, self.route_path))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSet {
    pub preview: Endpoint,
    pub chat: Endpoint,
    pub editor: Endpoint,
    /// `false` when the address lookup failed or returned a sentinel.
    pub resolved: bool,
}

impl EndpointSet {
    /// Route paths filled in, every base address empty.
    pub fn unresolved() -> Self {
        Self::with_address("", false)
    }

    /// All three endpoints behind `address`.
    pub fn at(address: &str) -> Self {
        Self::with_address(address, !address.is_empty())
    }

    fn with_address(address: &str, resolved: bool) -> Self {
        Self {
            preview: Endpoint::new(EndpointKind::Preview, address),
            chat: Endpoint::new(EndpointKind::Chat, address),
            editor: Endpoint::new(EndpointKind::Editor, address),
            resolved,
        }
    }

    pub fn get(&self, kind: EndpointKind) -> &Endpoint {
        match kind {
            EndpointKind::Preview => &self.preview,
            EndpointKind::Chat => &self.chat,
            EndpointKind::Editor => &self.editor,
        }
    }

    pub fn url(&self, kind: EndpointKind) -> Option<String> {
        self.get(kind).url()
    }

    /// The shared front-door address (empty when unresolved).
    pub fn base_address(&self) -> &str {
        &self.preview.base_address
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self::unresolved()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
