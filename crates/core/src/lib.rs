//! Dev-session control plane core.
//!
//! Maps a project identity onto a live workload in the cluster. Holds the
//! domain types, the helm-backed deployment driver, the endpoint resolver,
//! the status translator and the get-or-create session reconciler. The crate
//! has no database dependency; persistence is reached through
//! [`store::SessionStore`].

pub mod deploy;
pub mod endpoints;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod reconciler;
pub mod resolver;
pub mod session;
pub mod status;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;
