//! Request extractors shared by the session handlers.
//!
//! - [`client::ClientInfo`] -- User agent and address of the calling client.

pub mod client;
