//! # Token Relay Library
//!
//! Authenticated HTTP client with coordinated bearer-token refresh:
//! credentials are attached to every outbound call, a rejected access token
//! triggers at most one refresh no matter how many calls fail at once, and
//! parked calls are replayed (or failed) together when it settles.
//!
//! Modules:
//! - `store`: credential pair storage and persistence
//! - `request`: request descriptor, retry-once attempt, response envelope
//! - `coordinator`: single-flight refresh and session termination
//! - `client`: request dispatcher and auth endpoints
//! - `server`: local relay forwarding requests through the client
//! - `config`: service configuration, loading and validation

pub mod config;
pub mod store;
pub mod request;
pub mod coordinator;
pub mod client;
pub mod error;
#[cfg(test)]
mod tests;
pub mod observability;
pub mod server;
pub mod helpers;
pub mod utils;


pub use crate::client::ApiClient;
pub use crate::config::types::ServiceConfig;
pub use crate::error::{ClientError, RefreshError};
