//! Shared constants

pub const BEARER_PREFIX: &str = "Bearer ";

/// Local relay forwards everything under this prefix to the API.
pub const RELAY_PREFIX: &str = "/api";

pub const DEFAULT_CONFIG_PATH: &str = "token-relay.yaml";
