use serde::Deserialize;
use crate::config::settings::SettingsConfig;

pub const LOGIN_PATH_DEFAULT: &str = "/auth/login";
pub const REGISTER_PATH_DEFAULT: &str = "/auth/register";
pub const REFRESH_PATH_DEFAULT: &str = "/auth/refresh";
pub const LOGOUT_PATH_DEFAULT: &str = "/auth/logout";
pub const STORE_PATH_DEFAULT: &str = "./.token-relay/credentials.json";

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// ================================
/// Backend API
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Absolute base URL, every relative request path is appended to it.
    pub base_url: String,
    /// Whole-request timeout of the underlying HTTP client.
    /// The refresh call relies on it too, nothing else bounds it.
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub auth: AuthPaths,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthPaths {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_register_path")]
    pub register_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            register_path: default_register_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
        }
    }
}

/// ================================
/// Credential persistence
/// ================================
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    File,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    pub store_type: StoreType,
    /// Required for `type: file`.
    pub path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { store_type: StoreType::File, path: Some(STORE_PATH_DEFAULT.to_owned()) }
    }
}

fn default_login_path() -> String {
    LOGIN_PATH_DEFAULT.to_owned()
}

fn default_register_path() -> String {
    REGISTER_PATH_DEFAULT.to_owned()
}

fn default_refresh_path() -> String {
    REFRESH_PATH_DEFAULT.to_owned()
}

fn default_logout_path() -> String {
    LOGOUT_PATH_DEFAULT.to_owned()
}
