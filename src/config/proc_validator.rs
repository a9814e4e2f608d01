//! Configuration validation with aggregated errors.
//! Every problem is collected into one `Vec<String>` instead of failing on the first.

use std::collections::HashSet;
use tracing::{error, info};

use crate::config::settings::SettingsConfig;
use crate::config::types::{ApiConfig, ServiceConfig, StoreConfig, StoreType};
use crate::observability::metrics::get_metrics;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_api(&cfg.api, &mut errors);
    validate_store(&cfg.store, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        let metrics = get_metrics();
        for e in &errors {
            error!("config: {}", e);
            metrics.config_validation_errors.inc();
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!("settings.server.port '{}' is not a valid port", settings.server.port));
    }
    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if !settings.metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", settings.metrics.path));
    }
}

fn validate_api(api: &ApiConfig, errors: &mut Vec<String>) {
    match reqwest::Url::parse(&api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!(
            "api.base_url '{}' has unsupported scheme '{}'",
            api.base_url,
            url.scheme()
        )),
        Err(e) => errors.push(format!("api.base_url '{}' is not an absolute URL: {}", api.base_url, e)),
    }

    if api.timeout_ms == Some(0) {
        errors.push("api.timeout_ms must be greater than 0".to_string());
    }

    let paths = [
        ("login_path", &api.auth.login_path),
        ("register_path", &api.auth.register_path),
        ("refresh_path", &api.auth.refresh_path),
        ("logout_path", &api.auth.logout_path),
    ];
    let mut seen = HashSet::new();
    for (name, path) in paths {
        if !path.starts_with('/') {
            errors.push(format!("api.auth.{} '{}' must start with '/'", name, path));
        }
        if !seen.insert(path.as_str()) {
            errors.push(format!("api.auth.{} '{}' duplicates another auth path", name, path));
        }
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if store.store_type == StoreType::File
        && store.path.as_ref().filter(|p| !p.trim().is_empty()).is_none()
    {
        errors.push("store.path is required for 'type: file'".to_string());
    }
}
