//! Environment variable overrides.
//!
//! Applied after the file (or defaults) is loaded and before validation:
//! - `PORT` replaces the port of `listener.bind_address`
//! - `ALLOWED_ORIGINS` (comma separated) replaces `cors.allowed_origins`
//! - `<SERVICE>_SERVICE_URL` replaces the proxy target of that service
//!
//! The lookup function is injected so tests never touch the process env.

use crate::config::loader::ConfigError;
use crate::config::schema::GatewayConfig;

/// Name of the override variable for a service, e.g. `ORDERS_SERVICE_URL`.
pub fn service_url_var(service: &str) -> String {
    format!("{}_SERVICE_URL", service.to_uppercase().replace('-', "_"))
}

/// Apply overrides read from the process environment.
pub fn apply_process_env(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides using `lookup` to resolve variable names.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "PORT".to_string(),
            reason: format!("'{}' is not a valid port", port),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        let origins: Vec<String> = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        if origins.is_empty() {
            return Err(ConfigError::Env {
                var: "ALLOWED_ORIGINS".to_string(),
                reason: "no origins listed".to_string(),
            });
        }
        config.cors.allowed_origins = origins;
    }

    for service in config.services.iter_mut() {
        let var = service_url_var(&service.name);
        if let Some(url) = lookup(&var) {
            tracing::debug!(service = %service.name, %var, url = %url, "Service target overridden from environment");
            service.url = url.trim().to_string();
        }
    }

    Ok(())
}
