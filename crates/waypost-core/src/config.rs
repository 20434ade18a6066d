use anyhow::Result;
use config::Config;
use serde::Deserialize;

use crate::constants::DEFAULT_CAPABILITY;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    pub crm: CrmConfig,
    pub content: ContentConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Bearer tokens the host hands out to callers of the write surface.
/// Each token names its principal and carries a capability list; the
/// per-operation capability check in [`PermissionsConfig`] is evaluated
/// against that list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    pub token: String,
    pub capabilities: Vec<String>,
}

/// Capability names required per write operation. Overridable
/// independently, mirroring the host's per-operation permission hooks.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_capability")]
    pub create: String,
    #[serde(default = "default_capability")]
    pub delete: String,
    #[serde(default = "default_capability")]
    pub crm: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            create: default_capability(),
            delete: default_capability(),
            crm: default_capability(),
        }
    }
}

fn default_capability() -> String {
    DEFAULT_CAPABILITY.to_string()
}

/// CRM REST endpoint plus its key pair. `api_url` points at the CiviCRM
/// REST entry point, e.g. `https://example.org/civicrm/ajax/rest`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    pub api_url: String,
    pub api_key: String,
    pub site_key: String,
}

/// Host CMS REST API used to resolve content ids to permalinks/titles.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub api_url: String,
}

/// Where non-redirected requests are forwarded.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `.env` file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8721)?
            .set_default("database.max_connections", 4)?
            .set_default("logging.level", "debug")?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_default_to_manage_redirects() {
        let permissions = PermissionsConfig::default();

        assert_eq!(permissions.create, DEFAULT_CAPABILITY);
        assert_eq!(permissions.delete, DEFAULT_CAPABILITY);
        assert_eq!(permissions.crm, DEFAULT_CAPABILITY);
    }

    #[test]
    fn permissions_deserialize_partial_override() {
        let permissions: PermissionsConfig =
            serde_json::from_str(r#"{"create": "edit_redirects"}"#).unwrap();

        assert_eq!(permissions.create, "edit_redirects");
        assert_eq!(permissions.delete, DEFAULT_CAPABILITY);
    }

    #[test]
    fn auth_config_defaults_to_no_tokens() {
        let auth: AuthConfig = serde_json::from_str("{}").unwrap();

        assert!(auth.tokens.is_empty());
    }
}
