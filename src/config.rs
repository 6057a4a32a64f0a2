use crate::error::{AppError, Result};
use crate::models::settings::default_metadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_PREFIX: &str = "sheet-record-sync";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<OAuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleConfig>,
    pub records: RecordsConfig,
    /// Overlaid on the built-in metadata defaults; the metadata sheet wins over both.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SourceConfig {
    /// `https://.../workbook` for Microsoft Graph, `gsheets://<id>` for Google Sheets
    pub url: String,
}

/// An OAuth2 client that obtains access tokens via the refresh-token grant.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Bootstrap token, only used until a refreshed one has been cached.
    #[serde(default)]
    pub refresh_token: String,
}

impl OAuthConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if self.client_id.is_empty() || self.token_url.is_empty() {
            return Err(AppError::Config(format!(
                "[{}] client_id and token_url must be set in config file",
                section
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RecordsConfig {
    pub base_url: String,
    pub oauth: OAuthConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.source.url.is_empty() {
            return Err(AppError::Config(
                "[source] url must be set in config file".to_string(),
            ));
        }

        if config.records.base_url.is_empty() {
            return Err(AppError::Config(
                "[records] base_url must be set in config file".to_string(),
            ));
        }
        config.records.oauth.validate("records.oauth")?;

        if let Some(graph) = &config.graph {
            graph.validate("graph")?;
        }

        if let Some(google) = &config.google {
            if google.client_id.is_empty() || google.client_secret.is_empty() {
                return Err(AppError::Config(
                    "Google client_id and client_secret must be set in config file".to_string(),
                ));
            }
        }

        Ok(config)
    }

    /// Built-in metadata defaults overlaid with `[defaults]`.
    pub fn metadata_defaults(&self) -> BTreeMap<String, String> {
        let mut defaults = default_metadata();
        defaults.extend(self.defaults.clone());
        defaults
    }

    pub fn graph_oauth(&self) -> Result<&OAuthConfig> {
        self.graph.as_ref().ok_or_else(|| {
            AppError::Config("A [graph] section is required for workbook URLs".to_string())
        })
    }

    pub fn google(&self) -> Result<&GoogleConfig> {
        self.google.as_ref().ok_or_else(|| {
            AppError::Config("A [google] section is required for gsheets:// sources".to_string())
        })
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the cache directory path
    pub fn cache_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))
    }

    /// Get a cache file path
    pub fn cache_file(filename: &str) -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.place_cache_file(filename)
            .map_err(|e| AppError::Config(format!("Failed to create cache file path: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH_CONFIG: &str = r#"
[source]
url = "https://graph.microsoft.com/v1.0/me/drive/items/01ABC/workbook"

[graph]
client_id = "graph-client"
client_secret = "graph-secret"
token_url = "https://login.microsoftonline.com/common/oauth2/v2.0/token"
scopes = ["https://graph.microsoft.com/.default", "offline_access"]
refresh_token = "bootstrap"

[records]
base_url = "https://records.example.com/api"

[records.oauth]
client_id = "records-client"
client_secret = "records-secret"
token_url = "https://login.example.com/token"

[defaults]
record_type = "contacts"
max_rows = "50"
"#;

    #[test]
    fn test_parse_graph_config() {
        let config = Config::parse(GRAPH_CONFIG).unwrap();

        let graph = config.graph_oauth().unwrap();
        assert_eq!(graph.client_id, "graph-client");
        assert_eq!(graph.scopes.len(), 2);
        assert_eq!(graph.refresh_token, "bootstrap");
        assert_eq!(config.records.oauth.refresh_token, "");
        assert!(config.google().is_err());
    }

    #[test]
    fn test_metadata_defaults_overlay() {
        let config = Config::parse(GRAPH_CONFIG).unwrap();
        let defaults = config.metadata_defaults();

        assert_eq!(defaults.get("record_type").map(String::as_str), Some("contacts"));
        assert_eq!(defaults.get("max_rows").map(String::as_str), Some("50"));
        assert_eq!(defaults.get("status_column").map(String::as_str), Some("Processed"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::parse(GRAPH_CONFIG).unwrap();

        let serialized = toml::to_string(&config).unwrap();
        let deserialized = Config::parse(&serialized).unwrap();

        assert_eq!(config.source.url, deserialized.source.url);
        assert_eq!(config.records.oauth.client_id, deserialized.records.oauth.client_id);
    }

    #[test]
    fn test_missing_source_url() {
        let contents = GRAPH_CONFIG.replace(
            "url = \"https://graph.microsoft.com/v1.0/me/drive/items/01ABC/workbook\"",
            "url = \"\"",
        );
        assert!(matches!(Config::parse(&contents), Err(AppError::Config(_))));
    }

    #[test]
    fn test_incomplete_google_section() {
        let contents = format!("{}\n[google]\nclient_id = \"id\"\nclient_secret = \"\"\n", GRAPH_CONFIG);
        assert!(matches!(Config::parse(&contents), Err(AppError::Config(_))));
    }
}
