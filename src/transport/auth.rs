use crate::config::{Config, OAuthConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use oauth2::{
    Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Access/refresh token pair held for the duration of one run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CredentialState {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry time as seconds since Unix epoch
    #[serde(default)]
    pub expires_at: i64,
}

impl CredentialState {
    /// State bootstrapped from a refresh token alone; the first use refreshes it.
    pub fn from_refresh_token(refresh_token: &str) -> Self {
        Self {
            refresh_token: refresh_token.to_string(),
            ..Default::default()
        }
    }

    /// Missing, expired, or about to expire (within 5 minutes)
    pub fn needs_refresh(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.access_token.is_empty() || self.expires_at < (now + 300)
    }
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchange a refresh token for a new access/refresh pair.
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialState>;
}

#[async_trait]
pub trait CredentialPersister: Send + Sync {
    async fn persist(&self, name: &str, value: &str) -> Result<()>;
}

// Type alias for the client when only the token URL is set
type RefreshClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet, // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Refresh-token grant against an OAuth2 token endpoint.
pub struct OAuthRefresher {
    client: RefreshClient,
    http_client: reqwest::Client,
    scopes: Vec<String>,
}

impl OAuthRefresher {
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_token_uri(token_url);

        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
            scopes: config.scopes.clone(),
        })
    }

    /// If the response omits a refresh token the previous one stays valid.
    fn parse_tokens(
        token_result: BasicTokenResponse,
        previous_refresh_token: &str,
    ) -> CredentialState {
        let refresh_token = token_result
            .refresh_token()
            .map(|token| token.secret().clone())
            .unwrap_or_else(|| previous_refresh_token.to_string());

        let expires_in = token_result
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600); // Default to 1 hour if not provided

        CredentialState {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: chrono::Utc::now().timestamp() + expires_in,
        }
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    #[instrument(name = "Refreshing access token", skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialState> {
        if refresh_token.is_empty() {
            return Err(AppError::Auth(
                "No refresh token available; set one in the config file".to_string(),
            ));
        }

        let scopes = self.scopes.iter().map(|s| Scope::new(s.clone()));
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .add_scopes(scopes)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        Ok(Self::parse_tokens(token_result, refresh_token))
    }
}

/// Credentials persisted as owner-only JSON files in the cache directory.
#[derive(Debug, Clone, Default)]
pub struct FileCredentialStore;

impl FileCredentialStore {
    fn token_cache_path(name: &str) -> Result<PathBuf> {
        Config::cache_file(&format!("{}_tokens.json", name))
    }

    pub fn load(&self, name: &str) -> Result<Option<CredentialState>> {
        let token_path = Self::token_cache_path(name)?;

        if !token_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&token_path)
            .map_err(|e| AppError::Auth(format!("Failed to read tokens file: {}", e)))?;

        let tokens: CredentialState = serde_json::from_str(&contents)
            .map_err(|e| AppError::Auth(format!("Failed to parse tokens: {}", e)))?;

        Ok(Some(tokens))
    }

    /// Cached credentials, falling back to the bootstrap refresh token.
    pub fn load_or_bootstrap(&self, name: &str, config: &OAuthConfig) -> Result<CredentialState> {
        match self.load(name)? {
            Some(tokens) => {
                debug!(credential = name, "Using cached tokens");
                Ok(tokens)
            }
            None => {
                debug!(credential = name, "No cached tokens, bootstrapping from config");
                Ok(CredentialState::from_refresh_token(&config.refresh_token))
            }
        }
    }

    /// Cache path for `name`, with its parent directory created.
    pub fn prepare_path(name: &str) -> Result<PathBuf> {
        let token_path = Self::token_cache_path(name)?;

        if let Some(parent) = token_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Auth(format!("Failed to create token cache directory: {}", e))
            })?;
        }

        Ok(token_path)
    }

    #[instrument(name = "Clearing cached tokens", skip(self))]
    pub fn clear(&self, name: &str) -> Result<()> {
        let token_path = Self::token_cache_path(name)?;

        if !token_path.exists() {
            debug!("No cached tokens to clear");
            return Ok(());
        }

        fs::remove_file(&token_path)
            .map_err(|e| AppError::Auth(format!("Failed to delete tokens file: {}", e)))?;
        info!(credential = name, "Cleared cached tokens");

        Ok(())
    }
}

#[async_trait]
impl CredentialPersister for FileCredentialStore {
    async fn persist(&self, name: &str, value: &str) -> Result<()> {
        let token_path = Self::prepare_path(name)?;

        // Create file with owner-only permissions from the start to avoid race condition
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&token_path)
            .map_err(|e| AppError::Auth(format!("Failed to create tokens file: {}", e)))?;

        file.write_all(value.as_bytes())
            .map_err(|e| AppError::Auth(format!("Failed to write tokens file: {}", e)))?;

        debug!(credential = name, "Persisted refreshed tokens");
        Ok(())
    }
}
