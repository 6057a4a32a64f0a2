use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::sheets::client::AUTH_SCOPE;
use crate::transport::FileCredentialStore;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, instrument};
use yup_oauth2::{
    ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
    authenticator::Authenticator, hyper_rustls::HttpsConnector,
};

/// Name of the cached Google token file, shared with `auth reset`.
pub const GOOGLE_CREDENTIAL: &str = "google";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CERT_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";
const GOOGLE_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

pub(super) type SheetsAuthenticator = Authenticator<HttpsConnector<HttpConnector>>;

fn application_secret(config: &GoogleConfig) -> ApplicationSecret {
    ApplicationSecret {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        auth_uri: GOOGLE_AUTH_URL.to_string(),
        token_uri: GOOGLE_TOKEN_URL.to_string(),
        auth_provider_x509_cert_url: Some(GOOGLE_CERT_URL.to_string()),
        redirect_uris: vec![GOOGLE_REDIRECT_URI.to_string()],
        project_id: None,
        client_email: None,
        client_x509_cert_url: None,
    }
}

/// Installed-app authenticator with a token already fetched.
///
/// yup-oauth2 refreshes and persists the Google token itself, so this adapter
/// does not go through `AuthenticatedTransport`. The browser prompt only
/// appears while nothing is cached.
#[instrument(name = "Authorizing Google Sheets", skip_all)]
pub(super) async fn authorized(config: &GoogleConfig) -> Result<SheetsAuthenticator> {
    let token_path = FileCredentialStore::prepare_path(GOOGLE_CREDENTIAL)?;
    debug!(path = ?token_path, "Google token cache");

    let auth = InstalledFlowAuthenticator::builder(
        application_secret(config),
        InstalledFlowReturnMethod::Interactive,
    )
    .persist_tokens_to_disk(token_path)
    .build()
    .await
    .map_err(|e| AppError::Auth(format!("Failed to build Google authenticator: {}", e)))?;

    auth.token(&[AUTH_SCOPE])
        .await
        .map_err(|e| AppError::Auth(format!("Failed to get Google token: {}", e)))?;

    Ok(auth)
}
