use super::{ApiRequest, CredentialPersister, CredentialState, HttpSend, TokenRefresher};
use crate::error::{AppError, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Send a request and check the status against the expected set.
///
/// The body is parsed as JSON whatever the status; an unparseable body only
/// produces a warning, and only when a body was expected.
pub async fn call(
    http: &dyn HttpSend,
    request: ApiRequest,
    expected: &[StatusCode],
    operation: &str,
    expects_body: bool,
) -> Result<Value> {
    let response = http.send(request).await?;

    let body = match serde_json::from_str::<Value>(&response.body) {
        Ok(body) => body,
        Err(e) => {
            if expects_body {
                warn!(operation, status = %response.status, error = %e, "Response body is not JSON");
            }
            Value::Null
        }
    };

    if !expected.contains(&response.status) {
        return Err(AppError::UnexpectedStatus {
            status: response.status.as_u16(),
            operation: operation.to_string(),
            body,
        });
    }

    Ok(body)
}

/// HTTP calls carrying a bearer token that is refreshed once on expiry.
///
/// Owns the credential state exclusively; every mutation goes through
/// `refresh`, which holds the lock for the whole exchange so only one
/// refresh is ever in flight.
pub struct AuthenticatedTransport {
    name: String,
    http: Arc<dyn HttpSend>,
    refresher: Box<dyn TokenRefresher>,
    persister: Arc<dyn CredentialPersister>,
    state: Mutex<CredentialState>,
}

impl AuthenticatedTransport {
    pub fn new(
        name: &str,
        http: Arc<dyn HttpSend>,
        refresher: Box<dyn TokenRefresher>,
        persister: Arc<dyn CredentialPersister>,
        state: CredentialState,
    ) -> Self {
        Self {
            name: name.to_string(),
            http,
            refresher,
            persister,
            state: Mutex::new(state),
        }
    }

    async fn access_token(&self) -> String {
        self.state.lock().await.access_token.clone()
    }

    /// Refresh up front when there is no usable access token yet.
    pub async fn ensure_access_token(&self) -> Result<()> {
        let (needs_refresh, token) = {
            let state = self.state.lock().await;
            (state.needs_refresh(), state.access_token.clone())
        };

        if needs_refresh {
            self.refresh(&token).await?;
        }
        Ok(())
    }

    #[instrument(name = "Refreshing credentials", skip_all, fields(credential = %self.name))]
    async fn refresh(&self, stale_access_token: &str) -> Result<String> {
        let mut state = self.state.lock().await;

        // Someone else already rotated the token we were rejected with.
        if state.access_token != stale_access_token {
            debug!("Credentials already refreshed");
            return Ok(state.access_token.clone());
        }

        let refreshed = self.refresher.refresh(&state.refresh_token).await?;
        self.persister
            .persist(&self.name, &serde_json::to_string(&refreshed)?)
            .await?;
        *state = refreshed;

        Ok(state.access_token.clone())
    }

    /// `call` with the current access token, refreshing and retrying exactly
    /// once if the provider reports the token as invalid or expired.
    pub async fn call_with_refresh(
        &self,
        request: ApiRequest,
        expected: &[StatusCode],
        operation: &str,
        expects_body: bool,
    ) -> Result<Value> {
        let token = self.access_token().await;
        let first = call(
            self.http.as_ref(),
            request.clone().bearer(&token),
            expected,
            operation,
            expects_body,
        )
        .await;

        match first {
            Err(e) if e.is_auth_expired() => {
                warn!(credential = %self.name, operation, "Access token rejected, refreshing");
                let token = self.refresh(&token).await?;
                call(
                    self.http.as_ref(),
                    request.bearer(&token),
                    expected,
                    operation,
                    expects_body,
                )
                .await
            }
            other => other,
        }
    }
}
