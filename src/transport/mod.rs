mod auth;
mod client;
mod http;

pub use auth::{CredentialPersister, CredentialState, FileCredentialStore, OAuthRefresher, TokenRefresher};
pub use client::AuthenticatedTransport;
pub use http::ReqwestSender;

#[cfg(test)]
pub(crate) use client::mocks;

use crate::error::Result;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// A backend-agnostic HTTP request, cloned for each attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace any existing `Authorization` header with a bearer token.
    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        self.header("Authorization", &format!("Bearer {}", token))
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_replaces_previous_token() {
        let request = ApiRequest::get("https://example.test")
            .header("workbook-session-id", "abc")
            .bearer("old")
            .bearer("new");

        assert_eq!(request.header_value("authorization"), Some("Bearer new"));
        assert_eq!(request.header_value("workbook-session-id"), Some("abc"));
        assert_eq!(request.headers.len(), 2);
    }
}
