use super::RecordOperations;
use crate::error::Result;
use crate::transport::{ApiRequest, AuthenticatedTransport};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Client for the downstream record-creation API.
pub struct RecordClient {
    transport: Arc<AuthenticatedTransport>,
    api_base_url: String,
}

impl RecordClient {
    pub fn new(transport: Arc<AuthenticatedTransport>, api_base_url: &str) -> Self {
        Self {
            transport,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RecordOperations for RecordClient {
    #[instrument(name = "Creating record", skip(self, fields))]
    async fn create_record(
        &self,
        record_type: &str,
        version: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.api_base_url, record_type);
        let request = ApiRequest::post(format!("{}?api-version={}", url, version))
            .json(serde_json::to_value(fields)?);

        self.transport
            .call_with_refresh(
                request,
                &[StatusCode::CREATED],
                &format!("create {} record", record_type),
                true,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::transport::mocks::{MockHttp, MockPersister, MockRefresher, transport_with};
    use serde_json::json;

    fn client_with(http: &MockHttp) -> RecordClient {
        let transport = transport_with(http, &MockRefresher::default(), &MockPersister::default());
        RecordClient::new(Arc::new(transport), "https://records.test/api/")
    }

    fn fields() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("fullname".to_string(), "Ada Lovelace".to_string()),
            ("emailaddress1".to_string(), "ada@example.com".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_create_record() {
        let http = MockHttp::with_responses(vec![(201, r#"{"id":"rec-1"}"#)]);
        let client = client_with(&http);

        let created = client.create_record("contacts", "2", &fields()).await.unwrap();
        assert_eq!(created, json!({"id": "rec-1"}));

        let request = &http.requests()[0];
        assert_eq!(request.url, "https://records.test/api/contacts?api-version=2");
        assert_eq!(
            request.body,
            Some(json!({"emailaddress1": "ada@example.com", "fullname": "Ada Lovelace"}))
        );
        assert_eq!(request.header_value("Authorization"), Some("Bearer access-0"));
    }

    #[tokio::test]
    async fn test_create_record_requires_created_status() {
        let http = MockHttp::with_responses(vec![(200, r#"{"id":"rec-1"}"#)]);
        let client = client_with(&http);

        let err = client.create_record("contacts", "2", &fields()).await.unwrap_err();
        assert!(matches!(err, AppError::UnexpectedStatus { status: 200, .. }));
    }
}
