mod client;

pub use client::RecordClient;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

#[async_trait]
pub trait RecordOperations {
    /// Create one record and return the created representation.
    async fn create_record(
        &self,
        record_type: &str,
        version: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Value>;
}
