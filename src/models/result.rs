use crate::address::RowAddress;
use serde::Serialize;
use serde_json::Value;

/// Marker written to the status column once a row has been attempted.
const PROCESSED_OK: &str = "Y";
const PROCESSED_FAILED: &str = "N";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Response(Value),
    ErrorMessage(String),
}

/// Outcome of processing one input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub row_range: String,
    pub status: SyncStatus,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl SyncResult {
    pub fn success(address: &RowAddress, response: Value) -> Self {
        Self {
            row_range: address.range(),
            status: SyncStatus::Success,
            outcome: Outcome::Response(response),
        }
    }

    pub fn failure(address: &RowAddress, message: String) -> Self {
        Self {
            row_range: address.range(),
            status: SyncStatus::Failure,
            outcome: Outcome::ErrorMessage(message),
        }
    }

    /// The status-column values written back for this row.
    pub fn to_update(&self, address: &RowAddress) -> UpdateEntry {
        let values = match &self.outcome {
            Outcome::Response(_) => vec![PROCESSED_OK.to_string(), "SUCCESS".to_string()],
            Outcome::ErrorMessage(message) => vec![
                PROCESSED_FAILED.to_string(),
                format!("FAILURE: {}", message),
            ],
        };

        UpdateEntry {
            address: address.clone(),
            values,
        }
    }
}

/// Values to write into one row, in target-column order.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry {
    pub address: RowAddress,
    pub values: Vec<String>,
}
