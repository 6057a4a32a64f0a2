use serde::{Deserialize, Serialize};
use serde_json::Value;

// https://learn.microsoft.com/en-us/graph/api/workbook-createsession
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateSessionRequest {
    pub(super) persist_changes: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct SessionInfo {
    pub(super) id: String,
}

// https://learn.microsoft.com/en-us/graph/api/worksheet-usedrange
#[derive(Debug, Deserialize)]
pub(super) struct WorkbookRange {
    #[serde(default)]
    pub(super) values: Vec<Vec<Value>>,
}

// https://learn.microsoft.com/en-us/graph/api/filter-apply
#[derive(Debug, Serialize)]
pub(super) struct ApplyFilterRequest {
    pub(super) criteria: FilterCriteria,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FilterCriteria {
    pub(super) filter_on: &'static str,
    pub(super) criterion1: &'static str,
}

impl FilterCriteria {
    /// Matches cells that are blank.
    pub(super) fn blank() -> Self {
        Self {
            filter_on: "custom",
            criterion1: "=",
        }
    }
}

// https://learn.microsoft.com/en-us/graph/api/resources/workbookrangeview
#[derive(Debug, Deserialize)]
pub(super) struct RangeViewCollection {
    #[serde(default)]
    pub(super) value: Vec<RangeView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RangeView {
    #[serde(default)]
    pub(super) cell_addresses: Vec<Vec<Value>>,
    #[serde(default)]
    pub(super) values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub(super) struct RangeUpdate {
    pub(super) values: Vec<Vec<Value>>,
}
