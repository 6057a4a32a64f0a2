use crate::error::{AppError, Result};
use crate::models::RowRecord;
use std::collections::BTreeMap;
use tracing::warn;

pub const RECORD_TYPE_KEY: &str = "record_type";
pub const RECORD_VERSION_KEY: &str = "record_version";
pub const STATUS_COLUMN_KEY: &str = "status_column";
pub const MESSAGE_COLUMN_KEY: &str = "message_column";
pub const TABLE_NAME_KEY: &str = "table_name";
pub const MAX_ROWS_KEY: &str = "max_rows";

/// Built-in metadata defaults, before `[defaults]` and the metadata sheet.
pub fn default_metadata() -> BTreeMap<String, String> {
    [
        (RECORD_TYPE_KEY, ""),
        (RECORD_VERSION_KEY, "1"),
        (STATUS_COLUMN_KEY, "Processed"),
        (MESSAGE_COLUMN_KEY, "Message"),
        (TABLE_NAME_KEY, "IncomingTable"),
        (MAX_ROWS_KEY, "500"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Validated view of the merged metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub record_type: String,
    pub record_version: String,
    pub status_column: String,
    pub message_column: String,
    pub table_name: String,
    pub max_rows: usize,
}

impl SyncSettings {
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            metadata
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| AppError::Config(format!("Metadata key '{}' must be set", key)))
        };

        let max_rows = required(MAX_ROWS_KEY)?
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                AppError::Config(format!("Metadata key '{}' must be a positive integer", MAX_ROWS_KEY))
            })?;

        Ok(Self {
            record_type: required(RECORD_TYPE_KEY)?,
            record_version: required(RECORD_VERSION_KEY)?,
            status_column: required(STATUS_COLUMN_KEY)?,
            message_column: required(MESSAGE_COLUMN_KEY)?,
            table_name: required(TABLE_NAME_KEY)?,
            max_rows,
        })
    }
}

/// Source column -> destination field, driving the create-record payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    /// Rows whose destination is blank are dropped.
    pub fn new(mapping: BTreeMap<String, String>) -> Self {
        Self(
            mapping
                .into_iter()
                .filter(|(column, field)| {
                    let blank = field.trim().is_empty();
                    if blank {
                        warn!(column = %column, "Ignoring column mapped to a blank field");
                    }
                    !blank
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Destination field values for one row. Unmapped or absent columns are left out.
    pub fn project(&self, row: &RowRecord) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(column, field)| row.get(column).map(|v| (field.clone(), v.to_string())))
            .collect()
    }
}
