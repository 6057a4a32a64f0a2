use crate::error::{AppError, Result};
use crate::models::{FilteredRows, SheetRows};
use crate::sync::Block;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, warn};
use url::Url;

pub const INCOMING_SHEET: &str = "incoming";
pub const METADATA_SHEET: &str = "metadata";
pub const MAPPING_SHEET: &str = "mapping";

/// Identifier of an open workbook session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which adapter a source location is served by.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    /// Microsoft Graph workbook, e.g. `https://graph.microsoft.com/v1.0/me/drive/items/{id}/workbook`
    Graph { workbook_url: String },
    /// Google Sheets, `gsheets://{spreadsheet-id}`
    GoogleSheets { spreadsheet_id: String },
}

impl Backend {
    pub fn from_source(source: &str) -> Result<Self> {
        let url = Url::parse(source)
            .map_err(|e| AppError::UnsupportedSource(format!("{}: {}", source, e)))?;

        match url.scheme() {
            "https" => Ok(Backend::Graph {
                workbook_url: source.trim_end_matches('/').to_string(),
            }),
            "gsheets" => {
                let spreadsheet_id = url.host_str().unwrap_or_default();
                if spreadsheet_id.is_empty() {
                    return Err(AppError::UnsupportedSource(format!(
                        "{}: missing spreadsheet id",
                        source
                    )));
                }
                Ok(Backend::GoogleSheets {
                    spreadsheet_id: spreadsheet_id.to_string(),
                })
            }
            scheme => Err(AppError::UnsupportedSource(format!(
                "{}: scheme '{}' is not supported",
                source, scheme
            ))),
        }
    }
}

#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Open a session; `persistent` sessions keep their changes.
    async fn begin_session(&self, persistent: bool) -> Result<SessionId>;

    async fn end_session(&self, session: SessionId) -> Result<()>;

    /// The used region of a sheet, first row as headers.
    async fn read_range(&self, sheet_name: &str) -> Result<SheetRows>;

    /// Rows of `sheet_name` whose `status_column` is empty, at most `max_rows`.
    async fn filter_unprocessed_rows(
        &self,
        sheet_name: &str,
        table_name: &str,
        status_column: &str,
        max_rows: usize,
    ) -> Result<FilteredRows>;

    /// Write `block` into `column_indices` of its rows with one range update.
    async fn write_block(
        &self,
        session: &SessionId,
        sheet_name: &str,
        column_indices: &[usize],
        block: &Block,
    ) -> Result<()>;

    /// Overlay a two-column sheet onto a copy of `base`.
    ///
    /// Rows with an empty key are ignored, and so are rows with an empty value
    /// unless `allow_empty_value` is set.
    async fn read_kv(
        &self,
        sheet_name: &str,
        key_column: &str,
        value_column: &str,
        allow_empty_value: bool,
        base: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let sheet = self.read_range(sheet_name).await?;
        for column in [key_column, value_column] {
            if !sheet.headers.iter().any(|h| h == column) {
                return Err(AppError::Config(format!(
                    "Sheet '{}' has no '{}' column",
                    sheet_name, column
                )));
            }
        }

        let mut result = base.clone();
        for row in &sheet.rows {
            let key = row.get(key_column).unwrap_or_default();
            let value = row.get(value_column).unwrap_or_default();
            if key.is_empty() || (value.is_empty() && !allow_empty_value) {
                continue;
            }
            result.insert(key.to_string(), value.to_string());
        }

        debug!(sheet = sheet_name, entries = result.len(), "Loaded key/value sheet");
        Ok(result)
    }
}

/// Rows of a block as full-width cell arrays, `null` outside the target columns.
pub fn sparse_rows(block: &Block, column_indices: &[usize]) -> Result<Vec<Vec<Value>>> {
    block
        .entries
        .iter()
        .map(|entry| {
            let mut row = vec![Value::Null; entry.address.len()];
            for (column, value) in column_indices.iter().zip(&entry.values) {
                let cell = row.get_mut(*column).ok_or_else(|| {
                    AppError::MalformedAddress(format!(
                        "column {} is outside row {}",
                        column,
                        entry.address.range()
                    ))
                })?;
                *cell = Value::String(value.clone());
            }
            Ok(row)
        })
        .collect()
}

/// Run `body` inside a session that is closed on every exit path.
///
/// A body error wins over a close error; the close error is only logged then.
pub async fn with_session<S, T, F, Fut>(store: &S, persistent: bool, body: F) -> Result<T>
where
    S: TabularStore + ?Sized,
    F: FnOnce(SessionId) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let session = store.begin_session(persistent).await?;
    let outcome = body(session.clone()).await;
    let closed = store.end_session(session).await;

    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_error)) => {
            warn!(error = %close_error, "Failed to close session after an earlier error");
            Err(e)
        }
    }
}
