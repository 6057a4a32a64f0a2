use crate::address::{RowAddress, local_address, row_ordinal};
use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::models::row::cells_to_strings;
use crate::models::{AddressedRow, FilteredRows, RowRecord, SheetRows};
use crate::sheets::auth::authorized;
use crate::store::{SessionId, TabularStore, sparse_rows, with_session};
use crate::sync::Block;
use async_trait::async_trait;
use google_sheets4::api::{Scope, Sheets, ValueRange};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use serde_json::Value;
use tracing::{debug, instrument};

// Read and write access to the user's spreadsheets
pub(crate) const AUTH_SCOPE: Scope = Scope::Spreadsheet;

/// Tabular store over a Google spreadsheet.
///
/// The Sheets API has no editing sessions: every write is applied on its
/// own, so sessions are local markers and filtering happens client-side.
pub struct SheetsStore {
    hub: Sheets<HttpsConnector<HttpConnector>>,
    spreadsheet_id: String,
}

impl SheetsStore {
    #[instrument(name = "Authenticating to Google Sheets", skip_all)]
    pub async fn new(config: &GoogleConfig, spreadsheet_id: &str) -> Result<Self> {
        let auth = authorized(config).await?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| AppError::Sheets(format!("Failed to load native TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);

        Ok(Self {
            hub: Sheets::new(client, auth),
            spreadsheet_id: spreadsheet_id.to_string(),
        })
    }

    pub fn spreadsheet_url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.spreadsheet_id)
    }

    async fn read_values(&self, sheet_name: &str) -> Result<ValueRange> {
        let (_, response) = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, sheet_name)
            .major_dimension("ROWS")
            .value_render_option("FORMATTED_VALUE")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| {
                AppError::Sheets(format!("Failed to read sheet '{}': {}", sheet_name, e))
            })?;

        Ok(response)
    }
}

/// Row number of the top-left cell of a returned range such as `incoming!A1:F40`.
fn origin_row(range: Option<&str>) -> Result<u32> {
    match range {
        Some(range) => {
            let top_left = local_address(range).split(':').next().unwrap_or_default();
            row_ordinal(top_left)
        }
        None => Ok(1),
    }
}

/// Client-side equivalent of an "empty status" filter over a full-sheet read.
fn unprocessed_rows(
    range: Option<&str>,
    values: &[Vec<Value>],
    status_column: &str,
    max_rows: usize,
) -> Result<FilteredRows> {
    let Some((header_row, data_rows)) = values.split_first() else {
        return Ok(FilteredRows::default());
    };
    let headers = cells_to_strings(header_row);
    if !headers.iter().any(|h| h == status_column) {
        return Err(AppError::Config(format!(
            "Status column '{}' not found in sheet headers",
            status_column
        )));
    }

    let header_row_number = origin_row(range)?;
    let mut rows = Vec::new();

    for (idx, cells) in data_rows.iter().enumerate() {
        if rows.len() == max_rows {
            break;
        }

        let data = RowRecord::from_row(&headers, &cells_to_strings(cells))?;
        if !data.get(status_column).unwrap_or_default().is_empty() {
            continue;
        }

        rows.push(AddressedRow {
            address: RowAddress::for_row(header_row_number + 1 + idx as u32, headers.len())?,
            data,
        });
    }

    Ok(FilteredRows { headers, rows })
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn begin_session(&self, persistent: bool) -> Result<SessionId> {
        debug!(persistent, "Sheets API has no sessions, using a local marker");
        Ok(SessionId::new(match persistent {
            true => "sheets-write",
            false => "sheets-read",
        }))
    }

    async fn end_session(&self, _session: SessionId) -> Result<()> {
        Ok(())
    }

    #[instrument(name = "Reading sheet", skip(self))]
    async fn read_range(&self, sheet_name: &str) -> Result<SheetRows> {
        let response = self.read_values(sheet_name).await?;
        let values: Vec<Vec<String>> = response
            .values
            .unwrap_or_default()
            .iter()
            .map(|row| cells_to_strings(row))
            .collect();

        SheetRows::from_values(&values)
    }

    #[instrument(name = "Filtering unprocessed rows", skip(self))]
    async fn filter_unprocessed_rows(
        &self,
        sheet_name: &str,
        _table_name: &str,
        status_column: &str,
        max_rows: usize,
    ) -> Result<FilteredRows> {
        with_session(self, false, |_| async move {
            let response = self.read_values(sheet_name).await?;
            let filtered = unprocessed_rows(
                response.range.as_deref(),
                &response.values.unwrap_or_default(),
                status_column,
                max_rows,
            )?;
            debug!(sheet = sheet_name, rows = filtered.rows.len(), "Found unprocessed rows");
            Ok(filtered)
        })
        .await
    }

    #[instrument(name = "Writing block", skip(self, _session, column_indices, block), fields(start = block.start, end = block.end))]
    async fn write_block(
        &self,
        _session: &SessionId,
        sheet_name: &str,
        column_indices: &[usize],
        block: &Block,
    ) -> Result<()> {
        let range = format!(
            "{}!{}:{}",
            sheet_name,
            local_address(block.first_address()),
            local_address(block.last_address())
        );

        // Null cells are skipped by the API, leaving other columns untouched.
        let value_range = ValueRange {
            major_dimension: Some("ROWS".to_string()),
            range: Some(range.clone()),
            values: Some(sparse_rows(block, column_indices)?),
        };

        self.hub
            .spreadsheets()
            .values_update(value_range, &self.spreadsheet_id, &range)
            .value_input_option("RAW")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| AppError::Sheets(format!("Failed to write range {}: {}", range, e)))?;

        Ok(())
    }
}
