use crate::error::{AppError, Result};
use crate::models::{
    AddressedRow, FieldMapping, SyncResult, SyncSettings, SyncStatus, UpdateEntry,
};
use crate::records::RecordOperations;
use crate::store::{INCOMING_SHEET, MAPPING_SHEET, METADATA_SHEET, TabularStore, with_session};
use crate::sync::coalesce::{Block, coalesce};
use indicatif::ProgressStyle;
use std::collections::BTreeMap;
use tracing::{Span, debug, error, info, instrument, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const METADATA_KEY_COLUMN: &str = "Key";
const METADATA_VALUE_COLUMN: &str = "Value";
const MAPPING_SOURCE_COLUMN: &str = "Column";
const MAPPING_FIELD_COLUMN: &str = "Field";

pub struct SyncEngine<S, R> {
    defaults: BTreeMap<String, String>,
    store: S,
    records: R,
}

/// Positions of the status and message columns, in write order.
fn target_columns(headers: &[String], settings: &SyncSettings) -> Result<Vec<usize>> {
    [&settings.status_column, &settings.message_column]
        .into_iter()
        .map(|column| {
            headers.iter().position(|h| h == column).ok_or_else(|| {
                AppError::Config(format!("Column '{}' not found in incoming sheet", column))
            })
        })
        .collect()
}

impl<S, R> SyncEngine<S, R>
where
    S: TabularStore,
    R: RecordOperations + Sync,
{
    pub fn new(defaults: BTreeMap<String, String>, store: S, records: R) -> Self {
        Self {
            defaults,
            store,
            records,
        }
    }

    /// Process every unprocessed row and write each row's outcome back.
    ///
    /// Errors before row processing abort the run; a failed row only turns
    /// into a FAILURE result.
    #[instrument(name = "Sync", skip_all)]
    pub async fn sync(&self) -> Result<Vec<SyncResult>> {
        // Blank metadata cells override defaults; blank mapping rows are ignored.
        let metadata = self
            .store
            .read_kv(
                METADATA_SHEET,
                METADATA_KEY_COLUMN,
                METADATA_VALUE_COLUMN,
                true,
                &self.defaults,
            )
            .await?;
        let settings = SyncSettings::from_metadata(&metadata)?;

        let mapping = FieldMapping::new(
            self.store
                .read_kv(
                    MAPPING_SHEET,
                    MAPPING_SOURCE_COLUMN,
                    MAPPING_FIELD_COLUMN,
                    false,
                    &BTreeMap::new(),
                )
                .await?,
        );
        if mapping.is_empty() {
            return Err(AppError::Config(format!(
                "Sheet '{}' maps no columns",
                MAPPING_SHEET
            )));
        }
        debug!(fields = mapping.len(), "Loaded field mapping");

        let filtered = self
            .store
            .filter_unprocessed_rows(
                INCOMING_SHEET,
                &settings.table_name,
                &settings.status_column,
                settings.max_rows,
            )
            .await?;

        if filtered.rows.is_empty() {
            info!("No unprocessed rows");
            return Ok(Vec::new());
        }
        let column_indices = target_columns(&filtered.headers, &settings)?;

        let (results, updates) = self.process_rows(&settings, &mapping, &filtered.rows).await?;
        if let Err(e) = self.write_back(&column_indices, updates).await {
            error!(error = %e, "Failed to write row statuses back; unwritten rows will be retried next run");
        }

        let failed = results
            .iter()
            .filter(|r| r.status == SyncStatus::Failure)
            .count();
        info!(rows = results.len(), failed, "Rows synced");

        Ok(results)
    }

    #[instrument(name = "Processing rows", skip_all, fields(rows = rows.len()))]
    async fn process_rows(
        &self,
        settings: &SyncSettings,
        mapping: &FieldMapping,
        rows: &[AddressedRow],
    ) -> Result<(Vec<SyncResult>, Vec<UpdateEntry>)> {
        let span = Span::current();
        span.pb_set_style(
            &ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            )
            .map_err(|e| AppError::Other(e.into()))?,
        );
        span.pb_set_message("Creating records");
        span.pb_set_length(rows.len() as u64);

        let mut results = Vec::with_capacity(rows.len());
        let mut updates = Vec::with_capacity(rows.len());

        for row in rows {
            let fields = mapping.project(&row.data);
            let result = match self
                .records
                .create_record(&settings.record_type, &settings.record_version, &fields)
                .await
            {
                Ok(response) => SyncResult::success(&row.address, response),
                Err(e) => {
                    warn!(row = %row.address.range(), error = %e, "Failed to create record");
                    SyncResult::failure(&row.address, e.to_string())
                }
            };

            updates.push(result.to_update(&row.address));
            results.push(result);
            span.pb_inc(1);
        }

        Ok((results, updates))
    }

    #[instrument(name = "Writing results", skip_all)]
    async fn write_back(&self, column_indices: &[usize], updates: Vec<UpdateEntry>) -> Result<()> {
        let blocks = coalesce(updates)?;
        info!(
            blocks = blocks.len(),
            rows = blocks.iter().map(Block::len).sum::<usize>(),
            "Writing row statuses"
        );

        with_session(&self.store, true, |session| async move {
            for block in &blocks {
                self.store
                    .write_block(&session, INCOMING_SHEET, column_indices, block)
                    .await?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod mocks {
    use super::*;
    use crate::store::mocks::MockStore;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    /// Creates records, failing for any `fullname` listed in `fail_for`.
    #[derive(Clone, Default)]
    pub(crate) struct MockRecords {
        pub fail_for: Vec<String>,
        pub created: Arc<Mutex<Vec<(String, String, BTreeMap<String, String>)>>>,
    }

    #[async_trait]
    impl RecordOperations for MockRecords {
        async fn create_record(
            &self,
            record_type: &str,
            version: &str,
            fields: &BTreeMap<String, String>,
        ) -> Result<Value> {
            self.created.lock().unwrap().push((
                record_type.to_string(),
                version.to_string(),
                fields.clone(),
            ));

            let name = fields.get("fullname").cloned().unwrap_or_default();
            if self.fail_for.contains(&name) {
                return Err(AppError::UnexpectedStatus {
                    status: 400,
                    operation: format!("create {} record", record_type),
                    body: json!({"error": format!("rejected {}", name)}),
                });
            }
            Ok(json!({"id": format!("rec-{}", name)}))
        }
    }

    pub(crate) fn workbook(incoming: Vec<Vec<&str>>) -> MockStore {
        MockStore::default()
            .with_sheet(
                METADATA_SHEET,
                vec![
                    vec!["Key", "Value"],
                    vec!["record_type", "contacts"],
                    vec!["record_version", "9.2"],
                ],
            )
            .with_sheet(
                MAPPING_SHEET,
                vec![
                    vec!["Column", "Field"],
                    vec!["Name", "fullname"],
                    vec!["Email", "emailaddress1"],
                    vec!["Notes", ""],
                ],
            )
            .with_sheet(INCOMING_SHEET, incoming)
    }

    pub(crate) fn defaults() -> BTreeMap<String, String> {
        crate::models::settings::default_metadata()
    }

    pub(crate) async fn sync_against_mocks(
        store: &MockStore,
        records: &MockRecords,
    ) -> Result<Vec<SyncResult>> {
        let engine = SyncEngine::new(defaults(), store.clone(), records.clone());
        engine.sync().await
    }
}
