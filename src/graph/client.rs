use super::types::{
    ApplyFilterRequest, CreateSessionRequest, FilterCriteria, RangeUpdate, RangeViewCollection,
    SessionInfo, WorkbookRange,
};
use crate::address::{RowAddress, local_address};
use crate::error::{AppError, Result};
use crate::models::row::cells_to_strings;
use crate::models::{AddressedRow, FilteredRows, RowRecord, SheetRows};
use crate::store::{SessionId, TabularStore, sparse_rows, with_session};
use crate::sync::Block;
use crate::transport::{ApiRequest, AuthenticatedTransport};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

const SESSION_HEADER: &str = "workbook-session-id";

/// Tabular store over a Microsoft Graph workbook.
pub struct GraphStore {
    transport: Arc<AuthenticatedTransport>,
    workbook_url: String,
}

/// Quote a name for use inside an OData key segment such as `worksheets('...')`.
fn odata_key(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn parse<T: DeserializeOwned>(body: Value, operation: &str) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        AppError::Sheets(format!("Unexpected response shape while trying to {}: {}", operation, e))
    })
}

impl GraphStore {
    pub fn new(transport: Arc<AuthenticatedTransport>, workbook_url: &str) -> Self {
        Self {
            transport,
            workbook_url: workbook_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.workbook_url, path)
    }

    fn table_url(&self, table_name: &str, path: &str) -> String {
        self.url(&format!("tables({})/{}", odata_key(table_name), path))
    }

    async fn visible_rows(
        &self,
        session: &SessionId,
        table_name: &str,
        max_rows: usize,
    ) -> Result<FilteredRows> {
        let operation = format!("read visible rows of table {}", table_name);
        let request = ApiRequest::get(self.table_url(
            table_name,
            // One extra for the header row.
            &format!("range/visibleView/rows?$top={}", max_rows + 1),
        ))
        .header(SESSION_HEADER, session.as_str());

        let body = self
            .transport
            .call_with_refresh(request, &[StatusCode::OK], &operation, true)
            .await?;
        let views: RangeViewCollection = parse(body, &operation)?;

        let mut views = views.value.into_iter();
        let Some(header_view) = views.next() else {
            return Ok(FilteredRows::default());
        };
        let headers = header_view
            .values
            .first()
            .map(|row| cells_to_strings(row))
            .unwrap_or_default();

        let mut rows = Vec::new();
        for view in views.take(max_rows) {
            let addresses = view
                .cell_addresses
                .first()
                .map(|row| cells_to_strings(row))
                .unwrap_or_default();
            let values = view
                .values
                .first()
                .map(|row| cells_to_strings(row))
                .unwrap_or_default();

            rows.push(AddressedRow {
                address: RowAddress::new(addresses)?,
                data: RowRecord::from_row(&headers, &values)?,
            });
        }

        Ok(FilteredRows { headers, rows })
    }
}

#[async_trait]
impl TabularStore for GraphStore {
    #[instrument(name = "Opening workbook session", skip(self))]
    async fn begin_session(&self, persistent: bool) -> Result<SessionId> {
        let request = ApiRequest::post(self.url("createSession")).json(serde_json::to_value(
            CreateSessionRequest {
                persist_changes: persistent,
            },
        )?);

        let body = self
            .transport
            .call_with_refresh(request, &[StatusCode::CREATED], "create session", true)
            .await
            .map_err(|e| AppError::Session(format!("Failed to open session: {}", e)))?;

        let session: SessionInfo = parse(body, "create session")
            .map_err(|e| AppError::Session(e.to_string()))?;
        debug!("Session opened");

        Ok(SessionId::new(session.id))
    }

    #[instrument(name = "Closing workbook session", skip_all)]
    async fn end_session(&self, session: SessionId) -> Result<()> {
        let request =
            ApiRequest::post(self.url("closeSession")).header(SESSION_HEADER, session.as_str());

        self.transport
            .call_with_refresh(request, &[StatusCode::NO_CONTENT], "close session", false)
            .await
            .map_err(|e| AppError::Session(format!("Failed to close session: {}", e)))?;

        Ok(())
    }

    #[instrument(name = "Reading sheet", skip(self))]
    async fn read_range(&self, sheet_name: &str) -> Result<SheetRows> {
        let operation = format!("read sheet {}", sheet_name);
        let request = ApiRequest::get(self.url(&format!(
            "worksheets({})/usedRange(valuesOnly=true)",
            odata_key(sheet_name)
        )));

        let body = self
            .transport
            .call_with_refresh(request, &[StatusCode::OK], &operation, true)
            .await?;
        let range: WorkbookRange = parse(body, &operation)?;

        let values: Vec<Vec<String>> = range.values.iter().map(|row| cells_to_strings(row)).collect();
        SheetRows::from_values(&values)
    }

    #[instrument(name = "Filtering unprocessed rows", skip(self))]
    async fn filter_unprocessed_rows(
        &self,
        sheet_name: &str,
        table_name: &str,
        status_column: &str,
        max_rows: usize,
    ) -> Result<FilteredRows> {
        with_session(self, false, |session| async move {
            let clear = ApiRequest::post(self.table_url(table_name, "clearFilters"))
                .header(SESSION_HEADER, session.as_str());
            self.transport
                .call_with_refresh(clear, &[StatusCode::NO_CONTENT], "clear table filters", false)
                .await?;

            let apply = ApiRequest::post(self.table_url(
                table_name,
                &format!("columns({})/filter/apply", odata_key(status_column)),
            ))
            .header(SESSION_HEADER, session.as_str())
            .json(serde_json::to_value(ApplyFilterRequest {
                criteria: FilterCriteria::blank(),
            })?);
            self.transport
                .call_with_refresh(apply, &[StatusCode::NO_CONTENT], "apply status filter", false)
                .await?;

            let filtered = self.visible_rows(&session, table_name, max_rows).await?;
            debug!(sheet = sheet_name, rows = filtered.rows.len(), "Found unprocessed rows");
            Ok(filtered)
        })
        .await
    }

    #[instrument(name = "Writing block", skip(self, session, column_indices, block), fields(start = block.start, end = block.end))]
    async fn write_block(
        &self,
        session: &SessionId,
        sheet_name: &str,
        column_indices: &[usize],
        block: &Block,
    ) -> Result<()> {
        let address = format!(
            "{}:{}",
            local_address(block.first_address()),
            local_address(block.last_address())
        );
        let operation = format!("write range {}", address);

        let request = ApiRequest::patch(self.url(&format!(
            "worksheets({})/range(address={})",
            odata_key(sheet_name),
            odata_key(&address)
        )))
        .header(SESSION_HEADER, session.as_str())
        .json(serde_json::to_value(RangeUpdate {
            values: sparse_rows(block, column_indices)?,
        })?);

        self.transport
            .call_with_refresh(request, &[StatusCode::OK], &operation, true)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::coalesce;
    use crate::sync::test_helpers::entry;
    use crate::transport::mocks::{MockHttp, MockPersister, MockRefresher, transport_with};
    use reqwest::Method;
    use serde_json::json;

    const WORKBOOK: &str = "https://graph.test/v1.0/me/drive/items/01ABC/workbook";

    fn store_with(http: &MockHttp) -> GraphStore {
        let transport = transport_with(http, &MockRefresher::default(), &MockPersister::default());
        GraphStore::new(Arc::new(transport), &format!("{}/", WORKBOOK))
    }

    #[tokio::test]
    async fn test_begin_and_end_session() {
        let http = MockHttp::with_responses(vec![(201, r#"{"id":"sess-9","persistChanges":true}"#), (204, "")]);
        let store = store_with(&http);

        let session = store.begin_session(true).await.unwrap();
        assert_eq!(session, SessionId::new("sess-9"));
        store.end_session(session).await.unwrap();

        let requests = http.requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url, format!("{}/createSession", WORKBOOK));
        assert_eq!(requests[0].body, Some(json!({"persistChanges": true})));
        assert_eq!(requests[1].url, format!("{}/closeSession", WORKBOOK));
        assert_eq!(requests[1].header_value(SESSION_HEADER), Some("sess-9"));
    }

    #[tokio::test]
    async fn test_begin_session_failure_is_session_error() {
        let http = MockHttp::with_responses(vec![(503, r#"{"error":{"code":"ServiceUnavailable"}}"#)]);
        let store = store_with(&http);

        assert!(matches!(
            store.begin_session(false).await,
            Err(AppError::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_read_range() {
        let http = MockHttp::with_responses(vec![(
            200,
            r#"{"address":"metadata!A1:B3","values":[["Key","Value"],["record_type","contacts"],["max_rows",25]]}"#,
        )]);
        let store = store_with(&http);

        let sheet = store.read_range("metadata").await.unwrap();
        assert_eq!(sheet.headers, vec!["Key", "Value"]);
        assert_eq!(sheet.rows[1].get("Value"), Some("25"));
        assert_eq!(
            http.requests()[0].url,
            format!("{}/worksheets('metadata')/usedRange(valuesOnly=true)", WORKBOOK)
        );
    }

    #[tokio::test]
    async fn test_filter_unprocessed_rows() {
        let views = json!({"value": [
            {"index": 0, "cellAddresses": [["incoming!A1", "incoming!B1", "incoming!C1"]], "values": [["Name", "Processed", "Message"]]},
            {"index": 3, "cellAddresses": [["incoming!A4", "incoming!B4", "incoming!C4"]], "values": [["Ada", "", ""]]},
            {"index": 6, "cellAddresses": [["incoming!A7", "incoming!B7", "incoming!C7"]], "values": [["Grace", "", ""]]}
        ]})
        .to_string();
        let http = MockHttp::with_responses(vec![
            (201, r#"{"id":"read-1"}"#),
            (204, ""),
            (204, ""),
            (200, views.as_str()),
            (204, ""),
        ]);
        let store = store_with(&http);

        let filtered = store
            .filter_unprocessed_rows("incoming", "IncomingTable", "Processed", 10)
            .await
            .unwrap();

        assert_eq!(filtered.headers, vec!["Name", "Processed", "Message"]);
        assert_eq!(filtered.rows.len(), 2);
        assert_eq!(filtered.rows[0].address.range(), "A4:C4");
        assert_eq!(filtered.rows[1].data.get("Name"), Some("Grace"));

        let requests = http.requests();
        let urls: Vec<String> = requests.iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{}/createSession", WORKBOOK),
                format!("{}/tables('IncomingTable')/clearFilters", WORKBOOK),
                format!("{}/tables('IncomingTable')/columns('Processed')/filter/apply", WORKBOOK),
                format!("{}/tables('IncomingTable')/range/visibleView/rows?$top=11", WORKBOOK),
                format!("{}/closeSession", WORKBOOK),
            ]
        );
        assert_eq!(requests[0].body, Some(json!({"persistChanges": false})));
        assert_eq!(
            requests[2].body,
            Some(json!({"criteria": {"filterOn": "custom", "criterion1": "="}}))
        );
        assert!(requests[1..].iter().all(|r| r.header_value(SESSION_HEADER) == Some("read-1")));
    }

    #[tokio::test]
    async fn test_filter_closes_session_when_filter_fails() {
        let http = MockHttp::with_responses(vec![
            (201, r#"{"id":"read-1"}"#),
            (404, r#"{"error":{"code":"ItemNotFound"}}"#),
            (204, ""),
        ]);
        let store = store_with(&http);

        let err = store
            .filter_unprocessed_rows("incoming", "Missing", "Processed", 10)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnexpectedStatus { status: 404, .. }));
        let requests = http.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].url, format!("{}/closeSession", WORKBOOK));
    }

    #[tokio::test]
    async fn test_write_block() {
        let http = MockHttp::with_responses(vec![(200, "{}")]);
        let store = store_with(&http);
        let blocks = coalesce(vec![entry(2), entry(3)]).unwrap();

        store
            .write_block(&SessionId::new("write-1"), "incoming", &[2, 3], &blocks[0])
            .await
            .unwrap();

        let request = &http.requests()[0];
        assert_eq!(request.method, Method::PATCH);
        assert_eq!(
            request.url,
            format!("{}/worksheets('incoming')/range(address='A2:D3')", WORKBOOK)
        );
        assert_eq!(request.header_value(SESSION_HEADER), Some("write-1"));
        assert_eq!(
            request.body,
            Some(json!({"values": [[null, null, "Y", "SUCCESS"], [null, null, "Y", "SUCCESS"]]}))
        );
    }

    #[test]
    fn test_odata_key_escapes_quotes() {
        assert_eq!(odata_key("Bob's sheet"), "'Bob''s sheet'");
    }
}
