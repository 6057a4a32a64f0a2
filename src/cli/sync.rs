use crate::config::{Config, OAuthConfig};
use crate::error::Result;
use crate::graph::GraphStore;
use crate::models::SyncResult;
use crate::records::{RecordClient, RecordOperations};
use crate::sheets::SheetsStore;
use crate::store::{Backend, TabularStore};
use crate::sync::SyncEngine;
use crate::transport::{
    AuthenticatedTransport, FileCredentialStore, HttpSend, OAuthRefresher, ReqwestSender,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub(super) const GRAPH_CREDENTIAL: &str = "graph";
pub(super) const RECORDS_CREDENTIAL: &str = "records";

pub async fn execute(output: Option<&Path>) -> Result<()> {
    let config = Config::load()?;
    let backend = Backend::from_source(&config.source.url)?;

    let http: Arc<dyn HttpSend> = Arc::new(ReqwestSender::new()?);
    let credentials = Arc::new(FileCredentialStore);

    let records_transport = authenticated(
        RECORDS_CREDENTIAL,
        &config.records.oauth,
        &http,
        &credentials,
    )
    .await?;
    let records = RecordClient::new(records_transport, &config.records.base_url);

    let results = match backend {
        Backend::Graph { workbook_url } => {
            let transport =
                authenticated(GRAPH_CREDENTIAL, config.graph_oauth()?, &http, &credentials).await?;
            let store = GraphStore::new(transport, &workbook_url);
            run(&config, store, records).await?
        }
        Backend::GoogleSheets { spreadsheet_id } => {
            let store = SheetsStore::new(config.google()?, &spreadsheet_id).await?;
            info!(url = store.spreadsheet_url(), "Using Google spreadsheet");
            run(&config, store, records).await?
        }
    };

    let report = serde_json::to_string_pretty(&results)?;
    println!("{}", report);

    if let Some(path) = output {
        fs::write(path, &report)?;
        info!(path = ?path, "Wrote results");
    }

    Ok(())
}

async fn run<S, R>(config: &Config, store: S, records: R) -> Result<Vec<SyncResult>>
where
    S: TabularStore,
    R: RecordOperations + Sync,
{
    let engine = SyncEngine::new(config.metadata_defaults(), store, records);
    engine.sync().await
}

async fn authenticated(
    name: &str,
    oauth: &OAuthConfig,
    http: &Arc<dyn HttpSend>,
    credentials: &Arc<FileCredentialStore>,
) -> Result<Arc<AuthenticatedTransport>> {
    let state = credentials.load_or_bootstrap(name, oauth)?;
    let transport = AuthenticatedTransport::new(
        name,
        Arc::clone(http),
        Box::new(OAuthRefresher::new(oauth)?),
        credentials.clone(),
        state,
    );
    transport.ensure_access_token().await?;

    Ok(Arc::new(transport))
}
