use crate::cli::sync::{GRAPH_CREDENTIAL, RECORDS_CREDENTIAL};
use crate::error::Result;
use crate::sheets::GOOGLE_CREDENTIAL;
use crate::transport::FileCredentialStore;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Forget every cached token
    Reset,
}

impl AuthAction {
    pub async fn execute(&self) -> Result<()> {
        match self {
            AuthAction::Reset => reset(),
        }
    }
}

fn reset() -> Result<()> {
    let store = FileCredentialStore;
    for name in [GRAPH_CREDENTIAL, RECORDS_CREDENTIAL, GOOGLE_CREDENTIAL] {
        store.clear(name)?;
    }

    info!("Cached tokens cleared; the next sync starts from the configured refresh tokens");

    Ok(())
}
