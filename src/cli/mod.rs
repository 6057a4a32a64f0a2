mod auth;
mod show;
mod sync;

use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use auth::AuthAction;
pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "sheet-record-sync")]
#[command(about = "Sync unprocessed spreadsheet rows into a record API", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Sync { output } => sync::execute(output.as_deref()).await,
            Commands::Show { resource } => resource.execute().await,
            Commands::Auth { action } => action.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create records for unprocessed rows and mark them processed
    Sync {
        /// Also write the per-row results to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
}
