mod auth;
mod client;

pub use auth::GOOGLE_CREDENTIAL;
pub use client::SheetsStore;
