mod coalesce;
mod engine;

pub use coalesce::{Block, coalesce};
pub use engine::SyncEngine;

#[cfg(test)]
pub(crate) use coalesce::test_helpers;
