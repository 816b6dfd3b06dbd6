pub mod accounts;
pub mod import;
pub mod links;
pub mod stats;

pub use accounts::AccountStore;
pub use import::{CsvImporter, ImportReport, RowError};
pub use links::{LinkBatchReport, LinkEngine};
pub use stats::StatsStore;

use std::sync::Arc;
use crate::storage::StorageClient;

/// Every governor service, built around one shared storage handle.
pub struct GovernorTracker {
    pub accounts: AccountStore,
    pub links: LinkEngine,
    pub stats: StatsStore,
    pub importer: CsvImporter,
    storage: Arc<StorageClient>,
}

impl GovernorTracker {
    pub fn new(storage: Arc<StorageClient>) -> Self {
        Self {
            accounts: AccountStore::new(Arc::clone(&storage)),
            links: LinkEngine::new(Arc::clone(&storage)),
            stats: StatsStore::new(Arc::clone(&storage)),
            importer: CsvImporter::new(Arc::clone(&storage)),
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<StorageClient> {
        &self.storage
    }
}
