//! Fire-and-forget history writes.

use crate::store::{AnalysisHistoryRecord, ProfileStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs history writes off the user-visible path.
///
/// Failures are logged and dropped. The returned handle exists for tests and for short-lived
/// processes that must flush before exit; request handlers never await it.
#[derive(Clone)]
pub struct HistoryDispatcher {
    store: Arc<dyn ProfileStore>,
}

impl HistoryDispatcher {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, record: AnalysisHistoryRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let id = record.id.clone();
            let user = record.user_id;
            let outcome = tokio::task::spawn_blocking(move || store.append_analysis(&record)).await;
            match outcome {
                Ok(Ok(())) => debug!(%user, %id, "history write complete"),
                Ok(Err(e)) => warn!(%user, %id, error = %e, "history write failed"),
                Err(e) => warn!(%user, %id, error = %e, "history write task aborted"),
            }
        })
    }
}
