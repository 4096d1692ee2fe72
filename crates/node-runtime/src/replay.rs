//! Replay of persisted records.

use itinerary_types::PersistedRecord;
use messaging_backend::MessagingBackend;
use persistence_store::{PersistenceStore, StoreError, StoreResult};
use tracing::{debug, info, warn};

/// Counts from one [`replay_all`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub submitted: usize,
    pub tracked: usize,
    /// Records whose single resubmission attempt failed. They are gone.
    pub failed: usize,
    pub corrupt: usize,
}

impl ReplaySummary {
    pub fn total(&self) -> usize {
        self.submitted + self.tracked + self.failed + self.corrupt
    }
}

/// Resubmit every stored record once, oldest first, and delete it.
///
/// A record is deleted after its attempt whether or not the backend took
/// it, so a failed attempt loses the record. Records that do not parse are
/// deleted without an attempt.
pub async fn replay_all(store: &PersistenceStore, backend: &dyn MessagingBackend) -> StoreResult<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for key in store.list().await? {
        match store.read(&key).await {
            Ok(PersistedRecord::Message(pending)) => {
                match backend
                    .submit(&pending.message, &pending.node, &pending.service)
                    .await
                {
                    Ok(()) => summary.submitted += 1,
                    Err(e) => {
                        warn!(key = %key, node = %pending.node, error = %e, "replayed submit failed, dropping record");
                        summary.failed += 1;
                    }
                }
            }
            Ok(PersistedRecord::Tracking(record)) => match backend.track(&record).await {
                Ok(()) => summary.tracked += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "replayed track failed, dropping record");
                    summary.failed += 1;
                }
            },
            Err(StoreError::Corrupt { reason, .. }) => {
                warn!(key = %key, reason = %reason, "unable to read persisted record");
                summary.corrupt += 1;
            }
            Err(e) => {
                // Another replay got here first.
                debug!(key = %key, error = %e, "persisted record vanished");
                continue;
            }
        }

        if let Err(e) = store.remove(&key).await {
            warn!(
                key = %key,
                error = %e,
                "unable to delete replayed record, it will be submitted again"
            );
        }
    }

    if summary.total() > 0 {
        info!(
            submitted = summary.submitted,
            tracked = summary.tracked,
            failed = summary.failed,
            corrupt = summary.corrupt,
            "replayed persisted records"
        );
    }
    Ok(summary)
}
