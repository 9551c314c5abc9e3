use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AmbiguousCommitError, LoadError};
use crate::event::Event;
use crate::metrics_consts::{BATCH_LOAD_ATTEMPT, BATCH_LOAD_TIME, BATCH_SIZE, ROWS_COMMITTED};
use crate::warehouse::{EventRow, Warehouse, WarehouseTransaction};

/// What a committed batch left behind in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadResult {
    pub rows: usize,
    /// In batch order.
    pub row_ids: Vec<Uuid>,
}

/// Writes one batch of events in a single transaction: every row commits or none does.
///
/// Each row gets a fresh `row_id` per call, so loading the same events twice writes them twice.
/// Callers that retry after an [`AmbiguousCommitError`] should check its `row_ids` first.
pub struct BatchLoader {
    warehouse: Arc<dyn Warehouse>,
    load_timeout: Duration,
}

impl BatchLoader {
    pub fn new(warehouse: Arc<dyn Warehouse>, load_timeout: Duration) -> Self {
        Self {
            warehouse,
            load_timeout,
        }
    }

    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn load(&self, events: Vec<Event>) -> Result<LoadResult, LoadError> {
        // Nothing to write, don't take a connection for it
        if events.is_empty() {
            return Ok(LoadResult::default());
        }

        let rows: Vec<EventRow> = events.into_iter().map(EventRow::new).collect();
        metrics::histogram!(BATCH_SIZE).record(rows.len() as f64);

        let started = Instant::now();
        let result = self.write(&rows).await;
        metrics::histogram!(BATCH_LOAD_TIME).record(started.elapsed().as_millis() as f64);

        match &result {
            Ok(loaded) => {
                metrics::counter!(BATCH_LOAD_ATTEMPT, &[("result", "committed")]).increment(1);
                metrics::counter!(ROWS_COMMITTED).increment(loaded.rows as u64);
                info!(rows = loaded.rows, "batch committed");
            }
            Err(LoadError::AmbiguousCommit(e)) => {
                metrics::counter!(BATCH_LOAD_ATTEMPT, &[("result", "ambiguous")]).increment(1);
                warn!(rows = e.row_ids.len(), "commit outcome unknown: {}", e.reason);
            }
            Err(e) => {
                metrics::counter!(BATCH_LOAD_ATTEMPT, &[("result", "failed")]).increment(1);
                warn!("batch rolled back: {}", e);
            }
        }

        result
    }

    async fn write(&self, rows: &[EventRow]) -> Result<LoadResult, LoadError> {
        let deadline = tokio::time::Instant::now() + self.load_timeout;
        let row_ids: Vec<Uuid> = rows.iter().map(|row| row.row_id).collect();

        // Timing out here drops the open transaction, which rolls it back.
        let txn = match tokio::time::timeout_at(deadline, self.stage(rows, &row_ids)).await {
            Ok(staged) => staged?,
            Err(_) => {
                return Err(LoadError::Timeout {
                    timeout: self.load_timeout,
                    row_ids,
                })
            }
        };

        match tokio::time::timeout_at(deadline, txn.commit()).await {
            Ok(Ok(())) => Ok(LoadResult {
                rows: rows.len(),
                row_ids,
            }),
            Ok(Err(error)) if error.is_connection() => Err(AmbiguousCommitError {
                row_ids,
                reason: error.to_string(),
            }
            .into()),
            Ok(Err(error)) => Err(LoadError::Commit { error, row_ids }),
            Err(_) => Err(AmbiguousCommitError {
                row_ids,
                reason: format!("commit did not finish within {:?}", self.load_timeout),
            }
            .into()),
        }
    }

    /// Open a transaction and insert every row, stopping at the first failure.
    async fn stage<'a>(
        &'a self,
        rows: &[EventRow],
        row_ids: &[Uuid],
    ) -> Result<Box<dyn WarehouseTransaction + 'a>, LoadError> {
        let mut txn = self
            .warehouse
            .begin_write()
            .await
            .map_err(LoadError::Connection)?;

        for (index, row) in rows.iter().enumerate() {
            if let Err(error) = txn.insert(row).await {
                if let Err(rollback_error) = txn.rollback().await {
                    // The transaction is gone either way, the connection drops it server side.
                    warn!("rollback after failed insert also failed: {}", rollback_error);
                }
                return Err(LoadError::Insert {
                    index,
                    request_id: row.event.request_id.clone(),
                    error,
                    row_ids: row_ids.to_vec(),
                });
            }
        }

        Ok(txn)
    }
}
