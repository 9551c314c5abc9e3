//! In-process warehouse. Holds committed rows in memory and can be told to fail at specific
//! points, which is what the loader and pipeline tests lean on.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{EventRow, Warehouse, WarehouseError, WarehouseTransaction};

// Same limit as the key columns in migrations/0001_create_tracking_events.sql
pub const MAX_KEY_LENGTH: usize = 256;

#[derive(Default)]
pub struct MemoryWarehouse {
    committed: Mutex<Vec<EventRow>>,
    open: AtomicUsize,
    fail_begin: Option<WarehouseError>,
    reject_insert_at: Option<usize>,
    fail_commit: Option<WarehouseError>,
    commit_then_disconnect: bool,
    insert_delay: Option<Duration>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_begin(mut self, error: WarehouseError) -> Self {
        self.fail_begin = Some(error);
        self
    }

    /// Reject the insert of the row at `index` within a transaction.
    pub fn reject_insert(mut self, index: usize) -> Self {
        self.reject_insert_at = Some(index);
        self
    }

    /// Fail the commit with `error`, nothing is committed.
    pub fn fail_commit(mut self, error: WarehouseError) -> Self {
        self.fail_commit = Some(error);
        self
    }

    /// Commit the rows, then report the connection as lost. The caller can't tell this apart
    /// from a commit that never reached the server.
    pub fn commit_then_disconnect(mut self) -> Self {
        self.commit_then_disconnect = true;
        self
    }

    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    pub fn rows(&self) -> Vec<EventRow> {
        self.committed().clone()
    }

    /// Transactions that have been opened and not yet committed, rolled back or dropped.
    pub fn open_transactions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    fn committed(&self) -> MutexGuard<'_, Vec<EventRow>> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn begin_write<'a>(
        &'a self,
    ) -> Result<Box<dyn WarehouseTransaction + 'a>, WarehouseError> {
        if let Some(error) = &self.fail_begin {
            return Err(error.clone());
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransaction {
            warehouse: self,
            staged: Vec::new(),
        }))
    }
}

pub struct MemoryTransaction<'a> {
    warehouse: &'a MemoryWarehouse,
    staged: Vec<EventRow>,
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        self.warehouse.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<'a> WarehouseTransaction for MemoryTransaction<'a> {
    async fn insert(&mut self, row: &EventRow) -> Result<(), WarehouseError> {
        if let Some(delay) = self.warehouse.insert_delay {
            tokio::time::sleep(delay).await;
        }

        if self.warehouse.reject_insert_at == Some(self.staged.len()) {
            return Err(WarehouseError::Rejected(format!(
                "insert of row {} rejected",
                row.row_id
            )));
        }

        let event = &row.event;
        for (column, value) in [
            ("request_id", &event.request_id),
            ("cookie_id", &event.cookie_id),
            ("topic", &event.topic),
        ] {
            if value.chars().count() > MAX_KEY_LENGTH {
                return Err(WarehouseError::Rejected(format!(
                    "value too long for {column}, limit is {MAX_KEY_LENGTH}"
                )));
            }
        }

        self.staged.push(row.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), WarehouseError> {
        if let Some(error) = &self.warehouse.fail_commit {
            return Err(error.clone());
        }

        let mut txn = self;
        let staged = std::mem::take(&mut txn.staged);
        txn.warehouse.committed().extend(staged);

        if txn.warehouse.commit_then_disconnect {
            return Err(WarehouseError::Connection(
                "connection reset after commit was sent".to_owned(),
            ));
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), WarehouseError> {
        Ok(())
    }
}
