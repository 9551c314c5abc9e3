use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub use common_blob::FetchError;

use crate::warehouse::WarehouseError;

/// A single token could not be turned into an event. Recorded per token, never fatal.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("token is not a valid event object: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("required field {0} is missing or null")]
    MissingField(&'static str),
    #[error("request_timestamp {0} is not a representable epoch millisecond value")]
    InvalidTimestamp(String),
}

/// The batch was not committed. Nothing from it is visible in the warehouse. Where rows were
/// attempted, `row_ids` are the ids they would have been written under.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not open a warehouse transaction: {0}")]
    Connection(WarehouseError),
    #[error("insert of event {index} (request_id {request_id}) failed: {error}")]
    Insert {
        index: usize,
        request_id: String,
        error: WarehouseError,
        row_ids: Vec<Uuid>,
    },
    #[error("warehouse rejected the commit: {error}")]
    Commit {
        error: WarehouseError,
        row_ids: Vec<Uuid>,
    },
    #[error("batch was not committed within {timeout:?}")]
    Timeout {
        timeout: Duration,
        row_ids: Vec<Uuid>,
    },
    #[error(transparent)]
    AmbiguousCommit(#[from] AmbiguousCommitError),
}

impl LoadError {
    /// Position in the batch of the event whose insert failed, if a single event was at fault.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            LoadError::Insert { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Row ids the batch was attempted under. Empty if no transaction was opened.
    pub fn row_ids(&self) -> &[Uuid] {
        match self {
            LoadError::Connection(_) => &[],
            LoadError::Insert { row_ids, .. }
            | LoadError::Commit { row_ids, .. }
            | LoadError::Timeout { row_ids, .. } => row_ids.as_slice(),
            LoadError::AmbiguousCommit(ambiguous) => ambiguous.row_ids.as_slice(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, LoadError::AmbiguousCommit(_))
    }
}

/// The connection went away (or the deadline passed) while the commit was in flight, so the
/// rows may or may not have been committed. `row_ids` lets a caller check which ones landed
/// before deciding to retry.
#[derive(Error, Debug)]
#[error("outcome of commit for {} rows is unknown: {reason}", row_ids.len())]
pub struct AmbiguousCommitError {
    pub row_ids: Vec<Uuid>,
    pub reason: String,
}

/// Failures that end an ingestion. Decode errors are not in here, they only show up in the
/// report.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to fetch blob: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to load batch: {0}")]
    Load(LoadError),
    #[error("batch commit is ambiguous: {0}")]
    AmbiguousCommit(AmbiguousCommitError),
    #[error("blob was not decoded: {0}")]
    DecodeAborted(String),
}

impl From<LoadError> for IngestError {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::AmbiguousCommit(ambiguous) => IngestError::AmbiguousCommit(ambiguous),
            other => IngestError::Load(other),
        }
    }
}
