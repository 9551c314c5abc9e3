use std::borrow::Cow;
use std::sync::Arc;

use common_blob::{BlobLocator, BlobSource};
use rayon::prelude::*;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{AmbiguousCommitError, DecodeError, FetchError, IngestError, LoadError};
use crate::event::{decode, Event};
use crate::loader::BatchLoader;
use crate::metrics_consts::{DECODE_FAILED, EVENTS_DECODED, FETCH_FAILED, INGESTIONS, TOKENS_SEEN};
use crate::tokenizer::Tokenizer;

/// A token that did not decode, by its position in the blob.
#[derive(Debug)]
pub struct TokenFailure {
    pub index: usize,
    pub error: DecodeError,
}

#[derive(Debug)]
pub enum Outcome {
    Committed { rows: usize, row_ids: Vec<Uuid> },
    /// No token decoded, nothing was sent to the warehouse.
    NothingToLoad,
    FetchFailed(FetchError),
    /// The decode task was torn down before it finished, nothing was loaded.
    DecodeAborted(String),
    /// Rolled back. `pending_request_ids` are the decoded events that were not written.
    LoadFailed {
        error: LoadError,
        pending_request_ids: Vec<String>,
    },
    AmbiguousCommit {
        error: AmbiguousCommitError,
        pending_request_ids: Vec<String>,
    },
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Committed { .. } => "committed",
            Outcome::NothingToLoad => "nothing_to_load",
            Outcome::FetchFailed(_) => "fetch_failed",
            Outcome::DecodeAborted(_) => "decode_aborted",
            Outcome::LoadFailed { .. } => "load_failed",
            Outcome::AmbiguousCommit { .. } => "ambiguous_commit",
        }
    }
}

#[derive(Debug)]
pub struct IngestionReport {
    pub locator: BlobLocator,
    pub tokens_seen: usize,
    pub decoded: usize,
    pub decode_failures: Vec<TokenFailure>,
    pub outcome: Outcome,
}

impl IngestionReport {
    fn without_tokens(locator: &BlobLocator, outcome: Outcome) -> Self {
        Self {
            locator: locator.clone(),
            tokens_seen: 0,
            decoded: 0,
            decode_failures: Vec::new(),
            outcome,
        }
    }

    pub fn failed_decode(&self) -> usize {
        self.decode_failures.len()
    }

    pub fn rows_committed(&self) -> usize {
        match &self.outcome {
            Outcome::Committed { rows, .. } => *rows,
            _ => 0,
        }
    }

    /// True when everything that decoded made it into the warehouse. Decode failures don't
    /// count against this, they are reported alongside.
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Committed { .. } | Outcome::NothingToLoad
        )
    }

    pub fn into_result(self) -> Result<Self, IngestError> {
        match self.outcome {
            Outcome::FetchFailed(error) => Err(IngestError::Fetch(error)),
            Outcome::DecodeAborted(reason) => Err(IngestError::DecodeAborted(reason)),
            Outcome::LoadFailed { error, .. } => Err(IngestError::Load(error)),
            Outcome::AmbiguousCommit { error, .. } => Err(IngestError::AmbiguousCommit(error)),
            _ => Ok(self),
        }
    }
}

/// Fetch, tokenize, decode and load one blob. Decode failures are collected and never stop the
/// other tokens; the decoded events go to the warehouse as a single batch.
pub struct IngestionPipeline {
    source: Arc<dyn BlobSource>,
    tokenizer: Tokenizer,
    loader: BatchLoader,
}

impl IngestionPipeline {
    pub fn new(source: Arc<dyn BlobSource>, tokenizer: Tokenizer, loader: BatchLoader) -> Self {
        Self {
            source,
            tokenizer,
            loader,
        }
    }

    #[instrument(skip_all, fields(locator = %locator))]
    pub async fn ingest(&self, locator: &BlobLocator) -> IngestionReport {
        let raw = match self.source.fetch(locator).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::counter!(FETCH_FAILED).increment(1);
                error!("failed to fetch blob: {}", e);
                let report = IngestionReport::without_tokens(locator, Outcome::FetchFailed(e));
                record_outcome(&report);
                return report;
            }
        };

        self.process(locator, raw).await
    }

    /// For callers that already hold the blob text.
    #[instrument(skip_all, fields(locator = %locator))]
    pub async fn ingest_blob(&self, locator: &BlobLocator, raw: &str) -> IngestionReport {
        self.process(locator, raw.to_owned()).await
    }

    async fn process(&self, locator: &BlobLocator, raw: String) -> IngestionReport {
        let tokenizer = self.tokenizer;
        // Tokenizing and decoding are CPU bound, keep them off the runtime's worker threads.
        let decoded = tokio::task::spawn_blocking(move || {
            let tokens: Vec<Cow<'_, str>> = tokenizer.split(&raw).collect();
            let (events, failures) = decode_tokens(&tokens);
            (tokens.len(), events, failures)
        })
        .await;

        let (tokens_seen, events, decode_failures) = match decoded {
            Ok(decoded) => decoded,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!("decode task did not finish: {}", e);
                let report =
                    IngestionReport::without_tokens(locator, Outcome::DecodeAborted(e.to_string()));
                record_outcome(&report);
                return report;
            }
        };
        metrics::counter!(TOKENS_SEEN).increment(tokens_seen as u64);
        metrics::counter!(EVENTS_DECODED).increment(events.len() as u64);

        for failure in &decode_failures {
            let reason = match failure.error {
                DecodeError::Malformed(_) => "malformed",
                DecodeError::MissingField(_) => "missing_field",
                DecodeError::InvalidTimestamp(_) => "invalid_timestamp",
            };
            metrics::counter!(DECODE_FAILED, &[("reason", reason)]).increment(1);
            warn!(token = failure.index, "skipping token: {}", failure.error);
        }

        let decoded = events.len();
        let outcome = if events.is_empty() {
            Outcome::NothingToLoad
        } else {
            let request_ids: Vec<String> = events.iter().map(|e| e.request_id.clone()).collect();
            match self.loader.load(events).await {
                Ok(loaded) => Outcome::Committed {
                    rows: loaded.rows,
                    row_ids: loaded.row_ids,
                },
                Err(LoadError::AmbiguousCommit(error)) => Outcome::AmbiguousCommit {
                    error,
                    pending_request_ids: request_ids,
                },
                Err(error) => Outcome::LoadFailed {
                    error,
                    pending_request_ids: request_ids,
                },
            }
        };

        let report = IngestionReport {
            locator: locator.clone(),
            tokens_seen,
            decoded,
            decode_failures,
            outcome,
        };
        record_outcome(&report);
        report
    }
}

/// Decode every token on the rayon pool. Events keep their relative order.
fn decode_tokens(tokens: &[Cow<'_, str>]) -> (Vec<Event>, Vec<TokenFailure>) {
    let results: Vec<Result<Event, DecodeError>> =
        tokens.par_iter().map(|token| decode(token)).collect();

    let mut events = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(event) => events.push(event),
            Err(error) => failures.push(TokenFailure { index, error }),
        }
    }

    (events, failures)
}

fn record_outcome(report: &IngestionReport) {
    let label = report.outcome.label();
    metrics::counter!(INGESTIONS, &[("outcome", label)]).increment(1);
    info!(
        outcome = label,
        tokens = report.tokens_seen,
        decoded = report.decoded,
        failed = report.failed_decode(),
        rows = report.rows_committed(),
        "ingestion finished"
    );
}
