//! Blob retrieval for the event loader.
//!
//! A blob is addressed by a [`BlobLocator`] (bucket + key) and fetched as UTF-8 text through the
//! [`BlobSource`] trait. Real implementations live in [`s3`] and [`folder`]; [`MockBlobSource`]
//! is always available so callers can test without any storage behind them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

pub mod folder;
pub mod s3;

const S3_SCHEME: &str = "s3://";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("access denied to blob: {0}")]
    AccessDenied(String),
    #[error("transient failure fetching blob: {0}")]
    Transient(String),
    #[error("blob {locator} is not valid UTF-8: {reason}")]
    InvalidEncoding { locator: String, reason: String },
    #[error("invalid blob locator: {0}")]
    InvalidLocator(String),
}

/// Address of one blob: a bucket-like container and a key inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocator {
    pub bucket: String,
    pub key: String,
}

impl BlobLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{S3_SCHEME}{}/{}", self.bucket, self.key)
    }
}

/// Accepts `s3://bucket/key` as well as the bare `bucket/key` form.
impl FromStr for BlobLocator {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.strip_prefix(S3_SCHEME).unwrap_or(s);
        match path.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(BlobLocator::new(bucket, key))
            }
            _ => Err(FetchError::InvalidLocator(s.to_owned())),
        }
    }
}

#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Fetch the whole blob as text. Nothing is retried here; the caller decides.
    async fn fetch(&self, locator: &BlobLocator) -> Result<String, FetchError>;
}

pub(crate) fn decode_utf8(locator: &BlobLocator, bytes: Vec<u8>) -> Result<String, FetchError> {
    String::from_utf8(bytes).map_err(|e| FetchError::InvalidEncoding {
        locator: locator.to_string(),
        reason: e.to_string(),
    })
}

/// Mock blob source for testing, returns the canned response registered for a locator and
/// `NotFound` for everything else.
#[derive(Clone, Default)]
pub struct MockBlobSource {
    responses: HashMap<BlobLocator, Result<String, FetchError>>,
}

impl MockBlobSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(mut self, locator: &BlobLocator, body: impl Into<String>) -> Self {
        self.responses.insert(locator.clone(), Ok(body.into()));
        self
    }

    pub fn with_error(mut self, locator: &BlobLocator, error: FetchError) -> Self {
        self.responses.insert(locator.clone(), Err(error));
        self
    }
}

#[async_trait]
impl BlobSource for MockBlobSource {
    async fn fetch(&self, locator: &BlobLocator) -> Result<String, FetchError> {
        match self.responses.get(locator) {
            Some(response) => response.clone(),
            None => Err(FetchError::NotFound(locator.to_string())),
        }
    }
}
