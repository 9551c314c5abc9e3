use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::event::Event;

pub mod memory;
pub mod postgres;

/// Destination columns, in bind order.
pub const COLUMNS: [&str; 12] = [
    "row_id",
    "request_id",
    "request_timestamp",
    "cookie_id",
    "topic",
    "message",
    "environment",
    "website_id",
    "user_account_id",
    "location",
    "user_agent",
    "referrer",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarehouseError {
    /// The warehouse answered and refused the statement (constraint, bad value, ...).
    #[error("statement rejected: {0}")]
    Rejected(String),
    /// We lost (or never got) the connection.
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("{0} is not a valid destination, expected [schema.]table")]
    InvalidDestination(String),
}

impl WarehouseError {
    pub fn is_connection(&self) -> bool {
        matches!(self, WarehouseError::Connection(_))
    }
}

impl From<sqlx::Error> for WarehouseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => WarehouseError::Connection(error.to_string()),
            other => WarehouseError::Rejected(other.to_string()),
        }
    }
}

/// An event paired with the row identity it is written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub row_id: Uuid,
    pub event: Event,
}

impl EventRow {
    pub fn new(event: Event) -> Self {
        Self {
            row_id: Uuid::now_v7(),
            event,
        }
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Open a transaction, holding one connection until it is committed, rolled back or dropped.
    async fn begin_write<'a>(
        &'a self,
    ) -> Result<Box<dyn WarehouseTransaction + 'a>, WarehouseError>;
}

/// Dropping a transaction without committing must discard everything inserted through it.
#[async_trait]
pub trait WarehouseTransaction: Send {
    async fn insert(&mut self, row: &EventRow) -> Result<(), WarehouseError>;

    async fn commit(self: Box<Self>) -> Result<(), WarehouseError>;

    async fn rollback(self: Box<Self>) -> Result<(), WarehouseError>;
}
