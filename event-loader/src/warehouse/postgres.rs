//! Postgres-protocol warehouse (Postgres, Redshift).
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::{EventRow, Warehouse, WarehouseError, WarehouseTransaction, COLUMNS};
use crate::config::WarehouseConfig;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier regex is valid")
});

/// Validate a `[schema.]table` name and render it double-quoted. Identifiers can't be bound as
/// parameters, so this is the only piece of the statement that isn't a placeholder.
pub fn quote_destination(destination: &str) -> Result<String, WarehouseError> {
    let parts: Vec<&str> = destination.split('.').collect();
    if parts.is_empty() || parts.len() > 2 || !parts.iter().all(|p| IDENTIFIER.is_match(p)) {
        return Err(WarehouseError::InvalidDestination(destination.to_owned()));
    }

    Ok(parts
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join("."))
}

fn insert_statement(destination: &str) -> Result<String, WarehouseError> {
    let table = quote_destination(destination)?;
    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        COLUMNS.join(", ")
    ))
}

pub struct PgWarehouse {
    pool: PgPool,
    statement: String,
}

impl PgWarehouse {
    pub fn new(pool: PgPool, destination: &str) -> Result<Self, WarehouseError> {
        Ok(Self {
            pool,
            statement: insert_statement(destination)?,
        })
    }

    /// Connections are opened lazily, the first batch pays for the handshake.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_pg_connections)
            .connect_lazy_with(config.connect_options());

        Self::new(pool, &config.destination)
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn begin_write<'a>(
        &'a self,
    ) -> Result<Box<dyn WarehouseTransaction + 'a>, WarehouseError> {
        let txn = self.pool.begin().await.map_err(WarehouseError::from)?;
        Ok(Box::new(PgWarehouseTransaction {
            txn,
            statement: &self.statement,
        }))
    }
}

// The connection goes back to the pool when `txn` is dropped, and sqlx rolls back a transaction
// that is dropped while still open.
pub struct PgWarehouseTransaction<'a> {
    txn: Transaction<'static, Postgres>,
    statement: &'a str,
}

#[async_trait]
impl<'a> WarehouseTransaction for PgWarehouseTransaction<'a> {
    async fn insert(&mut self, row: &EventRow) -> Result<(), WarehouseError> {
        let event = &row.event;
        sqlx::query(self.statement)
            .bind(row.row_id.to_string())
            .bind(&event.request_id)
            .bind(event.request_timestamp.naive_utc())
            .bind(&event.cookie_id)
            .bind(&event.topic)
            .bind(&event.message)
            .bind(&event.environment)
            .bind(&event.website_id)
            .bind(&event.user_account_id)
            .bind(&event.location)
            .bind(&event.user_agent)
            .bind(&event.referrer)
            .execute(&mut *self.txn)
            .await
            .map_err(WarehouseError::from)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), WarehouseError> {
        self.txn.commit().await.map_err(WarehouseError::from)
    }

    async fn rollback(self: Box<Self>) -> Result<(), WarehouseError> {
        self.txn.rollback().await.map_err(WarehouseError::from)
    }
}
