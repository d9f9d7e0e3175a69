//! Relational record sink
//!
//! Writes typed records into a MySQL table over a single connection. Each
//! write is its own committed transaction; there is no batching and no retry.
//! The sink is not shareable: `write` takes `&mut self`, so concurrent
//! workers either open one sink each or serialize access themselves.

use crate::config::SinkConfig;
use crate::error::PersistenceError;
use crate::record::TypedRecord;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Anything that can persist a typed record and return its row id.
#[async_trait]
pub trait RecordWriter: Send {
    async fn write(&mut self, record: &TypedRecord) -> Result<u64, PersistenceError>;
}

/// MySQL-backed record sink
pub struct RecordSink {
    conn: Option<MySqlConnection>,
    table: String,
    insert_sql: String,
    timeout: Duration,
    unusable: bool,
}

impl RecordSink {
    /// Connect to the database described by `config`.
    pub async fn open(config: &SinkConfig) -> Result<Self, PersistenceError> {
        config
            .validate()
            .map_err(|e| PersistenceError::Config(e.to_string()))?;

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let timeout = config.timeout();
        let conn = bounded("connect", timeout, options.connect(), PersistenceError::Connection)
            .await
            .inspect_err(|e| {
                error!(host = %config.host, port = config.port, error = %e, "Failed to open record sink")
            })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            table = %config.table,
            "Opened record sink"
        );

        Ok(Self {
            conn: Some(conn),
            insert_sql: insert_sql(&config.table),
            table: config.table.clone(),
            timeout,
            unusable: false,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the destination table if it does not exist yet.
    pub async fn ensure_schema(&mut self) -> Result<(), PersistenceError> {
        let ddl = create_table_sql(&self.table);
        let limit = self.timeout;
        let conn = self.connection()?;

        let result = bounded(
            "schema creation",
            limit,
            sqlx::query(&ddl).execute(&mut *conn),
            PersistenceError::classify,
        )
        .await;

        match result {
            Ok(_) => {
                info!(table = %self.table, "Ensured destination table exists");
                Ok(())
            },
            Err(e) => {
                self.mark_failed(&e);
                error!(table = %self.table, error = %e, "Failed to create destination table");
                Err(e)
            },
        }
    }

    /// Insert one record in its own transaction; returns the new row id.
    pub async fn write(&mut self, record: &TypedRecord) -> Result<u64, PersistenceError> {
        if self.unusable {
            return Err(PersistenceError::Unusable);
        }
        let limit = self.timeout;
        let insert_sql = &self.insert_sql;
        let conn = self.conn.as_mut().ok_or(PersistenceError::Closed)?;

        let insert = async {
            let mut tx = conn.begin().await?;
            let result = sqlx::query(insert_sql.as_str())
                .bind(&record.title)
                .bind(&record.price)
                .bind(&record.category)
                .bind(&record.description)
                .bind(&record.upc)
                .bind(&record.product_type)
                .bind(&record.price_excl_tax)
                .bind(&record.price_incl_tax)
                .bind(&record.tax)
                .bind(record.availability)
                .bind(record.num_reviews)
                .bind(record.stars)
                .bind(&record.url)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.last_insert_id())
        };

        match bounded("write", limit, insert, PersistenceError::classify).await {
            Ok(id) => {
                debug!(id, upc = %record.upc, "Stored record");
                Ok(id)
            },
            Err(e) => {
                if self.mark_failed(&e) {
                    error!(upc = %record.upc, error = %e, "Record sink connection failed");
                }
                Err(e)
            },
        }
    }

    /// Release the connection. Consumes the sink, so it runs at most once.
    pub async fn close(mut self) -> Result<(), PersistenceError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        let result =
            bounded("close", self.timeout, conn.close(), PersistenceError::Connection).await;
        match &result {
            Ok(()) => info!(table = %self.table, "Closed record sink"),
            Err(e) => warn!(table = %self.table, error = %e, "Record sink closed uncleanly"),
        }
        result
    }

    /// Poison the sink on a fatal error. Returns whether it was fatal.
    fn mark_failed(&mut self, err: &PersistenceError) -> bool {
        if err.is_fatal() {
            self.unusable = true;
        }
        err.is_fatal()
    }

    fn connection(&mut self) -> Result<&mut MySqlConnection, PersistenceError> {
        if self.unusable {
            return Err(PersistenceError::Unusable);
        }
        self.conn.as_mut().ok_or(PersistenceError::Closed)
    }
}

#[async_trait]
impl RecordWriter for RecordSink {
    async fn write(&mut self, record: &TypedRecord) -> Result<u64, PersistenceError> {
        RecordSink::write(self, record).await
    }
}

impl Drop for RecordSink {
    fn drop(&mut self) {
        if self.conn.is_some() {
            warn!(table = %self.table, "Record sink dropped without close, releasing connection");
        }
    }
}

impl std::fmt::Debug for RecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("table", &self.table)
            .field("open", &self.conn.is_some())
            .field("unusable", &self.unusable)
            .finish()
    }
}

async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
    on_error: fn(sqlx::Error) -> PersistenceError,
) -> Result<T, PersistenceError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(on_error),
        Err(_) => Err(PersistenceError::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}

/// DDL for the destination table. `table` must already be a checked identifier.
pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS `{table}` (
            id INT NOT NULL AUTO_INCREMENT,
            title VARCHAR(255),
            price DECIMAL(10, 2),
            category VARCHAR(255),
            description TEXT,
            upc VARCHAR(255),
            product_type VARCHAR(255),
            price_excl_tax DECIMAL(10, 2),
            price_incl_tax DECIMAL(10, 2),
            tax DECIMAL(10, 2),
            availability INTEGER,
            num_reviews INTEGER,
            stars INTEGER,
            url VARCHAR(2083),
            PRIMARY KEY (id)
        )
        "#
    )
}

fn insert_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO `{table}` (
            title, price, category, description, upc, product_type,
            price_excl_tax, price_incl_tax, tax, availability, num_reviews, stars, url
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
}
