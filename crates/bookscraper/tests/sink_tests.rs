//! Integration tests for the MySQL record sink
//!
//! These tests require Docker to be running. Run with:
//!
//! ```bash
//! cargo test -p bookscraper --test sink_tests -- --ignored --nocapture
//! ```

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use bookscraper::config::SinkConfig;
use bookscraper::error::PersistenceError;
use bookscraper::normalizer::normalize;
use bookscraper::pipeline::{self, ItemOutcome};
use bookscraper::record::{Field, RawRecord, TypedRecord};
use bookscraper::sink::RecordSink;
use sqlx::{Connection, MySqlConnection};
use std::str::FromStr;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::mysql::Mysql;

/// MySQL container plus the sink settings pointing at it
struct TestMysql {
    container: ContainerAsync<Mysql>,
    config: SinkConfig,
}

impl TestMysql {
    async fn start() -> Result<Self> {
        let container = Mysql::default()
            .start()
            .await
            .context("Failed to start MySQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(3306.tcp())
            .await
            .context("Failed to get container port")?;

        let config = SinkConfig {
            host: host.to_string(),
            port,
            user: "root".to_string(),
            password: String::new(),
            database: "test".to_string(),
            table: "books".to_string(),
            timeout_secs: 30,
        };

        Ok(Self {
            container,
            config,
        })
    }

    /// A second connection for checking what the sink wrote
    async fn inspect(&self) -> Result<MySqlConnection> {
        let url = format!(
            "mysql://{}@{}:{}/{}",
            self.config.user, self.config.host, self.config.port, self.config.database
        );
        MySqlConnection::connect(&url)
            .await
            .context("Failed to open inspection connection")
    }
}

fn sapiens() -> RawRecord {
    RawRecord::new()
        .with(Field::Title, " Sapiens ")
        .with(Field::Price, "£29.99")
        .with(Field::Category, "NONFICTION")
        .with(Field::Description, "From a renowned historian comes a groundbreaking narrative.")
        .with(Field::Upc, "4165285e1663650f")
        .with(Field::ProductType, "Books")
        .with(Field::PriceExclTax, "£29.99")
        .with(Field::PriceInclTax, "£29.99")
        .with(Field::Tax, "£0.00")
        .with(Field::Availability, "In stock (22 available)")
        .with(Field::NumReviews, "0")
        .with(Field::Stars, "Star rating Four")
        .with(Field::Url, "https://books.toscrape.com/catalogue/sapiens_996/index.html")
}

fn typed_sapiens() -> TypedRecord {
    normalize(&sapiens()).expect("Sapiens should normalize")
}

async fn row_count(conn: &mut MySqlConnection) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(conn)
        .await
        .expect("Failed to count rows")
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_ensure_schema_is_idempotent() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let mut sink = RecordSink::open(&mysql.config).await.expect("Failed to open sink");
    sink.ensure_schema().await.expect("First schema creation failed");
    sink.ensure_schema().await.expect("Second schema creation failed");
    sink.close().await.expect("Failed to close sink");

    let mut conn = mysql.inspect().await.unwrap();
    assert_eq!(row_count(&mut conn).await, 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_write_sapiens_creates_one_matching_row() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let mut sink = RecordSink::open(&mysql.config).await.unwrap();
    sink.ensure_schema().await.unwrap();

    let outcome = pipeline::process(&sapiens(), &mut sink).await.unwrap();
    assert!(matches!(outcome, ItemOutcome::Stored { .. }));
    sink.close().await.unwrap();

    let mut conn = mysql.inspect().await.unwrap();
    assert_eq!(row_count(&mut conn).await, 1);

    let (title, price, category, tax, availability, num_reviews, stars): (
        String,
        BigDecimal,
        String,
        BigDecimal,
        i32,
        i32,
        i32,
    ) = sqlx::query_as(
        "SELECT title, price, category, tax, availability, num_reviews, stars FROM books",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();

    assert_eq!(title, "Sapiens");
    assert_eq!(price, BigDecimal::from_str("29.99").unwrap());
    assert_eq!(category, "nonfiction");
    assert_eq!(tax, BigDecimal::from_str("0.00").unwrap());
    assert_eq!(availability, 22);
    assert_eq!(num_reviews, 0);
    assert_eq!(stars, 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_write_returns_increasing_ids() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let mut sink = RecordSink::open(&mysql.config).await.unwrap();
    sink.ensure_schema().await.unwrap();

    let first = sink.write(&typed_sapiens()).await.unwrap();
    let second = sink.write(&typed_sapiens()).await.unwrap();
    assert!(second > first);

    sink.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_close_after_failed_write() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let mut sink = RecordSink::open(&mysql.config).await.unwrap();
    sink.ensure_schema().await.unwrap();

    // Strict mode rejects a title wider than VARCHAR(255)
    let oversized = TypedRecord {
        title: "x".repeat(300),
        ..typed_sapiens()
    };
    let err = sink.write(&oversized).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Write(_)));
    assert!(!err.is_fatal());

    // The connection is still usable after a row-level failure
    sink.write(&typed_sapiens()).await.unwrap();
    sink.close().await.expect("close must succeed after a failed write");

    let mut conn = mysql.inspect().await.unwrap();
    assert_eq!(row_count(&mut conn).await, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_write_without_schema_is_row_level_failure() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let config = SinkConfig {
        table: "missing_table".to_string(),
        ..mysql.config.clone()
    };
    let mut sink = RecordSink::open(&config).await.unwrap();

    let err = sink.write(&typed_sapiens()).await.unwrap_err();
    assert!(!err.is_fatal());
    sink.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_open_with_wrong_password_is_fatal() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let config = SinkConfig {
        user: "nobody".to_string(),
        password: "wrong".to_string(),
        ..mysql.config.clone()
    };
    let err = RecordSink::open(&config).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sink_refuses_writes_after_connection_loss() {
    let mysql = TestMysql::start().await.expect("Failed to start MySQL");

    let config = SinkConfig {
        timeout_secs: 5,
        ..mysql.config.clone()
    };
    let mut sink = RecordSink::open(&config).await.unwrap();
    sink.ensure_schema().await.unwrap();
    sink.write(&typed_sapiens()).await.unwrap();

    mysql.container.stop().await.expect("Failed to stop MySQL container");

    let err = sink.write(&typed_sapiens()).await.unwrap_err();
    assert!(err.is_fatal(), "expected a fatal error, got {err:?}");

    let err = sink.write(&typed_sapiens()).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Unusable));
    assert!(matches!(
        sink.ensure_schema().await,
        Err(PersistenceError::Unusable)
    ));

    // The connection is still handed back, cleanly or not, within the bound
    let _ = tokio::time::timeout(Duration::from_secs(30), sink.close())
        .await
        .expect("close must finish after a fatal error");
}
