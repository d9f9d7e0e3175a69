//! Bookscraper Library
//!
//! The normalization and request-shaping core of a catalog scraper.
//!
//! # Components
//!
//! - **normalizer**: raw string records to typed records, one rule per field
//! - **headers**: pool of realistic browser header sets from a remote provider
//! - **shaper**: attaches a random header set to each outbound request
//! - **sink**: persists typed records into MySQL
//! - **pipeline**: drives one record through normalize and write
//!
//! # Example
//!
//! ```no_run
//! use bookscraper::config::ScraperConfig;
//! use bookscraper::pipeline;
//! use bookscraper::sink::RecordSink;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ScraperConfig::load()?;
//!
//!     let mut sink = RecordSink::open(&config.sink).await?;
//!     sink.ensure_schema().await?;
//!     let stats = pipeline::ingest_file("./data/books.jsonl".as_ref(), &mut sink).await;
//!     sink.close().await?;
//!
//!     println!("{:?}", stats?);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod headers;
pub mod normalizer;
pub mod pipeline;
pub mod record;
pub mod shaper;
pub mod sink;

pub use error::{HeaderPoolError, PersistenceError, Result, ScrapeError, ValidationError};
pub use headers::{HeaderPool, HeaderTemplate};
pub use normalizer::normalize;
pub use record::{Field, RawRecord, TypedRecord};
pub use shaper::RequestShaper;
pub use sink::{RecordSink, RecordWriter};
