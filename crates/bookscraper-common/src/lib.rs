//! Bookscraper Common Library
//!
//! Shared error handling and logging for the bookscraper workspace.
//!
//! # Example
//!
//! ```no_run
//! use bookscraper_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> bookscraper_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("Scraper started");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
