//! Transporter - spreadsheet data migration and archival
//!
//! This library moves rows between spreadsheets and produces archived copies
//! of workbooks, driven by declarative YAML/JSON configurations.
//!
//! # Features
//!
//! - Transfers: merge sources into a destination sheet (append or replace)
//! - Column selection by header name, optional import timestamp
//! - Atomic, row-by-row and batched write strategies
//! - Format, header-format and conditional-format copying
//! - Archives: sheet subsets, row filters, trailing blank-space cleanup
//! - JSON Schema validation of configurations
//! - In-memory and `.xlsx` directory stores
//!
//! # Example
//!
//! ```no_run
//! use royalbit_transporter::config::Configuration;
//! use royalbit_transporter::core::{execute, RunContext};
//! use royalbit_transporter::store::XlsxStore;
//! use std::path::Path;
//!
//! let config = Configuration::load(Path::new("transfer.yaml"))?;
//! let mut store = XlsxStore::open("drive")?;
//!
//! let outcome = execute(&mut store, &config, &RunContext::new());
//! println!("{}", outcome.message);
//! # Ok::<(), royalbit_transporter::error::TransporterError>(())
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod mcp;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{TransporterError, TransporterResult};
pub use types::{CellValue, RunOutcome, RunStatus, ValueMatrix};
