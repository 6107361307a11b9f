//! Migration and archive engine
//!
//! - [`migration`]: project rows from sources and write them to a destination
//! - [`archive`]: clone a workbook, keep a sheet subset, filter, compact
//! - [`router`]: dispatch a [`Configuration`](crate::config::Configuration) by mode

pub mod archive;
pub mod compactor;
pub mod filter;
pub mod migration;
pub mod projection;
pub mod router;
pub mod strategy;

pub use archive::run_archive;
pub use compactor::{compact_workbook, CleanupReport};
pub use migration::{run_migration, TempSheetGuard};
pub use router::{execute, run_execution, sheet_columns, sheet_names};
pub use strategy::Strategy;

use chrono::{DateTime, Local, NaiveDate};

use crate::store::WorkbookId;

/// Ambient state of one invocation
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Clock reading used for names, timestamps and relative dates
    pub now: DateTime<Local>,
    /// Workbook bound to the `current` destination
    pub active_workbook: Option<WorkbookId>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::at(Local::now())
    }

    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            now,
            active_workbook: None,
        }
    }

    pub fn with_active_workbook(mut self, workbook: WorkbookId) -> Self {
        self.active_workbook = Some(workbook);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// File id inside a URL or raw id: the first run of 25+ id characters,
/// else the trimmed input
pub fn extract_file_id(input: &str) -> String {
    use regex::Regex;
    use std::sync::OnceLock;

    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let input = input.trim();
    RE.get_or_init(|| Regex::new(r"[-A-Za-z0-9_]{25,}").ok())
        .as_ref()
        .and_then(|re| re.find(input))
        .map_or_else(|| input.to_string(), |m| m.as_str().to_string())
}
