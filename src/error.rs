use thiserror::Error;

pub type TransporterResult<T> = Result<T, TransporterError>;

#[derive(Error, Debug)]
pub enum TransporterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A source workbook or sheet could not be opened
    #[error("{0}")]
    SourceNotFound(String),

    /// The destination workbook locator did not resolve
    #[error("Cannot resolve destination spreadsheet: {0}")]
    DestinationResolution(String),

    #[error("Destination sheet \"{0}\" is protected and cannot be edited. Please unprotect the sheet or select a different destination.")]
    ProtectedSheet(String),

    #[error("Cannot access the selected folder. It may have been deleted or you lost access. Please select again. ({0})")]
    FolderAccess(String),

    #[error("Invalid folder URL/ID pasted. Please check the URL and try again. ({0})")]
    InvalidFolderReference(String),

    #[error("Header row {row} is outside the source range ({available} rows available)")]
    InvalidHeaderRow { row: u32, available: usize },

    #[error("Invalid range '{0}'")]
    InvalidRange(String),

    /// Failure reported by a store backend
    #[error("Store error: {0}")]
    Store(String),

    #[error("Excel error: {0}")]
    Excel(String),

    /// A run finished with an error outcome (CLI exit status)
    #[error("Run failed: {0}")]
    RunFailed(String),
}

impl TransporterError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn missing_source_sheet(sheet: &str, workbook: &str) -> Self {
        Self::SourceNotFound(format!(
            "Sheet \"{}\" not found in source spreadsheet \"{}\". Please check the sheet name.",
            sheet, workbook
        ))
    }

    pub fn missing_source_workbook(locator: &str, cause: &TransporterError) -> Self {
        Self::SourceNotFound(format!(
            "Source spreadsheet \"{}\" could not be opened: {}",
            locator, cause
        ))
    }
}
