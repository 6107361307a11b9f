//! Run configuration: a transfer or archive job
//!
//! Input passes three gates, in order:
//! 1. JSON Schema (`schema/transporter-config.schema.json`)
//! 2. serde deserialization into [`Configuration`]
//! 3. [`Configuration::validate`] for the rules a schema cannot express

pub mod store;

pub use store::{ConfigStore, SavedConfig};

use jsonschema::JSONSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{TransporterError, TransporterResult};
use crate::store::a1;

pub const DEFAULT_DESTINATION_SHEET: &str = "Migrated_Data";
pub const DEFAULT_START_CELL: &str = "A1";
pub const DEFAULT_BATCH_SIZE: u32 = 100;

//==============================================================================
// Configuration
//==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Configuration {
    Transfer(TransferConfig),
    Archive(ArchiveConfig),
}

impl Configuration {
    /// Saved-configuration id, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Configuration::Transfer(c) => c.id.as_deref(),
            Configuration::Archive(c) => c.id.as_deref(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Configuration::Transfer(c) => c.name.as_deref(),
            Configuration::Archive(c) => c.name.as_deref(),
        }
    }

    pub fn set_id(&mut self, id: Option<String>) {
        match self {
            Configuration::Transfer(c) => c.id = id,
            Configuration::Archive(c) => c.id = id,
        }
    }

    pub fn set_name(&mut self, name: Option<String>) {
        match self {
            Configuration::Transfer(c) => c.name = name,
            Configuration::Archive(c) => c.name = name,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Configuration::Transfer(_) => "transfer",
            Configuration::Archive(_) => "archive",
        }
    }

    /// Semantic checks beyond the schema
    pub fn validate(&self) -> TransporterResult<()> {
        match self {
            Configuration::Transfer(c) => c.validate(),
            Configuration::Archive(c) => c.validate(),
        }
    }

    /// Schema-check, deserialize and validate a JSON value
    pub fn from_value(value: serde_json::Value) -> TransporterResult<Self> {
        validate_against_schema(&value)?;
        let config: Configuration = serde_json::from_value(value)
            .map_err(|e| TransporterError::Validation(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML (or JSON, which YAML accepts) text
    pub fn parse(content: &str) -> TransporterResult<Self> {
        let value: serde_json::Value = serde_yaml::from_str(content)?;
        Self::from_value(value)
    }

    /// Load a configuration file; `.json` files use the JSON parser
    pub fn load(path: &Path) -> TransporterResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_value(serde_json::from_str(&content)?)
        } else {
            Self::parse(&content)
        }
    }
}

/// Validate a configuration value against the embedded JSON Schema
pub fn validate_against_schema(value: &serde_json::Value) -> TransporterResult<()> {
    let schema_str = include_str!("../../schema/transporter-config.schema.json");
    let schema_value: serde_json::Value = serde_json::from_str(schema_str)
        .map_err(|e| TransporterError::Validation(format!("Failed to parse schema: {}", e)))?;

    let compiled_schema = JSONSchema::compile(&schema_value)
        .map_err(|e| TransporterError::Validation(format!("Failed to compile schema: {}", e)))?;

    if let Err(errors) = compiled_schema.validate(value) {
        let error_messages: Vec<String> = errors.map(|e| format!("  - {}", e)).collect();
        return Err(TransporterError::Validation(format!(
            "Schema validation failed:\n{}",
            error_messages.join("\n")
        )));
    }

    Ok(())
}

//==============================================================================
// Transfer
//==============================================================================

/// Where migrated rows go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DestinationLocator {
    /// A workbook created for this run
    New,
    /// The caller's active workbook
    Current,
    /// An existing workbook id (or URL)
    Id(String),
}

impl From<String> for DestinationLocator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new" => DestinationLocator::New,
            "current" => DestinationLocator::Current,
            _ => DestinationLocator::Id(s),
        }
    }
}

impl From<DestinationLocator> for String {
    fn from(d: DestinationLocator) -> Self {
        match d {
            DestinationLocator::New => "new".to_string(),
            DestinationLocator::Current => "current".to_string(),
            DestinationLocator::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    #[default]
    Append,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStrategy {
    #[default]
    Atomic,
    RowByRow,
    Batched,
}

/// One source sheet of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceSpec {
    pub source_locator: String,
    pub sheet_name: String,
    /// A1 range; the sheet's data range when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// 1-based header row within the range
    #[serde(default = "default_header_row")]
    pub header_row_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_columns: Option<Vec<String>>,
}

fn default_header_row() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransferConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub destination: DestinationLocator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_sheet_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_start_cell: Option<String>,
    #[serde(default)]
    pub data_mode: DataMode,
    #[serde(default)]
    pub execution_strategy: ExecutionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    pub sources: Vec<SourceSpec>,

    #[serde(default)]
    pub include_headers: bool,
    #[serde(default)]
    pub include_formulas: bool,
    #[serde(default)]
    pub include_formatting: bool,
    #[serde(default)]
    pub include_header_formats: bool,
    #[serde(default)]
    pub include_conditional_formats: bool,
    #[serde(default)]
    pub include_table_format_sync: bool,
    #[serde(default)]
    pub add_timestamp: bool,
}

impl TransferConfig {
    /// Transfer with defaults for everything but the destination and sources
    pub fn new(destination: DestinationLocator, sources: Vec<SourceSpec>) -> Self {
        Self {
            id: None,
            name: None,
            destination,
            destination_sheet_name: None,
            destination_start_cell: None,
            data_mode: DataMode::default(),
            execution_strategy: ExecutionStrategy::default(),
            batch_size: None,
            sources,
            include_headers: false,
            include_formulas: false,
            include_formatting: false,
            include_header_formats: false,
            include_conditional_formats: false,
            include_table_format_sync: false,
            add_timestamp: false,
        }
    }

    pub fn destination_sheet(&self) -> &str {
        match self.destination_sheet_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => DEFAULT_DESTINATION_SHEET,
        }
    }

    pub fn start_cell(&self) -> &str {
        match self.destination_start_cell.as_deref() {
            Some(cell) if !cell.trim().is_empty() => cell,
            _ => DEFAULT_START_CELL,
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn wants_format_copy(&self) -> bool {
        self.include_formatting || self.include_header_formats || self.include_conditional_formats
    }

    pub fn validate(&self) -> TransporterResult<()> {
        if let DestinationLocator::Id(id) = &self.destination {
            if id.trim().is_empty() {
                return Err(TransporterError::Validation(
                    "destination must be \"new\", \"current\" or a workbook id".to_string(),
                ));
            }
        }
        a1::parse_cell(self.start_cell()).map_err(|_| {
            TransporterError::Validation(format!(
                "destinationStartCell '{}' is not a cell reference",
                self.start_cell()
            ))
        })?;
        if self.batch_size == Some(0) {
            return Err(TransporterError::Validation(
                "batchSize must be at least 1".to_string(),
            ));
        }
        if self.sources.is_empty() {
            return Err(TransporterError::Validation(
                "at least one source is required".to_string(),
            ));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.source_locator.trim().is_empty() || source.sheet_name.trim().is_empty() {
                return Err(TransporterError::Validation(format!(
                    "source #{} needs a sourceLocator and a sheetName",
                    i + 1
                )));
            }
            if source.header_row_index == 0 {
                return Err(TransporterError::Validation(format!(
                    "source #{}: headerRowIndex is 1-based",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

//==============================================================================
// Archive
//==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    File,
    Sheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationMode {
    #[default]
    Root,
    Select,
    Paste,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Text,
    Number,
    Date,
}

/// Filter operator; unrecognized names are kept as [`FilterOperator::Other`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterOperator {
    IsEmpty,
    IsNotEmpty,
    Equals,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Today,
    Yesterday,
    Tomorrow,
    LastNDays,
    NextNDays,
    Other(String),
}

impl FilterOperator {
    pub fn as_str(&self) -> &str {
        match self {
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::IsNotEmpty => "is_not_empty",
            FilterOperator::Equals => "equals",
            FilterOperator::NotEqual => "not_equal",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::Today => "today",
            FilterOperator::Yesterday => "yesterday",
            FilterOperator::Tomorrow => "tomorrow",
            FilterOperator::LastNDays => "last_n_days",
            FilterOperator::NextNDays => "next_n_days",
            FilterOperator::Other(name) => name,
        }
    }
}

impl From<String> for FilterOperator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "is_empty" => FilterOperator::IsEmpty,
            "is_not_empty" => FilterOperator::IsNotEmpty,
            "equals" => FilterOperator::Equals,
            "not_equal" => FilterOperator::NotEqual,
            "contains" => FilterOperator::Contains,
            "starts_with" => FilterOperator::StartsWith,
            "ends_with" => FilterOperator::EndsWith,
            "greater_than" => FilterOperator::GreaterThan,
            "less_than" => FilterOperator::LessThan,
            "today" => FilterOperator::Today,
            "yesterday" => FilterOperator::Yesterday,
            "tomorrow" => FilterOperator::Tomorrow,
            "last_n_days" => FilterOperator::LastNDays,
            "next_n_days" => FilterOperator::NextNDays,
            _ => FilterOperator::Other(s),
        }
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column predicate applied to one sheet of an archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterDescriptor {
    pub sheet: String,
    pub column: String,
    #[serde(rename = "type", default)]
    pub filter_type: FilterType,
    pub operator: FilterOperator,
    /// Comparison value; numbers and booleans are read as their text
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
}

impl FilterDescriptor {
    pub fn new(
        sheet: &str,
        column: &str,
        filter_type: FilterType,
        operator: FilterOperator,
        value: &str,
    ) -> Self {
        Self {
            sheet: sheet.to_string(),
            column: column.to_string(),
            filter_type,
            operator,
            value: value.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LenientValue>::deserialize(deserializer)? {
        None => String::new(),
        Some(LenientValue::Text(s)) => s,
        Some(LenientValue::Int(i)) => i.to_string(),
        Some(LenientValue::Float(f)) => f.to_string(),
        Some(LenientValue::Bool(b)) => b.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArchiveConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Source workbook id or URL
    #[serde(default)]
    pub source_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheets: Option<Vec<String>>,
    #[serde(default)]
    pub destination_mode: DestinationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name_override: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,
    #[serde(default)]
    pub cleanup: bool,
}

impl ArchiveConfig {
    pub fn new(source_locator: &str) -> Self {
        Self {
            source_locator: source_locator.to_string(),
            ..Self::default()
        }
    }

    /// Sheets to keep, when a non-empty subset was chosen
    pub fn sheet_subset(&self) -> Option<&[String]> {
        match (&self.source_type, &self.sheets) {
            (SourceType::Sheet, Some(sheets)) if !sheets.is_empty() => Some(sheets),
            _ => None,
        }
    }

    pub fn validate(&self) -> TransporterResult<()> {
        if self.source_locator.trim().is_empty() {
            return Err(TransporterError::config(
                "Archive source spreadsheet is missing",
            ));
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if filter.sheet.trim().is_empty() || filter.column.trim().is_empty() {
                return Err(TransporterError::Validation(format!(
                    "filter #{} needs a sheet and a column",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFER_YAML: &str = r#"
mode: transfer
destination: "1AbCdEfGhIjKlMnOpQrStUvWxYz0123456789"
destinationSheetName: Combined
dataMode: replace
executionStrategy: batched
batchSize: 25
includeHeaders: true
sources:
  - sourceLocator: https://docs.example.com/d/abc/edit
    sheetName: Orders
    headerRowIndex: 2
    includedColumns: [Date, Total]
"#;

    #[test]
    fn test_parse_transfer() {
        let config = Configuration::parse(TRANSFER_YAML).unwrap();
        let Configuration::Transfer(t) = config else {
            panic!("expected transfer");
        };
        assert_eq!(
            t.destination,
            DestinationLocator::Id("1AbCdEfGhIjKlMnOpQrStUvWxYz0123456789".into())
        );
        assert_eq!(t.destination_sheet(), "Combined");
        assert_eq!(t.start_cell(), "A1");
        assert_eq!(t.data_mode, DataMode::Replace);
        assert_eq!(t.execution_strategy, ExecutionStrategy::Batched);
        assert_eq!(t.batch_size(), 25);
        assert!(t.include_headers);
        assert!(!t.add_timestamp);
        assert_eq!(t.sources[0].header_row_index, 2);
        assert_eq!(
            t.sources[0].included_columns.as_deref(),
            Some(&["Date".to_string(), "Total".to_string()][..])
        );
    }

    #[test]
    fn test_transfer_defaults() {
        let config = Configuration::parse(
            "mode: transfer\ndestination: new\nsources:\n  - {sourceLocator: abc, sheetName: S}\n",
        )
        .unwrap();
        let Configuration::Transfer(t) = config else {
            panic!("expected transfer");
        };
        assert_eq!(t.destination, DestinationLocator::New);
        assert_eq!(t.destination_sheet(), DEFAULT_DESTINATION_SHEET);
        assert_eq!(t.data_mode, DataMode::Append);
        assert_eq!(t.execution_strategy, ExecutionStrategy::Atomic);
        assert_eq!(t.batch_size(), DEFAULT_BATCH_SIZE);
        assert_eq!(t.sources[0].header_row_index, 1);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Configuration::parse(
            "mode: transfer\ndestination: new\ncolour: red\nsources:\n  - {sourceLocator: a, sheetName: S}\n",
        )
        .unwrap_err();
        assert!(matches!(err, TransporterError::Validation(_)));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = Configuration::parse(
            "mode: transfer\ndestination: new\nexecutionStrategy: parallel\nsources:\n  - {sourceLocator: a, sheetName: S}\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Schema validation failed"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut t = TransferConfig::new(
            DestinationLocator::New,
            vec![SourceSpec {
                source_locator: "a".into(),
                sheet_name: "S".into(),
                range: None,
                header_row_index: 1,
                included_columns: None,
            }],
        );
        t.batch_size = Some(0);
        assert!(t.validate().is_err());
        t.batch_size = Some(1);
        assert!(t.validate().is_ok());
        t.destination_start_cell = Some("1A".into());
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_empty_sources_rejected() {
        let err = Configuration::parse("mode: transfer\ndestination: new\nsources: []\n")
            .unwrap_err();
        assert!(matches!(err, TransporterError::Validation(_)));
    }

    #[test]
    fn test_parse_archive_with_lenient_filter_values() {
        let config = Configuration::parse(
            r#"
mode: archive
sourceLocator: abc
sourceType: sheet
sheets: [Q1, Q2]
destinationMode: paste
folderLocator: https://drive.example.com/folders/0B1234567890abcdefghijklmnop
filters:
  - {sheet: Q1, column: Amount, type: number, operator: greater_than, value: 100}
  - {sheet: Q1, column: Closed, type: date, operator: last_n_days, value: "7"}
  - {sheet: Q2, column: Status, type: text, operator: fuzzy, value: null}
cleanup: true
"#,
        )
        .unwrap();
        let Configuration::Archive(a) = config else {
            panic!("expected archive");
        };
        assert_eq!(a.sheet_subset(), Some(&["Q1".to_string(), "Q2".to_string()][..]));
        assert_eq!(a.destination_mode, DestinationMode::Paste);
        assert_eq!(a.filters[0].value, "100");
        assert_eq!(a.filters[0].operator, FilterOperator::GreaterThan);
        assert_eq!(a.filters[1].filter_type, FilterType::Date);
        assert_eq!(a.filters[2].operator, FilterOperator::Other("fuzzy".into()));
        assert_eq!(a.filters[2].value, "");
        assert!(a.cleanup);
    }

    #[test]
    fn test_archive_missing_source_rejected() {
        let err = Configuration::parse("mode: archive\n").unwrap_err();
        assert!(err.to_string().contains("Archive source spreadsheet is missing"));
    }

    #[test]
    fn test_serialize_round_trip_keeps_mode_tag() {
        let config = Configuration::Archive(ArchiveConfig::new("abc"));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["mode"], "archive");
        assert_eq!(json["sourceLocator"], "abc");
        assert_eq!(Configuration::from_value(json).unwrap(), config);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r#"{"mode":"transfer","destination":"current","sources":[{"sourceLocator":"a","sheetName":"S"}]}"#,
        )
        .unwrap();
        let config = Configuration::load(&path).unwrap();
        assert_eq!(config.mode(), "transfer");
    }
}
