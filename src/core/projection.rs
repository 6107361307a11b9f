//! Column projection: raw source rectangle → headers + data rows

use crate::error::{TransporterError, TransporterResult};
use crate::types::{CellValue, FormulaMatrix, ValueMatrix};

pub const TIMESTAMP_HEADER: &str = "Import Timestamp";
/// `dd/MM/yyyy HH:mm:ss`, local time
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// What happens to an included column name that no header matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedColumnPolicy {
    /// Skip the name; the remaining columns keep their order
    #[default]
    Drop,
}

#[derive(Debug, Clone)]
pub struct ProjectionOptions<'a> {
    /// 1-based header row within the raw rectangle
    pub header_row_index: u32,
    pub included_columns: Option<&'a [String]>,
    pub add_timestamp: bool,
    /// Headers were already written earlier in this run
    pub already_has_headers: bool,
    pub timestamp: &'a str,
    pub unmatched: UnmatchedColumnPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub headers: Vec<CellValue>,
    pub data_rows: ValueMatrix,
    /// Raw column index (0-based) feeding each projected column, timestamp excluded
    pub column_indices: Vec<usize>,
    /// A timestamp column was prepended to the data rows
    pub timestamped: bool,
}

impl Projection {
    /// Offset of the first projected source column in each written row
    pub fn column_offset(&self) -> usize {
        usize::from(self.timestamped)
    }
}

/// Replace each value with its formula text where a formula exists
pub fn overlay_formulas(values: &ValueMatrix, formulas: &FormulaMatrix) -> ValueMatrix {
    values
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, value)| match formulas.get(r).and_then(|f| f.get(c)) {
                    Some(formula) if !formula.is_empty() => CellValue::Text(formula.clone()),
                    _ => value.clone(),
                })
                .collect()
        })
        .collect()
}

/// Resolve included column names against the header row (exact, first match)
pub fn resolve_columns(
    headers: &[CellValue],
    included: Option<&[String]>,
    policy: UnmatchedColumnPolicy,
) -> Vec<usize> {
    match included {
        Some(names) if !names.is_empty() => names
            .iter()
            .filter_map(|name| {
                let found = headers.iter().position(|h| h.to_string() == *name);
                match policy {
                    UnmatchedColumnPolicy::Drop => found,
                }
            })
            .collect(),
        _ => (0..headers.len()).collect(),
    }
}

pub fn project(
    raw_values: &ValueMatrix,
    raw_formulas: Option<&FormulaMatrix>,
    options: &ProjectionOptions<'_>,
) -> TransporterResult<Projection> {
    let header_index = options.header_row_index as usize;
    if header_index == 0 || header_index > raw_values.len() {
        return Err(TransporterError::InvalidHeaderRow {
            row: options.header_row_index,
            available: raw_values.len(),
        });
    }

    let raw_headers = &raw_values[header_index - 1];
    let column_indices = resolve_columns(raw_headers, options.included_columns, options.unmatched);

    let overlaid;
    let values = match raw_formulas {
        Some(formulas) => {
            overlaid = overlay_formulas(raw_values, formulas);
            &overlaid
        }
        None => raw_values,
    };

    let pick = |row: &[CellValue]| -> Vec<CellValue> {
        column_indices
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or_default())
            .collect()
    };

    let mut headers = pick(raw_headers.as_slice());
    let mut data_rows: ValueMatrix = values[header_index..]
        .iter()
        .map(|r| pick(r.as_slice()))
        .collect();

    if options.add_timestamp {
        let stamp = CellValue::from(options.timestamp);
        if !options.already_has_headers {
            headers.insert(0, CellValue::from(TIMESTAMP_HEADER));
        }
        for row in &mut data_rows {
            row.insert(0, stamp.clone());
        }
    }

    Ok(Projection {
        headers,
        data_rows,
        column_indices,
        timestamped: options.add_timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::text_row;
    use pretty_assertions::assert_eq;

    fn options<'a>(included: Option<&'a [String]>) -> ProjectionOptions<'a> {
        ProjectionOptions {
            header_row_index: 1,
            included_columns: included,
            add_timestamp: false,
            already_has_headers: false,
            timestamp: "15/01/2024 10:00:00",
            unmatched: UnmatchedColumnPolicy::Drop,
        }
    }

    fn raw() -> ValueMatrix {
        vec![
            text_row(&["A", "B", "C"]),
            text_row(&["a1", "b1", "c1"]),
            text_row(&["a2", "b2", "c2"]),
        ]
    }

    #[test]
    fn test_all_columns_in_natural_order() {
        let p = project(&raw(), None, &options(None)).unwrap();
        assert_eq!(p.headers, text_row(&["A", "B", "C"]));
        assert_eq!(p.data_rows.len(), 2);
        assert_eq!(p.column_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_included_columns_follow_list_order() {
        let included = vec!["B".to_string(), "A".to_string()];
        let p = project(&raw(), None, &options(Some(&included))).unwrap();
        assert_eq!(p.headers, text_row(&["B", "A"]));
        assert_eq!(p.data_rows[0], text_row(&["b1", "a1"]));
    }

    #[test]
    fn test_unmatched_columns_dropped() {
        let included = vec!["Z".to_string(), "C".to_string()];
        let p = project(&raw(), None, &options(Some(&included))).unwrap();
        assert_eq!(p.headers, text_row(&["C"]));
        assert_eq!(p.column_indices, vec![2]);
    }

    #[test]
    fn test_timestamp_prepended_to_headers_and_rows() {
        let mut opts = options(None);
        opts.add_timestamp = true;
        let p = project(&raw(), None, &opts).unwrap();
        assert_eq!(p.headers[0], CellValue::from(TIMESTAMP_HEADER));
        for row in &p.data_rows {
            assert_eq!(row[0], CellValue::from("15/01/2024 10:00:00"));
            assert_eq!(row.len(), p.headers.len());
        }
        assert_eq!(p.column_offset(), 1);
    }

    #[test]
    fn test_timestamp_header_skipped_when_headers_written() {
        let mut opts = options(None);
        opts.add_timestamp = true;
        opts.already_has_headers = true;
        let p = project(&raw(), None, &opts).unwrap();
        assert_eq!(p.headers, text_row(&["A", "B", "C"]));
        assert_eq!(p.data_rows[0].len(), 4);
    }

    #[test]
    fn test_header_row_index_selects_header() {
        let mut values = raw();
        values.insert(0, text_row(&["title", "", ""]));
        let mut opts = options(None);
        opts.header_row_index = 2;
        let p = project(&values, None, &opts).unwrap();
        assert_eq!(p.headers, text_row(&["A", "B", "C"]));
        assert_eq!(p.data_rows.len(), 2);
    }

    #[test]
    fn test_invalid_header_row() {
        let mut opts = options(None);
        opts.header_row_index = 0;
        assert!(matches!(
            project(&raw(), None, &opts),
            Err(TransporterError::InvalidHeaderRow { row: 0, .. })
        ));
        opts.header_row_index = 4;
        assert!(matches!(
            project(&raw(), None, &opts),
            Err(TransporterError::InvalidHeaderRow { row: 4, available: 3 })
        ));
    }

    #[test]
    fn test_header_only_source_has_no_rows() {
        let values = vec![text_row(&["A", "B"])];
        let p = project(&values, None, &options(None)).unwrap();
        assert!(p.data_rows.is_empty());
    }

    #[test]
    fn test_formula_overlay_wins() {
        let values = vec![
            text_row(&["Qty", "Total"]),
            vec![CellValue::Number(2.0), CellValue::Number(4.0)],
        ];
        let formulas = vec![
            vec![String::new(), String::new()],
            vec![String::new(), "=A2*2".to_string()],
        ];
        let p = project(&values, Some(&formulas), &options(None)).unwrap();
        assert_eq!(
            p.data_rows[0],
            vec![CellValue::Number(2.0), CellValue::from("=A2*2")]
        );
    }
}
