//! A1 notation helpers (cell and range references)

use crate::error::{TransporterError, TransporterResult};

use super::GridArea;

/// Largest row an xlsx sheet can hold
pub const MAX_ROWS: u32 = 1_048_576;
/// Largest column an xlsx sheet can hold (`XFD`)
pub const MAX_COLUMNS: u32 = 16_384;

/// Convert 1-based column index to letters (1 → A, 27 → AA)
pub fn column_letter(index: u32) -> String {
    let mut result = String::new();
    let mut n = index;
    while n > 0 {
        let rem = (n - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    result
}

/// Convert column letters to a 1-based index (A → 1, AA → 27)
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() {
            acc.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)
        } else {
            None
        }
    })
}

/// Format a 1-based (row, column) pair as A1 text
pub fn cell_name(row: u32, column: u32) -> String {
    format!("{}{}", column_letter(column), row)
}

/// One side of a range reference; either half may be open ("A" or "3")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoint {
    row: Option<u32>,
    column: Option<u32>,
}

fn parse_endpoint(text: &str, original: &str) -> TransporterResult<Endpoint> {
    let text = text.replace('$', "");
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(text.len());
    let (letters, digits) = text.split_at(split);

    let column = if letters.is_empty() {
        None
    } else {
        let column = column_index(letters).ok_or_else(|| invalid(original))?;
        if column > MAX_COLUMNS {
            return Err(invalid(original));
        }
        Some(column)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let row: u32 = digits.parse().map_err(|_| invalid(original))?;
        if row == 0 || row > MAX_ROWS {
            return Err(invalid(original));
        }
        Some(row)
    };

    if row.is_none() && column.is_none() {
        return Err(invalid(original));
    }
    Ok(Endpoint { row, column })
}

fn invalid(text: &str) -> TransporterError {
    TransporterError::InvalidRange(text.to_string())
}

fn strip_sheet_prefix(text: &str) -> &str {
    match text.rfind('!') {
        Some(pos) => &text[pos + 1..],
        None => text,
    }
}

/// Parse a single cell reference such as `B3`
pub fn parse_cell(text: &str) -> TransporterResult<(u32, u32)> {
    let trimmed = strip_sheet_prefix(text.trim());
    let endpoint = parse_endpoint(trimmed, text)?;
    match (endpoint.row, endpoint.column) {
        (Some(row), Some(column)) => Ok((row, column)),
        _ => Err(invalid(text)),
    }
}

/// Parse a range reference (`A1:C10`, `B2`, `A:C`, `A2:C`, `Sheet1!A1:B2`)
/// against a sheet of the given size.
pub fn parse_range(text: &str, max_rows: u32, max_columns: u32) -> TransporterResult<GridArea> {
    let trimmed = strip_sheet_prefix(text.trim());
    let (first, second) = match trimmed.split_once(':') {
        Some((a, b)) => (parse_endpoint(a, text)?, parse_endpoint(b, text)?),
        None => {
            let single = parse_endpoint(trimmed, text)?;
            if single.row.is_none() || single.column.is_none() {
                return Err(invalid(text));
            }
            (single, single)
        }
    };

    let top = first.row.unwrap_or(1);
    let left = first.column.unwrap_or(1);
    let bottom = second.row.unwrap_or(max_rows.max(1));
    let right = second.column.unwrap_or(max_columns.max(1));

    let (top, bottom) = (top.min(bottom), top.max(bottom));
    let (left, right) = (left.min(right), left.max(right));

    Ok(GridArea::new(top, left, bottom - top + 1, right - left + 1))
}
