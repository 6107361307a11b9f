//! Row predicates for archive filters

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::{FilterDescriptor, FilterOperator, FilterType};
use crate::types::CellValue;

/// Outcome for a text/number operator this evaluator does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOperatorPolicy {
    /// Keep every row
    #[default]
    MatchAll,
}

/// Evaluate a filter against today's local date
pub fn matches(cell: &CellValue, filter: &FilterDescriptor) -> bool {
    matches_on(cell, filter, Local::now().date_naive())
}

/// Evaluate a filter with an explicit reference date
pub fn matches_on(cell: &CellValue, filter: &FilterDescriptor, today: NaiveDate) -> bool {
    if filter.filter_type == FilterType::Date {
        return check_date(cell, &filter.operator, &filter.value, today);
    }

    let cell_str = cell.to_string().trim().to_lowercase();
    let target = filter.value.to_lowercase();

    match &filter.operator {
        FilterOperator::IsEmpty => cell_str.is_empty(),
        FilterOperator::IsNotEmpty => !cell_str.is_empty(),
        FilterOperator::Equals => cell_str == target,
        FilterOperator::NotEqual => cell_str != target,
        FilterOperator::Contains => cell_str.contains(&target),
        FilterOperator::StartsWith => cell_str.starts_with(&target),
        FilterOperator::EndsWith => cell_str.ends_with(&target),
        FilterOperator::GreaterThan => compare(cell, &filter.value, |a, b| a > b),
        FilterOperator::LessThan => compare(cell, &filter.value, |a, b| a < b),
        _ => match UnknownOperatorPolicy::default() {
            UnknownOperatorPolicy::MatchAll => true,
        },
    }
}

/// NaN on either side compares false
fn compare(cell: &CellValue, value: &str, op: impl Fn(f64, f64) -> bool) -> bool {
    let left = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => parse_float_prefix(s),
        _ => f64::NAN,
    };
    op(left, parse_float_prefix(value))
}

fn float_prefix_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").ok())
        .as_ref()
}

fn int_prefix_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+").ok()).as_ref()
}

/// Longest leading decimal number ("12.5kg" → 12.5); NaN when none
pub fn parse_float_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if unsigned.starts_with("Infinity") {
        return if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    float_prefix_re()
        .and_then(|re| re.find(text))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(f64::NAN)
}

/// Leading integer ("7 days" → 7); None when none
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    int_prefix_re()?
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse().ok())
}

/// Calendar date of a cell; number cells are not treated as dates
pub fn cell_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    {
        return Some(dt.date());
    }
    ["%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
}

fn check_date(cell: &CellValue, operator: &FilterOperator, value: &str, today: NaiveDate) -> bool {
    let Some(date) = cell_date(cell) else {
        return false;
    };
    let diff = (date - today).num_days();
    let n = || parse_int_prefix(value).unwrap_or(0);

    match operator {
        FilterOperator::Today => diff == 0,
        FilterOperator::Yesterday => diff == -1,
        FilterOperator::Tomorrow => diff == 1,
        FilterOperator::LastNDays => diff <= 0 && diff >= -n(),
        FilterOperator::NextNDays => diff >= 0 && diff <= n(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn filter(filter_type: FilterType, op: &str, value: &str) -> FilterDescriptor {
        FilterDescriptor::new("Data", "Col", filter_type, FilterOperator::from(op.to_string()), value)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn days_from_today(days: i64) -> CellValue {
        CellValue::from(today() + Duration::days(days))
    }

    #[test]
    fn test_text_operators_trim_and_ignore_case() {
        let cell = CellValue::from("  Hello World ");
        let t = FilterType::Text;
        assert!(matches_on(&cell, &filter(t, "equals", "hello world"), today()));
        assert!(matches_on(&cell, &filter(t, "contains", "LO WO"), today()));
        assert!(matches_on(&cell, &filter(t, "starts_with", "hell"), today()));
        assert!(matches_on(&cell, &filter(t, "ends_with", "world"), today()));
        assert!(matches_on(&cell, &filter(t, "not_equal", "bye"), today()));
        assert!(!matches_on(&cell, &filter(t, "is_empty", ""), today()));
        assert!(matches_on(&CellValue::from("   "), &filter(t, "is_empty", ""), today()));
        assert!(matches_on(&CellValue::Empty, &filter(t, "is_empty", ""), today()));
        assert!(matches_on(&CellValue::Number(3.0), &filter(t, "is_not_empty", ""), today()));
    }

    #[test]
    fn test_numeric_comparisons() {
        let n = FilterType::Number;
        assert!(matches_on(&CellValue::Number(150.0), &filter(n, "greater_than", "100"), today()));
        assert!(!matches_on(&CellValue::Number(50.0), &filter(n, "greater_than", "100"), today()));
        assert!(matches_on(&CellValue::from("12.5kg"), &filter(n, "less_than", "13"), today()));
        assert!(!matches_on(&CellValue::from("n/a"), &filter(n, "greater_than", "0"), today()));
        assert!(!matches_on(&CellValue::from("n/a"), &filter(n, "less_than", "0"), today()));
        assert!(!matches_on(&CellValue::Number(1.0), &filter(n, "greater_than", "abc"), today()));
    }

    #[test]
    fn test_unknown_text_operator_matches_everything() {
        let f = filter(FilterType::Text, "sounds_like", "x");
        assert!(matches_on(&CellValue::from("anything"), &f, today()));
        assert!(matches_on(&CellValue::Empty, &f, today()));
    }

    #[test]
    fn test_relative_days() {
        let d = FilterType::Date;
        assert!(matches_on(&days_from_today(0), &filter(d, "today", ""), today()));
        assert!(matches_on(&days_from_today(-1), &filter(d, "yesterday", ""), today()));
        assert!(matches_on(&days_from_today(1), &filter(d, "tomorrow", ""), today()));
        assert!(!matches_on(&days_from_today(2), &filter(d, "tomorrow", ""), today()));
    }

    #[test]
    fn test_last_n_days_window() {
        let f = filter(FilterType::Date, "last_n_days", "7");
        assert!(matches_on(&days_from_today(-7), &f, today()));
        assert!(matches_on(&days_from_today(0), &f, today()));
        assert!(!matches_on(&days_from_today(-8), &f, today()));
        assert!(!matches_on(&days_from_today(1), &f, today()));
    }

    #[test]
    fn test_next_n_days_lenient_count() {
        let f = filter(FilterType::Date, "next_n_days", "3 days");
        assert!(matches_on(&days_from_today(3), &f, today()));
        assert!(!matches_on(&days_from_today(4), &f, today()));

        let zero = filter(FilterType::Date, "next_n_days", "soon");
        assert!(matches_on(&days_from_today(0), &zero, today()));
        assert!(!matches_on(&days_from_today(1), &zero, today()));
    }

    #[test]
    fn test_date_text_formats() {
        let f = filter(FilterType::Date, "today", "");
        for text in [
            "2024-01-15",
            "2024-01-15 18:30:00",
            "15/01/2024",
            "15/01/2024 08:00:00",
        ] {
            assert!(matches_on(&CellValue::from(text), &f, today()), "{}", text);
        }
    }

    #[test]
    fn test_date_filters_never_match_blank_numbers_or_unknown_ops() {
        let f = filter(FilterType::Date, "today", "");
        assert!(!matches_on(&CellValue::Empty, &f, today()));
        assert!(!matches_on(&CellValue::from("not a date"), &f, today()));
        assert!(!matches_on(&CellValue::Number(45306.0), &f, today()));

        let unknown = filter(FilterType::Date, "equals", "2024-01-15");
        assert!(!matches_on(&days_from_today(0), &unknown, today()));
    }

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(parse_float_prefix(" 3.5e2x"), 350.0);
        assert_eq!(parse_float_prefix("-.5"), -0.5);
        assert!(parse_float_prefix("abc").is_nan());
        assert_eq!(parse_float_prefix("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(parse_int_prefix("7.9"), Some(7));
        assert_eq!(parse_int_prefix("-3"), Some(-3));
        assert_eq!(parse_int_prefix("x7"), None);
    }
}
