//! Spreadsheet import: CSV or the first worksheet of an Excel workbook,
//! turned into validated transaction rows.

pub mod spreadsheet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{SecurityType, TransactionType};

pub use spreadsheet::{parse, FileKind, ParsedRow};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("File is empty")]
    Empty,

    #[error("Invalid file type. Only CSV and Excel files are allowed")]
    UnsupportedFile,

    #[error("Could not read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not read workbook: {0}")]
    Excel(String),
}

/// One data row keyed by lower-cased, trimmed header names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow(pub HashMap<String, String>);

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// A row that passed validation and can become a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub symbol: String,
    pub name: String,
    pub security_type: SecurityType,
    pub transaction_type: TransactionType,
    pub transaction_date: DateTime<Utc>,
    pub quantity: f64,
    pub price: f64,
}

/// Outcome of an upload, returned to the client as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub success: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn record_error(&mut self, row: usize, message: impl std::fmt::Display) {
        self.errors.push(format!("Row {}: {}", row, message));
    }
}

pub fn validate_row(row: &RawRow) -> Result<ImportRow, String> {
    let (symbol, quantity, price, date) = match (
        row.get("symbol"),
        row.get("quantity"),
        row.get("price"),
        row.get("date"),
    ) {
        (Some(s), Some(q), Some(p), Some(d)) => (s, q, p, d),
        _ => return Err("Missing required fields".to_string()),
    };

    let quantity = parse_positive(quantity, "quantity")?;
    let price = parse_positive(price, "price")?;
    let transaction_date = parse_date(date).ok_or_else(|| format!("Invalid date '{}'", date))?;

    let security_type = match row.get("type") {
        Some("MF") => SecurityType::MutualFund,
        _ => SecurityType::Stock,
    };
    let transaction_type = match row.get("transaction_type") {
        Some(raw) => raw.parse()?,
        None => TransactionType::Buy,
    };

    let symbol = symbol.to_uppercase();
    Ok(ImportRow {
        name: row.get("name").map(str::to_string).unwrap_or_else(|| symbol.clone()),
        symbol,
        security_type,
        transaction_type,
        transaction_date,
        quantity,
        price,
    })
}

fn parse_positive(raw: &str, field: &str) -> Result<f64, String> {
    let value: f64 = raw
        .replace(',', "")
        .parse()
        .map_err(|_| format!("Invalid {} '{}'", field, raw))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be greater than 0", field));
    }
    Ok(value)
}

// 1899-12-30 is day 0 in the Excel 1900 date system (after the leap-year bug)
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Accepts ISO dates, day-first dates, RFC 3339 timestamps and Excel serials
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    // A bare year is not a date
    if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // Excel serial day number, possibly with a time fraction
    let serial: f64 = raw.parse().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    let date = excel_epoch()?.checked_add_signed(chrono::Duration::days(days))?;
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(midnight + chrono::Duration::seconds(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        RawRow(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn date_formats() {
        let expected = "2024-01-15T00:00:00+00:00";
        for input in ["2024-01-15", "15-01-2024", "15/01/2024", "45306", "2024-01-15T00:00:00Z"] {
            assert_eq!(parse_date(input).unwrap().to_rfc3339(), expected, "input {input}");
        }
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("2024").is_none());
        assert!(parse_date("45306.5").is_some());
        assert!(parse_date("0").is_none());
    }

    #[test]
    fn defaults_and_type_mapping() {
        let row = validate_row(&raw(&[
            ("symbol", " infy "),
            ("quantity", "10"),
            ("price", "1,450.5"),
            ("date", "2024-01-15"),
            ("type", "MF"),
        ]))
        .unwrap();

        assert_eq!(row.symbol, "INFY");
        assert_eq!(row.name, "INFY");
        assert_eq!(row.security_type, SecurityType::MutualFund);
        assert_eq!(row.transaction_type, TransactionType::Buy);
        assert_eq!(row.price, 1450.5);
    }

    #[test]
    fn only_exact_mf_marks_a_mutual_fund() {
        for kind in ["mf", "MUTUAL_FUND", "STOCK"] {
            let row = validate_row(&raw(&[
                ("symbol", "AXIS"),
                ("quantity", "1"),
                ("price", "10"),
                ("date", "2024-01-15"),
                ("type", kind),
            ]))
            .unwrap();
            assert_eq!(row.security_type, SecurityType::Stock, "type {kind}");
        }
    }

    #[test]
    fn missing_fields() {
        let err = validate_row(&raw(&[("symbol", "INFY"), ("quantity", "1"), ("date", "2024-01-15")])).unwrap_err();
        assert_eq!(err, "Missing required fields");

        let blank = validate_row(&raw(&[
            ("symbol", "  "),
            ("quantity", "1"),
            ("price", "1"),
            ("date", "2024-01-15"),
        ]));
        assert_eq!(blank.unwrap_err(), "Missing required fields");
    }

    #[test]
    fn rejects_bad_numbers_and_types() {
        let base = [("symbol", "INFY"), ("price", "10"), ("date", "2024-01-15")];

        let mut pairs = base.to_vec();
        pairs.push(("quantity", "-1"));
        assert_eq!(validate_row(&raw(&pairs)).unwrap_err(), "quantity must be greater than 0");

        let mut pairs = base.to_vec();
        pairs.push(("quantity", "1"));
        pairs.push(("transaction_type", "HOLD"));
        assert!(validate_row(&raw(&pairs)).unwrap_err().contains("HOLD"));
    }

    #[test]
    fn summary_formats_row_errors() {
        let mut summary = ImportSummary::default();
        summary.record_error(3, "Missing required fields");
        assert_eq!(summary.errors, vec!["Row 3: Missing required fields"]);
    }
}
