use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;

use super::{ImportError, RawRow};

/// Accepted upload formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
}

impl FileKind {
    pub fn from_filename(name: &str) -> Option<Self> {
        let extension = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xls" => Some(FileKind::Excel),
            _ => None,
        }
    }
}

/// A data row, or the reason it could not be read
pub type ParsedRow = Result<RawRow, String>;

/// Reads every data row of the upload. Header names are trimmed and
/// lower-cased; fully blank rows are dropped. A record that cannot be
/// decoded is returned as an `Err` in its place so the rest still import.
pub fn parse(bytes: &[u8], kind: FileKind) -> Result<Vec<ParsedRow>, ImportError> {
    let rows = match kind {
        FileKind::Csv => parse_csv(bytes)?,
        FileKind::Excel => parse_excel(bytes)?,
    };
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rows)
}

fn normalize_header(header: &str) -> String {
    header.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn to_row(headers: &[String], cells: impl Iterator<Item = String>) -> Option<RawRow> {
    let map: HashMap<String, String> = headers
        .iter()
        .cloned()
        .zip(cells)
        .filter(|(header, _)| !header.is_empty())
        .collect();

    if map.values().all(|v| v.trim().is_empty()) {
        return None;
    }
    Some(RawRow(map))
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<ParsedRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| normalize_header(&String::from_utf8_lossy(h)))
        .collect();

    let mut rows: Vec<ParsedRow> = Vec::new();
    for record in reader.byte_records() {
        let cells = match record {
            Ok(record) => decode_record(&headers, &record),
            Err(e) => Err(e.to_string()),
        };
        match cells {
            Ok(cells) => rows.extend(to_row(&headers, cells.into_iter()).map(Ok)),
            Err(message) => rows.push(Err(message)),
        }
    }
    Ok(rows)
}

fn decode_record(headers: &[String], record: &csv::ByteRecord) -> Result<Vec<String>, String> {
    record
        .iter()
        .enumerate()
        .map(|(i, field)| {
            std::str::from_utf8(field).map(str::to_string).map_err(|_| {
                let column = headers.get(i).map_or("?", String::as_str);
                format!("Invalid UTF-8 in column '{}'", column)
            })
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        // Serial day number; the date parser understands it
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Error(e) => format!("{:?}", e),
    }
}

fn parse_excel(bytes: &[u8]) -> Result<Vec<ParsedRow>, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Excel(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| ImportError::Excel(e.to_string()))?,
        None => return Err(ImportError::Empty),
    };

    let mut lines = range.rows();
    let headers: Vec<String> = match lines.next() {
        Some(header_row) => header_row.iter().map(|c| normalize_header(&cell_text(c))).collect(),
        None => return Ok(Vec::new()),
    };

    Ok(lines
        .filter_map(|cells| to_row(&headers, cells.iter().map(cell_text)))
        .map(Ok)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_by_extension() {
        assert_eq!(FileKind::from_filename("portfolio.CSV"), Some(FileKind::Csv));
        assert_eq!(FileKind::from_filename("holdings.v2.xlsx"), Some(FileKind::Excel));
        assert_eq!(FileKind::from_filename("old.xls"), Some(FileKind::Excel));
        assert_eq!(FileKind::from_filename("notes.txt"), None);
        assert_eq!(FileKind::from_filename("csv"), None);
    }

    #[test]
    fn csv_headers_are_normalized() {
        let data = "\u{feff}Symbol, Quantity ,PRICE,date,type\nINFY,10,1500,2024-01-15,\n,,,,\nAXISBLUE,5,50,15/01/2024,MF\n";
        let rows: Vec<RawRow> = parse(data.as_bytes(), FileKind::Csv)
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(rows.len(), 2, "blank line is skipped");
        assert_eq!(rows[0].get("symbol"), Some("INFY"));
        assert_eq!(rows[0].get("quantity"), Some("10"));
        assert_eq!(rows[0].get("type"), None);
        assert_eq!(rows[1].get("type"), Some("MF"));
    }

    #[test]
    fn header_only_csv_is_empty() {
        let err = parse(b"symbol,quantity,price,date\n", FileKind::Csv).unwrap_err();
        assert!(matches!(err, ImportError::Empty));
    }

    #[test]
    fn short_rows_are_tolerated() {
        let rows = parse(b"symbol,quantity,price,date\nINFY,10\n", FileKind::Csv).unwrap();
        assert_eq!(rows[0].as_ref().unwrap().get("price"), None);
    }

    #[test]
    fn undecodable_record_does_not_hide_its_neighbours() {
        let data = b"symbol,quantity,price,date\nINFY,1,100,2024-01-15\nTC\xffS,1,100,2024-01-15\nWIPRO,2,50,2024-01-15\n";
        let rows = parse(data, FileKind::Csv).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().get("symbol"), Some("INFY"));
        assert_eq!(rows[1].as_ref().unwrap_err(), "Invalid UTF-8 in column 'symbol'");
        assert_eq!(rows[2].as_ref().unwrap().get("symbol"), Some("WIPRO"));
    }

    #[test]
    fn garbage_workbook_is_an_error() {
        let err = parse(b"definitely not a zip", FileKind::Excel).unwrap_err();
        assert!(matches!(err, ImportError::Excel(_)));
    }
}
