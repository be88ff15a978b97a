//! Tabular file parser: CSV, TSV, JSON and Excel uploads into one
//! uniform in-memory table with an inferred type per column.
//!
//! RULE: the size cap is checked before any contents are read, and a
//! table with zero data rows is always an error.

use crate::{
    dates::parse_date,
    error::{PipelineError, PipelineResult},
    types::{CellValue, ColumnType, Row},
    upload::{FileFormat, FileInfo, Upload},
};
use calamine::{Data, Reader};
use regex::Regex;
use serde::Serialize;
use std::io::Cursor;
use std::sync::OnceLock;

// ── Constants ────────────────────────────────────────────────────────────────

const TYPE_SAMPLE_SIZE: usize = 100;
const BOOLEAN_RATIO: f64 = 0.8;
const NUMBER_RATIO: f64 = 0.8;
const DATE_RATIO: f64 = 0.7;
const JSON_ROW_KEYS: [&str; 3] = ["data", "records", "transactions"];
const BOOLEAN_TOKENS: [&str; 6] = ["true", "false", "0", "1", "yes", "no"];

/// Rows shown in the upload preview.
pub const PREVIEW_ROWS: usize = 10;

// ── Table ────────────────────────────────────────────────────────────────────

/// The normalized output of one upload. Immutable once built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub column_types: Vec<ColumnType>,
}

impl ParsedTable {
    /// Build a table and infer column types. Rows shorter than the
    /// header row are padded with nulls; longer rows are truncated.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let width = headers.len();
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        let column_types = (0..width)
            .map(|col| detect_column_type(rows.iter().map(|r| &r[col])))
            .collect();
        Self {
            headers,
            rows,
            column_types,
        }
    }

    /// Position of the first header with this exact name.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn column_type(&self, header: &str) -> Option<ColumnType> {
        self.column_index(header).map(|i| self.column_types[i])
    }

    pub fn value<'a>(&'a self, row: &'a Row, header: &str) -> Option<&'a CellValue> {
        self.column_index(header).and_then(|i| row.get(i))
    }

    pub fn preview(&self, n: usize) -> &[Row] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Parse an upload accepted by the local pipeline.
pub fn parse(upload: &Upload) -> PipelineResult<ParsedTable> {
    let format = upload.validate(FileFormat::LOCAL)?;

    let table = match format {
        FileFormat::Csv => parse_delimited(&upload.read_text()?, b',')?,
        FileFormat::Tsv => parse_delimited(&upload.read_text()?, b'\t')?,
        FileFormat::Json => parse_json(&upload.read_text()?)?,
        FileFormat::Xlsx | FileFormat::Xls => parse_spreadsheet(upload.read_bytes()?)?,
    };

    if table.is_empty() {
        return Err(PipelineError::EmptyFile);
    }

    log::info!(
        "parser: file={} format={} rows={} columns={}",
        upload.name(),
        format.extension(),
        table.len(),
        table.headers.len()
    );
    Ok(table)
}

/// Parse and describe an upload in one step.
pub fn parse_with_info(upload: &Upload) -> PipelineResult<(ParsedTable, FileInfo)> {
    let table = parse(upload)?;
    let kind = upload.validate(FileFormat::LOCAL)?;
    let info = FileInfo {
        name: upload.name().to_string(),
        size: upload.size(),
        kind,
        row_count: table.len(),
        column_count: table.headers.len(),
    };
    Ok((table, info))
}

// ── Format readers ───────────────────────────────────────────────────────────

/// First non-empty line is the header row; blank lines are skipped.
/// A line of bare delimiters is not blank: it is kept as a row of nulls.
pub fn parse_delimited(text: &str, delimiter: u8) -> PipelineResult<ParsedTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(PipelineError::malformed)?;
        // Whitespace-only lines come through as a single blank field.
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        match headers {
            None => headers = Some(record.iter().map(|h| h.trim().to_string()).collect()),
            Some(_) => rows.push(record.iter().map(CellValue::from_text).collect()),
        }
    }

    Ok(ParsedTable::new(headers.unwrap_or_default(), rows))
}

/// Accepts a top-level array, an object wrapping the rows under
/// `data`/`records`/`transactions` (in that order), or a single object.
pub fn parse_json(text: &str) -> PipelineResult<ParsedTable> {
    use serde_json::Value;

    let root: Value = serde_json::from_str(text).map_err(PipelineError::malformed)?;

    let items: Vec<Value> = match root {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = JSON_ROW_KEYS
                .iter()
                .find(|k| map.get(**k).is_some_and(Value::is_array));
            match key.and_then(|k| map.remove(*k)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        other => {
            return Err(PipelineError::malformed(format!(
                "expected a JSON array or object, found {}",
                json_kind(&other)
            )))
        }
    };

    let Some(first) = items.first() else {
        return Err(PipelineError::EmptyFile);
    };
    let headers: Vec<String> = match first {
        Value::Object(map) => map.keys().cloned().collect(),
        other => {
            return Err(PipelineError::malformed(format!(
                "expected rows to be objects, found {}",
                json_kind(other)
            )))
        }
    };

    let rows = items
        .iter()
        .map(|item| {
            headers
                .iter()
                .map(|h| item.get(h).map(CellValue::from_json).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(ParsedTable::new(headers, rows))
}

/// First sheet only; first row is the header row.
pub fn parse_spreadsheet(bytes: Vec<u8>) -> PipelineResult<ParsedTable> {
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(PipelineError::malformed)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(PipelineError::EmptyFile)?
        .map_err(PipelineError::malformed)?;

    let mut sheet_rows = range.rows();
    let Some(header_row) = sheet_rows.next() else {
        return Err(PipelineError::EmptyFile);
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell_value(cell) {
            CellValue::Null => "Column".to_string(),
            value => value.to_string(),
        })
        .collect();
    let rows = sheet_rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(ParsedTable::new(headers, rows))
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => {
            if s.trim().is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => CellValue::Text(ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Null,
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Type inference ───────────────────────────────────────────────────────────

fn date_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"^\d{4}-\d{2}-\d{2}", r"^\d{2}/\d{2}/\d{4}", r"^\d{2}-\d{2}-\d{4}"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn is_boolean_like(value: &CellValue) -> bool {
    match value {
        CellValue::Bool(_) => true,
        other => {
            let token = other.to_string().to_ascii_lowercase();
            BOOLEAN_TOKENS.contains(&token.as_str())
        }
    }
}

fn is_numeric(value: &CellValue) -> bool {
    match value {
        CellValue::Number(n) => n.is_finite(),
        CellValue::Text(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn is_date_like(value: &CellValue) -> bool {
    let text = value.to_string();
    date_patterns().iter().any(|p| p.is_match(&text)) || parse_date(&text).is_some()
}

/// Classify a column from up to its first 100 non-blank values.
/// Checks run boolean → number → date; the first one satisfied wins.
pub fn detect_column_type<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> ColumnType {
    let samples: Vec<&CellValue> = values
        .into_iter()
        .filter(|v| !v.is_blank())
        .take(TYPE_SAMPLE_SIZE)
        .collect();
    if samples.is_empty() {
        return ColumnType::String;
    }

    let total = samples.len() as f64;
    let share = |pred: fn(&CellValue) -> bool| samples.iter().filter(|v| pred(v)).count() as f64 / total;

    if share(is_boolean_like) >= BOOLEAN_RATIO {
        ColumnType::Boolean
    } else if share(is_numeric) >= NUMBER_RATIO {
        ColumnType::Number
    } else if share(is_date_like) >= DATE_RATIO {
        ColumnType::Date
    } else {
        ColumnType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from_text(v)).collect()
    }

    #[test]
    fn boolean_wins_over_number_for_flags() {
        let col = texts(&["0", "1", "1", "0", "1"]);
        assert_eq!(detect_column_type(&col), ColumnType::Boolean);
    }

    #[test]
    fn numbers_with_one_outlier_stay_numeric() {
        let col = texts(&["10", "20.5", "30", "40", "n/a"]);
        assert_eq!(detect_column_type(&col), ColumnType::Number);
    }

    #[test]
    fn dates_need_seventy_percent() {
        let col = texts(&["2024-01-01", "2024-01-02", "01/03/2024", "x"]);
        assert_eq!(detect_column_type(&col), ColumnType::Date);
        let col = texts(&["2024-01-01", "x", "y", "z"]);
        assert_eq!(detect_column_type(&col), ColumnType::String);
    }

    #[test]
    fn blank_column_is_string() {
        let col = vec![CellValue::Null, CellValue::Text(String::new())];
        assert_eq!(detect_column_type(&col), ColumnType::String);
    }

    #[test]
    fn inference_is_idempotent() {
        let col = texts(&["yes", "no", "maybe", "2024-01-01", "7"]);
        let first = detect_column_type(&col);
        for _ in 0..10 {
            assert_eq!(detect_column_type(&col), first);
        }
    }

    #[test]
    fn only_first_hundred_samples_count() {
        let mut col = texts(&vec!["5"; 100]);
        col.extend(texts(&vec!["word"; 400]));
        assert_eq!(detect_column_type(&col), ColumnType::Number);
    }
}
