//! Reader and writer for TFS (Table File System) files.
//!
//! A TFS file has three parts: `@` header lines holding typed key/value
//! metadata, a `*` line naming the columns and a `$` line typing them, then
//! whitespace separated rows. Strings may be double quoted and contain
//! spaces. Lines starting with `#` are comments.
//!
//! ```text
//! @ NAME             %s  "TWISS"
//! @ Q1               %le 62.31
//! * NAME   S      BETX
//! $ %s     %le    %le
//!   "IP1"  0.0    0.55
//! ```

use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Column name TFS writers use to store a dataframe index.
pub const INDEX_COLUMN_MARKER: &str = "INDEX&&&";
/// Name given to an `INDEX&&&` column once it has been read back.
pub const DEFAULT_INDEX_NAME: &str = "INDEX";

#[derive(Debug, Error)]
pub enum TfsError {
    #[error("I/O error reading TFS data: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unsupported TFS type '{code}'")]
    UnsupportedType { line: usize, code: String },
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}, column '{column}': cannot parse '{value}' as {kind}")]
    Value {
        line: usize,
        column: String,
        value: String,
        kind: &'static str,
    },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("index column '{column}' not found (available: {available})")]
    IndexNotFound { column: String, available: String },
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Value type of a header entry or a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TfsType {
    Str,
    Int,
    Float,
    Bool,
}

impl TfsType {
    /// Parse a type code such as `%s`, `%20s`, `%d`, `%ld`, `%le` or `%b`.
    pub fn parse(code: &str) -> Option<Self> {
        let body = code.strip_prefix('%')?;
        let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
        match body {
            "s" => Some(Self::Str),
            "d" | "ld" | "hd" | "i" | "li" => Some(Self::Int),
            "le" | "lf" | "f" | "e" | "g" | "lg" => Some(Self::Float),
            "b" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Canonical type code used when writing.
    pub fn code(self) -> &'static str {
        match self {
            Self::Str => "%s",
            Self::Int => "%d",
            Self::Float => "%le",
            Self::Bool => "%b",
        }
    }

    fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => Self::Bool,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Int,
            DataType::Float32 | DataType::Float64 => Self::Float,
            _ => Self::Str,
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Bool => "boolean",
        }
    }
}

/// A scalar header value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl HeaderValue {
    pub fn tfs_type(&self) -> TfsType {
        match self {
            Self::Str(_) => TfsType::Str,
            Self::Int(_) => TfsType::Int,
            Self::Float(_) => TfsType::Float,
            Self::Bool(_) => TfsType::Bool,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered header block. Insertion order is the file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headers plus table, with an optional column designated as the row index.
#[derive(Debug, Clone)]
pub struct TfsTable {
    pub headers: Headers,
    pub data: DataFrame,
    index: Option<String>,
}

impl TfsTable {
    pub fn new(headers: Headers, data: DataFrame) -> Self {
        Self {
            headers,
            data,
            index: None,
        }
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Designate `column` as the row index, or clear the index with `None`.
    /// The index column is moved to the front of the frame.
    pub fn set_index(&mut self, column: Option<&str>) -> Result<(), TfsError> {
        let Some(column) = column.filter(|c| !c.is_empty()) else {
            self.index = None;
            return Ok(());
        };
        if !self.has_column(column) {
            return Err(TfsError::IndexNotFound {
                column: column.to_string(),
                available: self.column_names().join(", "),
            });
        }
        let mut order = vec![column.to_string()];
        order.extend(self.column_names().into_iter().filter(|c| c != column));
        self.data = self.data.select(order)?;
        self.index = Some(column.to_string());
        Ok(())
    }

    pub fn with_index(mut self, column: Option<&str>) -> Result<Self, TfsError> {
        self.set_index(column)?;
        Ok(self)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.schema().iter_names().any(|n| n.as_str() == name)
    }

    /// All column names, index first when one is set.
    pub fn column_names(&self) -> Vec<String> {
        self.data
            .schema()
            .iter_names()
            .map(|n| n.to_string())
            .collect()
    }

    /// Column names excluding the index; these are the columns offered for charting.
    pub fn data_columns(&self) -> Vec<String> {
        self.column_names()
            .into_iter()
            .filter(|c| Some(c.as_str()) != self.index())
            .collect()
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }
}

/// Split a data line into fields on whitespace, honouring double quotes.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    fields.push(std::mem::take(&mut current));
                    quoted = false;
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated string".to_string());
    }
    if !current.is_empty() || quoted {
        fields.push(current);
    }
    Ok(fields)
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_header_line(line_no: usize, rest: &str) -> Result<(String, HeaderValue), TfsError> {
    let rest = rest.trim_start();
    let (name, rest) = rest.split_once(char::is_whitespace).ok_or(TfsError::Syntax {
        line: line_no,
        message: "header line needs a name, a type and a value".to_string(),
    })?;
    let rest = rest.trim_start();
    let (code, raw_value) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    let tfs_type = TfsType::parse(code).ok_or_else(|| TfsError::UnsupportedType {
        line: line_no,
        code: code.to_string(),
    })?;
    let raw_value = raw_value.trim();
    let value_error = || TfsError::Value {
        line: line_no,
        column: name.to_string(),
        value: raw_value.to_string(),
        kind: tfs_type.kind(),
    };
    let value = match tfs_type {
        TfsType::Str => HeaderValue::Str(strip_quotes(raw_value).to_string()),
        TfsType::Int => HeaderValue::Int(raw_value.parse().map_err(|_| value_error())?),
        TfsType::Float => HeaderValue::Float(raw_value.parse().map_err(|_| value_error())?),
        TfsType::Bool => HeaderValue::Bool(parse_bool(raw_value).ok_or_else(value_error)?),
    };
    Ok((name.to_string(), value))
}

enum ColumnBuilder {
    Str(Vec<String>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
}

impl ColumnBuilder {
    fn new(tfs_type: TfsType) -> Self {
        match tfs_type {
            TfsType::Str => Self::Str(Vec::new()),
            TfsType::Int => Self::Int(Vec::new()),
            TfsType::Float => Self::Float(Vec::new()),
            TfsType::Bool => Self::Bool(Vec::new()),
        }
    }

    fn push(&mut self, raw: String) -> Result<(), (String, &'static str)> {
        match self {
            Self::Str(v) => v.push(raw),
            Self::Int(v) => match raw.parse() {
                Ok(i) => v.push(i),
                Err(_) => return Err((raw, TfsType::Int.kind())),
            },
            Self::Float(v) => match raw.parse() {
                Ok(f) => v.push(f),
                Err(_) => return Err((raw, TfsType::Float.kind())),
            },
            Self::Bool(v) => match parse_bool(&raw) {
                Some(b) => v.push(b),
                None => return Err((raw, TfsType::Bool.kind())),
            },
        }
        Ok(())
    }

    fn finish(self, name: &str) -> Column {
        let name: PlSmallStr = name.into();
        match self {
            Self::Str(v) => Series::new(name, v),
            Self::Int(v) => Series::new(name, v),
            Self::Float(v) => Series::new(name, v),
            Self::Bool(v) => Series::new(name, v),
        }
        .into()
    }
}

/// Parse TFS content from any buffered reader.
pub fn parse_tfs<R: BufRead>(reader: R) -> Result<TfsTable, TfsError> {
    let mut headers = Headers::new();
    let mut names: Option<Vec<String>> = None;
    let mut builders: Option<Vec<ColumnBuilder>> = None;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => TfsError::Syntax {
                line: line_no,
                message: "file is not valid UTF-8 text".to_string(),
            },
            _ => TfsError::Io(e),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('@') {
            if names.is_some() {
                return Err(TfsError::Syntax {
                    line: line_no,
                    message: "header line after the column names".to_string(),
                });
            }
            let (name, value) = parse_header_line(line_no, rest)?;
            headers.insert(name, value);
        } else if let Some(rest) = trimmed.strip_prefix('*') {
            if names.is_some() {
                return Err(TfsError::Syntax {
                    line: line_no,
                    message: "column names given twice".to_string(),
                });
            }
            let cols: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            for (idx, name) in cols.iter().enumerate() {
                if cols[..idx].contains(name) {
                    return Err(TfsError::DuplicateColumn(name.clone()));
                }
            }
            names = Some(cols);
        } else if let Some(rest) = trimmed.strip_prefix('$') {
            let Some(cols) = names.as_ref() else {
                return Err(TfsError::Syntax {
                    line: line_no,
                    message: "column types given before column names".to_string(),
                });
            };
            if builders.is_some() {
                return Err(TfsError::Syntax {
                    line: line_no,
                    message: "column types given twice".to_string(),
                });
            }
            let codes: Vec<&str> = rest.split_whitespace().collect();
            if codes.len() != cols.len() {
                return Err(TfsError::FieldCount {
                    line: line_no,
                    expected: cols.len(),
                    found: codes.len(),
                });
            }
            let mut row_builders = Vec::with_capacity(codes.len());
            for code in codes {
                let tfs_type = TfsType::parse(code).ok_or_else(|| TfsError::UnsupportedType {
                    line: line_no,
                    code: code.to_string(),
                })?;
                row_builders.push(ColumnBuilder::new(tfs_type));
            }
            builders = Some(row_builders);
        } else {
            let (Some(cols), Some(row_builders)) = (names.as_ref(), builders.as_mut()) else {
                return Err(TfsError::Syntax {
                    line: line_no,
                    message: "data row before the '*' and '$' lines".to_string(),
                });
            };
            let fields = split_fields(trimmed).map_err(|message| TfsError::Syntax {
                line: line_no,
                message,
            })?;
            if fields.len() != cols.len() {
                return Err(TfsError::FieldCount {
                    line: line_no,
                    expected: cols.len(),
                    found: fields.len(),
                });
            }
            for ((builder, field), column) in row_builders.iter_mut().zip(fields).zip(cols) {
                builder
                    .push(field)
                    .map_err(|(value, kind)| TfsError::Value {
                        line: line_no,
                        column: column.clone(),
                        value,
                        kind,
                    })?;
            }
        }
    }

    let data = match (names, builders) {
        (Some(cols), Some(row_builders)) => {
            let columns: Vec<Column> = row_builders
                .into_iter()
                .zip(&cols)
                .map(|(b, name)| b.finish(name))
                .collect();
            DataFrame::new(columns)?
        }
        (Some(_), None) => {
            return Err(TfsError::Syntax {
                line: 0,
                message: "missing '$' line with column types".to_string(),
            })
        }
        _ => DataFrame::empty(),
    };

    let mut table = TfsTable::new(headers, data);
    if table.has_column(INDEX_COLUMN_MARKER) {
        table
            .data
            .rename(INDEX_COLUMN_MARKER, DEFAULT_INDEX_NAME.into())?;
        table.set_index(Some(DEFAULT_INDEX_NAME))?;
    }
    Ok(table)
}

/// Parse TFS content held in a string.
pub fn parse_tfs_str(content: &str) -> Result<TfsTable, TfsError> {
    parse_tfs(content.as_bytes())
}

/// Read a TFS file from disk, optionally designating an index column.
pub fn read_tfs(path: &Path, index: Option<&str>) -> Result<TfsTable, TfsError> {
    let file = File::open(path)?;
    let table = parse_tfs(BufReader::new(file))?;
    match index.filter(|i| !i.is_empty()) {
        Some(column) => table.with_index(Some(column)),
        None => Ok(table),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "'"))
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:.16e}", v)
    }
}

fn format_cell(value: &AnyValue, tfs_type: TfsType) -> String {
    match (value, tfs_type) {
        (AnyValue::Null, TfsType::Float) => "nan".to_string(),
        (AnyValue::Null, _) => quote(""),
        (AnyValue::String(s), _) => quote(s),
        (AnyValue::StringOwned(s), _) => quote(s.as_str()),
        (AnyValue::Boolean(b), _) => b.to_string(),
        (v, TfsType::Float) => v
            .extract::<f64>()
            .map(format_float)
            .unwrap_or_else(|| "nan".to_string()),
        (v, TfsType::Int) => v
            .extract::<i64>()
            .map(|i| i.to_string())
            .unwrap_or_else(|| "0".to_string()),
        (v, _) => quote(&format!("{:?}", v)),
    }
}

/// Write a table as TFS. Column widths are padded for readability.
pub fn write_tfs<W: Write>(writer: &mut W, table: &TfsTable) -> Result<(), TfsError> {
    let name_width = table
        .headers
        .iter()
        .map(|(n, _)| n.len())
        .max()
        .unwrap_or(0)
        .max(10);
    for (name, value) in table.headers.iter() {
        let rendered = match value {
            HeaderValue::Str(s) => quote(s),
            HeaderValue::Float(v) => format_float(*v),
            other => other.to_string(),
        };
        writeln!(
            writer,
            "@ {:<width$} {:<4} {}",
            name,
            value.tfs_type().code(),
            rendered,
            width = name_width
        )?;
    }

    let df = &table.data;
    if df.width() == 0 {
        return Ok(());
    }
    let schema = df.schema();
    let names: Vec<String> = schema.iter_names().map(|n| n.to_string()).collect();
    let types: Vec<TfsType> = schema
        .iter()
        .map(|(_, dtype)| TfsType::from_dtype(dtype))
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut cells = Vec::with_capacity(names.len());
        for (name, tfs_type) in names.iter().zip(&types) {
            let value = df.column(name)?.get(row)?;
            cells.push(format_cell(&value, *tfs_type));
        }
        rows.push(cells);
    }

    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(i, n)| {
            rows.iter()
                .map(|r| r[i].len())
                .chain([n.len(), types[i].code().len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |first: &str, cells: Vec<String>| {
        let body: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:>w$}", c, w = *w))
            .collect();
        format!("{} {}", first, body.join(" "))
    };
    // the index goes out under the marker name so readers restore it
    let column_line: Vec<String> = names
        .iter()
        .map(|n| match table.index() {
            Some(index) if index == n.as_str() => INDEX_COLUMN_MARKER.to_string(),
            _ => n.clone(),
        })
        .collect();
    writeln!(writer, "{}", line("*", column_line))?;
    writeln!(
        writer,
        "{}",
        line("$", types.iter().map(|t| t.code().to_string()).collect())
    )?;
    for cells in rows {
        writeln!(writer, "{}", line(" ", cells))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWISS: &str = r#"@ NAME             %s "TWISS"
@ TYPE             %s "TWISS"
@ Q1               %le 62.31
@ NTURNS           %d 1024
@ CLOSED           %b true
# a comment line
* NAME        S       BETX     KEYWORD
$ %s          %le     %le      %20s
  "IP1"       0.0     0.55     "MARKER"
  "MQ.1"      12.5    101.2    "QUADRUPOLE"
  "BPM 2"     20.0    nan      "MONITOR"
"#;

    #[test]
    fn parses_headers_in_order() {
        let table = parse_tfs_str(TWISS).unwrap();
        let names: Vec<&str> = table.headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["NAME", "TYPE", "Q1", "NTURNS", "CLOSED"]);
        assert_eq!(table.headers.get("Q1"), Some(&HeaderValue::Float(62.31)));
        assert_eq!(table.headers.get("NTURNS"), Some(&HeaderValue::Int(1024)));
        assert_eq!(table.headers.get("CLOSED"), Some(&HeaderValue::Bool(true)));
        assert_eq!(
            table.headers.get("NAME"),
            Some(&HeaderValue::Str("TWISS".to_string()))
        );
    }

    #[test]
    fn parses_typed_columns() {
        let table = parse_tfs_str(TWISS).unwrap();
        assert_eq!(table.height(), 3);
        let schema = table.data.schema();
        assert_eq!(schema.get("NAME"), Some(&DataType::String));
        assert_eq!(schema.get("S"), Some(&DataType::Float64));
        let names = table.data.column("NAME").unwrap();
        assert_eq!(names.str().unwrap().get(2), Some("BPM 2"));
        let betx = table.data.column("BETX").unwrap();
        assert!(betx.f64().unwrap().get(2).unwrap().is_nan());
    }

    #[test]
    fn rejects_wrong_field_count() {
        let content = "* A B\n$ %d %d\n1 2 3\n";
        let err = parse_tfs_str(content).unwrap_err();
        assert!(matches!(
            err,
            TfsError::FieldCount {
                line: 3,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn rejects_unparsable_value() {
        let content = "* A\n$ %d\nabc\n";
        let err = parse_tfs_str(content).unwrap_err();
        assert!(matches!(err, TfsError::Value { ref column, .. } if column == "A"));
    }

    #[test]
    fn rejects_unknown_type_code() {
        let content = "* A\n$ %lz\n1\n";
        assert!(matches!(
            parse_tfs_str(content),
            Err(TfsError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn rejects_rows_before_column_lines() {
        assert!(matches!(
            parse_tfs_str("1 2\n"),
            Err(TfsError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_columns() {
        assert!(matches!(
            parse_tfs_str("* A A\n$ %d %d\n"),
            Err(TfsError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn headers_only_file_is_an_empty_table() {
        let table = parse_tfs_str("@ TITLE %s \"x\"\n").unwrap();
        assert_eq!(table.headers.len(), 1);
        assert_eq!(table.data.width(), 0);
    }

    #[test]
    fn index_marker_column_becomes_index() {
        let content = "* INDEX&&& A\n$ %s %d\n\"a\" 1\n\"b\" 2\n";
        let table = parse_tfs_str(content).unwrap();
        assert_eq!(table.index(), Some(DEFAULT_INDEX_NAME));
        assert_eq!(table.data_columns(), vec!["A".to_string()]);
    }

    #[test]
    fn set_index_moves_column_first_and_rejects_unknown() {
        let mut table = parse_tfs_str(TWISS).unwrap();
        table.set_index(Some("S")).unwrap();
        assert_eq!(table.column_names()[0], "S");
        assert!(!table.data_columns().contains(&"S".to_string()));
        let err = table.set_index(Some("NOPE")).unwrap_err();
        assert!(matches!(err, TfsError::IndexNotFound { .. }));
        assert_eq!(table.index(), Some("S"));
        table.set_index(None).unwrap();
        assert_eq!(table.index(), None);
    }

    #[test]
    fn written_table_reads_back() {
        let table = parse_tfs_str(TWISS).unwrap();
        let mut out = Vec::new();
        write_tfs(&mut out, &table).unwrap();
        let reread = parse_tfs(out.as_slice()).unwrap();
        assert_eq!(reread.headers, table.headers);
        assert_eq!(reread.column_names(), table.column_names());
        let s = reread.data.column("S").unwrap();
        assert_eq!(s.f64().unwrap().get(1), Some(12.5));
        let name = reread.data.column("NAME").unwrap();
        assert_eq!(name.str().unwrap().get(2), Some("BPM 2"));
    }

    #[test]
    fn written_index_reads_back_as_index() {
        let table = parse_tfs_str(TWISS)
            .unwrap()
            .with_index(Some("NAME"))
            .unwrap();
        let mut out = Vec::new();
        write_tfs(&mut out, &table).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l.starts_with('*') && l.contains(INDEX_COLUMN_MARKER)));

        let reread = parse_tfs_str(&text).unwrap();
        assert_eq!(reread.index(), Some(DEFAULT_INDEX_NAME));
        let index = reread.data.column(DEFAULT_INDEX_NAME).unwrap();
        assert_eq!(index.str().unwrap().get(2), Some("BPM 2"));
        assert_eq!(reread.height(), table.height());
    }

    #[test]
    fn split_fields_keeps_quoted_spaces_and_empty_strings() {
        assert_eq!(
            split_fields(r#""a b"  1  """#).unwrap(),
            vec!["a b".to_string(), "1".to_string(), String::new()]
        );
        assert!(split_fields("\"open").is_err());
    }
}
