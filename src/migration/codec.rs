// ABOUTME: Cell encoding for exported CSV data files and PostgreSQL COPY text
// ABOUTME: Keeps NULL, text, and blob values distinguishable through a flat file

use anyhow::{bail, Context, Result};
use std::io::{Read, Write};

/// Marker written for SQL NULL
pub const NULL_MARKER: &str = "\\N";

/// A single value read from the source database
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Encode a cell for the exported CSV file
///
/// Text that starts with a backslash gets an extra one so it can never be
/// confused with the NULL or blob markers.
pub fn encode_cell(value: &CellValue) -> String {
    match value {
        CellValue::Null => NULL_MARKER.to_string(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Real(f) => format_real(*f),
        CellValue::Text(s) => {
            if s.starts_with('\\') {
                format!("\\{}", s)
            } else {
                s.clone()
            }
        }
        CellValue::Blob(bytes) => format!("\\x{}", to_hex(bytes)),
    }
}

/// Decode an exported CSV cell into PostgreSQL input syntax
///
/// Returns `None` for NULL. Blobs come back as `\x...`, which is the bytea
/// hex input format.
pub fn decode_cell(field: &str) -> Option<String> {
    if field == NULL_MARKER {
        None
    } else if let Some(rest) = field.strip_prefix("\\\\") {
        Some(format!("\\{}", rest))
    } else {
        Some(field.to_string())
    }
}

fn format_real(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        // Debug keeps a trailing ".0" on whole numbers so the value stays a real
        format!("{:?}", f)
    }
}

/// Lowercase hex rendering of a byte slice
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Writes one table's rows as CSV with a header
pub struct RowWriter<W: Write> {
    inner: csv::Writer<W>,
    columns: usize,
    rows: u64,
}

impl<W: Write> RowWriter<W> {
    pub fn new(writer: W, header: &[String]) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new().from_writer(writer);
        inner
            .write_record(header)
            .context("Failed to write CSV header")?;
        Ok(Self {
            inner,
            columns: header.len(),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &[CellValue]) -> Result<()> {
        if row.len() != self.columns {
            bail!(
                "Row has {} values but the table has {} columns",
                row.len(),
                self.columns
            );
        }
        self.inner
            .write_record(row.iter().map(encode_cell))
            .context("Failed to write CSV record")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the number of rows written
    pub fn finish(mut self) -> Result<u64> {
        self.inner.flush().context("Failed to flush CSV data")?;
        Ok(self.rows)
    }
}

/// Reads an exported CSV file back as decoded rows
pub struct RowReader<R: Read> {
    inner: csv::Reader<R>,
    header: Vec<String>,
    source: String,
}

impl<R: Read> RowReader<R> {
    /// `source` names the file in error messages
    pub fn new(reader: R, source: &str) -> Result<Self> {
        let mut inner = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let header = inner
            .headers()
            .with_context(|| format!("Failed to read CSV header from {}", source))?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(Self {
            inner,
            header,
            source: source.to_string(),
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Next decoded row, or `None` at end of file
    pub fn next_row(&mut self) -> Result<Option<Vec<Option<String>>>> {
        let mut record = csv::StringRecord::new();
        let more = self
            .inner
            .read_record(&mut record)
            .with_context(|| format!("Failed to read CSV record from {}", self.source))?;
        if !more {
            return Ok(None);
        }

        if record.len() != self.header.len() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            bail!(
                "{} line {}: expected {} values, found {}",
                self.source,
                line,
                self.header.len(),
                record.len()
            );
        }

        Ok(Some(record.iter().map(decode_cell).collect()))
    }
}

/// Render one decoded row as a PostgreSQL COPY TEXT line (newline included)
pub fn copy_text_line(cells: &[Option<String>]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            line.push('\t');
        }
        match cell {
            None => line.push_str(NULL_MARKER),
            Some(value) => escape_copy_text(value, &mut line),
        }
    }
    line.push('\n');
    line
}

fn escape_copy_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}
