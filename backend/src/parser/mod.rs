//! Delimited text parsing with encoding fallback and delimiter detection.
//!
//! Produces a [`Table`] of string cells. No catalog-specific logic here:
//! every value stays a string and blank cells are empty strings.

use csv::{ReaderBuilder, StringRecord};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{CsvError, CsvResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const MIN_CHARDET_CONFIDENCE: f32 = 0.5;

/// An input table: ordered unique headers and string rows aligned to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, renaming repeated headers (`X`, `X.1`, ...) and
    /// padding or truncating rows to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = dedupe_headers(headers);
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a logical column name to a column index.
    ///
    /// Exact match first, then case-insensitive. `None` means the column is
    /// unavailable in this input, which callers treat as an empty value.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        if let Some(idx) = self.headers.iter().position(|h| h == name) {
            return Some(idx);
        }

        // Later headers win on case-insensitive collisions.
        let lower: HashMap<String, usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();
        lower.get(&name.to_lowercase()).copied()
    }

    /// Cell at (`row`, `col`); rows are always header-width.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    /// Rewrite every cell of one column in place.
    pub fn map_column<F>(&mut self, col: usize, f: F)
    where
        F: Fn(&str) -> String,
    {
        for row in &mut self.rows {
            row[col] = f(&row[col]);
        }
    }
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());

    for header in headers {
        let mut candidate = header.clone();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}.{}", header, count);
        }
        seen.insert(candidate.clone(), 0);
        out.push(candidate);
    }

    out
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Encoding the bytes were decoded with
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet.
///
/// Low-confidence guesses fall back to windows-1252, the usual encoding of
/// spreadsheet exports that are not UTF-8.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, confidence, _) = chardet::detect(bytes);
    if confidence < MIN_CHARDET_CONFIDENCE {
        return "windows-1252".to_string();
    }

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to text.
///
/// Strict UTF-8 first (a leading UTF-8 BOM is dropped). On failure the bytes
/// are decoded once more with a byte-order-mark sniffed encoding, or else the
/// chardet guess; an undecodable fallback is an error.
pub fn decode_content(bytes: &[u8]) -> CsvResult<(String, String)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return Ok((text.to_string(), "utf-8".to_string()));
    }

    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((enc, bom_len)) => (enc, &bytes[bom_len..]),
        None => {
            let label = detect_encoding(bytes);
            let enc = Encoding::for_label(label.as_bytes())
                .filter(|enc| *enc != encoding_rs::UTF_8)
                .unwrap_or(encoding_rs::WINDOWS_1252);
            (enc, bytes)
        }
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text: Cow<'_, str>| (text.into_owned(), encoding.name().to_lowercase()))
        .ok_or_else(|| {
            CsvError::Encoding(format!("input is neither UTF-8 nor valid {}", encoding.name()))
        })
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded text with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<Table> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(to_parse_error)?
        .iter()
        .map(|h| h.trim().trim_matches('"').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record).map_err(to_parse_error)? {
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(headers, rows))
}

fn to_parse_error(err: csv::Error) -> CsvError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    CsvError::parse(line, err.to_string())
}

/// Parse uploaded bytes with encoding fallback and delimiter detection.
pub fn parse_bytes(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let (content, encoding) = decode_content(bytes)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_str(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Read and parse a file from disk.
pub fn parse_file<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes(&bytes)
}
