//! CSV encoding of transformed rows.
//!
//! [`CsvChunks`] turns a header list and a row iterator into byte chunks:
//! a UTF-8 byte-order mark (so spreadsheet apps pick the right encoding),
//! the header line, then one CRLF-terminated line per row. Only one row is
//! buffered at a time.

use csv::{Terminator, WriterBuilder};
use serde::Serialize;

use crate::error::{CsvError, CsvResult};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Rows returned by a preview.
pub const PREVIEW_ROWS: usize = 10;

enum Stage {
    Bom,
    Header,
    Rows,
    Done,
}

/// Incremental CSV encoder over any row iterator.
pub struct CsvChunks<I> {
    headers: Vec<String>,
    rows: I,
    stage: Stage,
}

impl<I> CsvChunks<I>
where
    I: Iterator<Item = Vec<String>>,
{
    pub fn new(headers: Vec<String>, rows: I) -> Self {
        Self {
            headers,
            rows,
            stage: Stage::Bom,
        }
    }
}

/// Encode one record as a CRLF-terminated line.
fn encode_record<R>(record: R) -> CsvResult<Vec<u8>>
where
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .flexible(true)
        .from_writer(Vec::new());
    writer
        .write_record(record)
        .map_err(|e| CsvError::Write(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| CsvError::Write(e.to_string()))
}

impl<I> Iterator for CsvChunks<I>
where
    I: Iterator<Item = Vec<String>>,
{
    type Item = CsvResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Bom => {
                self.stage = Stage::Header;
                Some(Ok(UTF8_BOM.to_vec()))
            }
            Stage::Header => {
                self.stage = Stage::Rows;
                let headers = std::mem::take(&mut self.headers);
                Some(encode_record(&headers))
            }
            Stage::Rows => match self.rows.next() {
                Some(row) => {
                    let chunk = encode_record(&row);
                    if chunk.is_err() {
                        self.stage = Stage::Done;
                    }
                    Some(chunk)
                }
                None => {
                    self.stage = Stage::Done;
                    None
                }
            },
            Stage::Done => None,
        }
    }
}

/// Encode a whole document into memory.
pub fn encode_all<I>(headers: Vec<String>, rows: I) -> CsvResult<Vec<u8>>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut out = Vec::new();
    for chunk in CsvChunks::new(headers, rows) {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

/// Bounded sample of a transformation plus its true row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub template_key: String,
}

impl Preview {
    /// Materialize every row, keep the first `limit`.
    pub fn collect<I>(headers: Vec<String>, rows: I, limit: usize, template_key: &str) -> Self
    where
        I: Iterator<Item = Vec<String>>,
    {
        let all: Vec<Vec<String>> = rows.collect();
        let total_rows = all.len();
        Self {
            headers,
            rows: all.into_iter().take(limit).collect(),
            total_rows,
            template_key: template_key.to_string(),
        }
    }
}
