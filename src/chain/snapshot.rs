//! Snapshot file access.
//!
//! A snapshot is a comma-delimited file named `YYYYMMDD.<ext>`: row 0 holds
//! the column headers, row 1 the underlying (its `close` is the spot), and
//! every following row one option contract. The file's bytes are kept next
//! to the parsed records; only patched rows are rebuilt on write, and only
//! inside the IV and Greek fields, so quoting, line endings and blank lines
//! elsewhere are written back as read.

use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::chain::types::{ContractRow, ContractSymbol, OptionStyle};
use crate::error::{RepairError, Result};

pub const COL_SECURITY_ID: &str = "#symbol_id";
pub const COL_TICKER: &str = "symbol_value";
pub const COL_CLOSE: &str = "close";
pub const COL_IV: &str = "implied_volatility";
pub const COL_DELTA: &str = "delta";

/// Row holding the underlying's quote
pub const UNDERLYING_ROW: usize = 1;
/// First contract row
pub const FIRST_CONTRACT_ROW: usize = 2;

/// Greek fields following the IV column, in file order
pub const GREEK_FIELDS: [&str; 5] = ["delta", "gamma", "vega", "theta", "rho"];

/// Parse the date encoded in a snapshot file name (`YYYYMMDD.<ext>`).
pub fn date_from_path(path: &Path) -> Result<NaiveDate> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok())
        .ok_or_else(|| RepairError::InvalidFileName(path.to_path_buf()))
}

/// File name of the snapshot for `date`.
pub fn file_name(date: NaiveDate, extension: &str) -> String {
    format!("{}.{}", date.format("%Y%m%d"), extension)
}

/// Column positions located by header name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Columns {
    pub security_id: Option<usize>,
    pub ticker: Option<usize>,
    pub close: Option<usize>,
    pub iv: Option<usize>,
    pub delta: Option<usize>,
}

impl Columns {
    fn locate(header: &StringRecord) -> Self {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        Self {
            security_id: find(COL_SECURITY_ID),
            ticker: find(COL_TICKER),
            close: find(COL_CLOSE),
            iv: find(COL_IV),
            delta: find(COL_DELTA),
        }
    }

    fn get(&self, name: &str) -> Option<usize> {
        match name {
            COL_SECURITY_ID => self.security_id,
            COL_TICKER => self.ticker,
            COL_CLOSE => self.close,
            COL_IV => self.iv,
            COL_DELTA => self.delta,
            _ => None,
        }
    }

    /// Names from `required` that the header lacks.
    pub fn missing(&self, required: &[&'static str]) -> Vec<&'static str> {
        required
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }
}

/// One snapshot held fully in memory.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    date: NaiveDate,
    raw: Vec<u8>,
    records: Vec<StringRecord>,
    /// Byte range of each record in `raw`, line terminator excluded
    spans: Vec<Range<usize>>,
    /// Replacement bytes for patched records, by record index
    patched: BTreeMap<usize, Vec<u8>>,
    columns: Columns,
}

impl SnapshotFile {
    /// Read every non-blank line of the snapshot at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let date = date_from_path(path)?;

        let raw = fs::read(path)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_slice());

        let mut parsed = Vec::new();
        for record in reader.records() {
            let record = record?;
            let start = record.position().map(|p| p.byte() as usize).ok_or_else(|| {
                RepairError::InvalidInput(format!("{}: record without a position", path.display()))
            })?;
            parsed.push((start, record));
        }

        let mut records = Vec::with_capacity(parsed.len());
        let mut spans = Vec::with_capacity(parsed.len());
        for (i, (start, record)) in parsed.iter().enumerate() {
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let next = parsed.get(i + 1).map_or(raw.len(), |(s, _)| *s);
            spans.push(*start..trim_terminator(&raw, *start, next));
            records.push(record.clone());
        }

        let columns = records.first().map(Columns::locate).unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            date,
            raw,
            records,
            spans,
            patched: BTreeMap::new(),
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Number of records including header and underlying rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indices of contract rows
    pub fn contract_rows(&self) -> std::ops::Range<usize> {
        FIRST_CONTRACT_ROW.min(self.records.len())..self.records.len()
    }

    /// Raw field, or a parse error naming `field` when the row is short.
    pub fn field(&self, row: usize, col: usize, field: &'static str) -> Result<&str> {
        self.records
            .get(row)
            .and_then(|r| r.get(col))
            .ok_or_else(|| RepairError::Parse {
                path: self.path.clone(),
                row,
                field,
                value: String::new(),
            })
    }

    pub fn parse_f64(&self, row: usize, col: usize, field: &'static str) -> Result<f64> {
        let raw = self.field(row, col, field)?;
        raw.trim().parse::<f64>().map_err(|_| RepairError::Parse {
            path: self.path.clone(),
            row,
            field,
            value: raw.to_string(),
        })
    }

    /// Spot price from the underlying row's close.
    pub fn underlying_close(&self) -> Result<f64> {
        let col = self.columns.close.ok_or_else(|| {
            RepairError::InvalidInput(format!("{} has no {COL_CLOSE} column", self.path.display()))
        })?;
        self.parse_f64(UNDERLYING_ROW, col, COL_CLOSE)
    }

    /// Parse contract row `row`. Requires the IV and ticker columns.
    pub fn contract_row(&self, row: usize, european_roots: &[String]) -> Result<ContractRow> {
        let (iv_col, ticker_col) = match (self.columns.iv, self.columns.ticker) {
            (Some(iv), Some(ticker)) => (iv, ticker),
            _ => {
                return Err(RepairError::InvalidInput(format!(
                    "{} lacks {COL_IV} or {COL_TICKER}",
                    self.path.display()
                )))
            }
        };

        let iv = self.parse_f64(row, iv_col, COL_IV)?;
        let ticker = self.field(row, ticker_col, COL_TICKER)?.to_string();
        let symbol = ContractSymbol::parse(&ticker)?;
        let style = OptionStyle::for_root(&symbol.root, european_roots);
        Ok(ContractRow {
            row,
            ticker,
            symbol,
            style,
            iv,
        })
    }

    /// Overwrite the IV field of `row` and the five Greek fields after it.
    pub fn overwrite_iv_and_greeks(&mut self, row: usize, values: [f64; 6]) -> Result<()> {
        let iv_col = self.columns.iv.ok_or_else(|| {
            RepairError::InvalidInput(format!("{} has no {COL_IV} column", self.path.display()))
        })?;
        let last_col = iv_col + GREEK_FIELDS.len();
        let record = self.records.get(row).ok_or_else(|| RepairError::Parse {
            path: self.path.clone(),
            row,
            field: COL_IV,
            value: String::new(),
        })?;
        if record.len() <= last_col {
            let field = if record.len() <= iv_col {
                COL_IV
            } else {
                GREEK_FIELDS[record.len() - iv_col - 1]
            };
            return Err(RepairError::Parse {
                path: self.path.clone(),
                row,
                field,
                value: String::new(),
            });
        }

        let rendered: Vec<String> = values.iter().map(|v| format_value(*v)).collect();

        let line = &self.raw[self.spans[row].clone()];
        let fields = field_spans(line);
        let (first, last) = match (fields.get(iv_col), fields.get(last_col)) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => {
                return Err(RepairError::Parse {
                    path: self.path.clone(),
                    row,
                    field: COL_IV,
                    value: String::from_utf8_lossy(line).into_owned(),
                })
            }
        };
        let mut patched = Vec::with_capacity(line.len() + 32);
        patched.extend_from_slice(&line[..first]);
        patched.extend_from_slice(rendered.join(",").as_bytes());
        patched.extend_from_slice(&line[last..]);

        let rebuilt: StringRecord = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                if (iv_col..=last_col).contains(&col) {
                    rendered[col - iv_col].clone()
                } else {
                    field.to_string()
                }
            })
            .collect();
        self.records[row] = rebuilt;
        self.patched.insert(row, patched);
        Ok(())
    }

    /// Replace the file on disk with the bytes as read, patched rows swapped in.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the original, so readers see either the old or the
    /// new content.
    pub fn write_atomic(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;

        {
            let file = tmp.as_file_mut();
            let mut cursor = 0;
            for (row, bytes) in &self.patched {
                let span = &self.spans[*row];
                file.write_all(&self.raw[cursor..span.start])?;
                file.write_all(bytes)?;
                cursor = span.end;
            }
            file.write_all(&self.raw[cursor..])?;
            file.flush()?;
        }

        if let Ok(meta) = fs::metadata(&self.path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| RepairError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// End of the record starting at `start`: line breaks and skipped blank
/// lines before `next` are left out.
fn trim_terminator(raw: &[u8], start: usize, next: usize) -> usize {
    let mut end = next.min(raw.len());
    while end > start && matches!(raw[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    end
}

/// Byte ranges of the fields of one raw record. Commas inside double
/// quotes do not split; doubled quotes toggle twice and cancel out.
fn field_spans(line: &[u8]) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, b) in line.iter().enumerate() {
        match b {
            b'"' => quoted = !quoted,
            b',' if !quoted => {
                spans.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    spans.push(start..line.len());
    spans
}

/// Shortest round-trip rendering, with negative zero written as `0`.
fn format_value(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_comes_from_file_stem() {
        let d = date_from_path(Path::new("/data/SPY/20240102.csv")).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(date_from_path(Path::new("/data/SPY/2024-01-02.csv")).is_err());
        assert!(date_from_path(Path::new("/data/SPY/20241302.csv")).is_err());
        assert!(date_from_path(Path::new("/data/SPY/notes.csv")).is_err());
    }

    #[test]
    fn file_name_round_trips() {
        let d = NaiveDate::from_ymd_opt(2023, 11, 7).unwrap();
        assert_eq!(file_name(d, "csv"), "20231107.csv");
        assert_eq!(date_from_path(Path::new(&file_name(d, "csv"))).unwrap(), d);
    }

    #[test]
    fn field_spans_respect_quotes() {
        let line = br#""1000","a,b",0.2,"say ""hi""",x"#;
        let fields: Vec<&[u8]> = field_spans(line).into_iter().map(|r| &line[r]).collect();
        let expected: Vec<&[u8]> = vec![
            br#""1000""#,
            br#""a,b""#,
            b"0.2",
            br#""say ""hi""""#,
            b"x",
        ];
        assert_eq!(fields, expected);
    }

    #[test]
    fn terminator_is_not_part_of_the_record() {
        let raw = b"a,b\r\n\r\nc,d";
        assert_eq!(trim_terminator(raw, 0, 7), 3);
        assert_eq!(trim_terminator(raw, 7, raw.len()), raw.len());
    }

    #[test]
    fn negative_zero_is_written_plainly() {
        assert_eq!(format_value(-0.0), "0");
        assert_eq!(format_value(0.25), "0.25");
    }
}
