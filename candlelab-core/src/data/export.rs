//! CSV export row handling.
//!
//! The datastore's export endpoint streams query results as CSV with one
//! row per candle: `ticker, open, high, low, close, volume, timestamp`
//! and, when the table carries it, a trailing `transactions` column.
//! Wire timestamps are UTC microseconds; everything downstream uses
//! milliseconds.

use crate::data::source::DataError;
use crate::domain::Candle;

/// Reassembles CSV lines from raw HTTP chunks and parses each complete
/// row. The first line is the header and is skipped.
#[derive(Debug, Default)]
pub struct ExportRows {
    pending: Vec<u8>,
    line: usize,
}

impl ExportRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of response bytes, appending every completed row to
    /// `out`.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        out: &mut Vec<(String, Candle)>,
    ) -> Result<(), DataError> {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line[..line.len() - 1], out)?;
        }
        Ok(())
    }

    /// Flush a final row that arrived without a trailing newline.
    pub fn finish(&mut self, out: &mut Vec<(String, Candle)>) -> Result<(), DataError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.pending);
        self.consume_line(&line, out)
    }

    fn consume_line(
        &mut self,
        raw: &[u8],
        out: &mut Vec<(String, Candle)>,
    ) -> Result<(), DataError> {
        self.line += 1;
        let raw = match raw.last() {
            Some(b'\r') => &raw[..raw.len() - 1],
            _ => raw,
        };
        if raw.is_empty() {
            return Ok(());
        }
        if self.line == 1 {
            // Header row.
            return Ok(());
        }
        out.push(parse_row(raw, self.line)?);
        Ok(())
    }
}

/// Parse one CSV row into `(ticker, candle)`.
///
/// Eight-column rows carry `transactions` in the final field; seven-column
/// rows lack it, and it reads as zero. Negative counts (a known artifact
/// of some ingest runs) also read as zero.
pub fn parse_row(raw: &[u8], line: usize) -> Result<(String, Candle), DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(raw);
    let mut record = csv::StringRecord::new();
    let read = reader
        .read_record(&mut record)
        .map_err(|e| malformed(line, e.to_string()))?;
    if !read {
        return Err(malformed(line, "empty record".into()));
    }
    if record.len() != 7 && record.len() != 8 {
        return Err(malformed(
            line,
            format!("expected 7 or 8 columns, got {}", record.len()),
        ));
    }

    let ticker = record
        .get(0)
        .ok_or_else(|| malformed(line, "missing ticker".into()))?
        .to_string();
    let price = |i: usize, name: &str| -> Result<f64, DataError> {
        record
            .get(i)
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| malformed(line, format!("bad {name}")))
    };
    let open = price(1, "open")?;
    let high = price(2, "high")?;
    let low = price(3, "low")?;
    let close = price(4, "close")?;
    let volume = record
        .get(5)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| malformed(line, "bad volume".into()))?
        .max(0) as u64;
    let micros = record
        .get(6)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| malformed(line, "bad timestamp".into()))?;
    let transactions = match record.get(7) {
        Some(s) => s.parse::<i64>().unwrap_or(0).max(0) as u64,
        None => 0,
    };

    Ok((
        ticker,
        Candle {
            open,
            high,
            low,
            close,
            volume,
            transactions,
            timestamp: micros / 1000,
        },
    ))
}

fn malformed(line: usize, reason: String) -> DataError {
    DataError::MalformedRow { line, reason }
}
