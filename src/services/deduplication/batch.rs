//! Raw CSV delivery parsing and re-serialization.

use crate::models::{Field, Row};
use crate::{Error, Result};

/// UTF-8 byte order mark, stripped from the start of a delivery.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Line ending used when writing a batch back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// Detects the line ending of the first record.
    fn detect(content: &[u8]) -> Self {
        match content.iter().position(|&b| b == b'\n') {
            Some(i) if i > 0 && content[i - 1] == b'\r' => Self::CrLf,
            _ => Self::Lf,
        }
    }

    const fn terminator(self) -> csv::Terminator {
        match self {
            Self::Lf => csv::Terminator::Any(b'\n'),
            Self::CrLf => csv::Terminator::CRLF,
        }
    }
}

/// One CSV delivery: a header plus data rows.
///
/// The first record is always the header. Header cells are kept as raw
/// bytes and written back unchanged; their lossy UTF-8 form only names the
/// fields of each row. Records may be longer or shorter than the header;
/// values past the header get an empty column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvBatch {
    header: Vec<Vec<u8>>,
    rows: Vec<Row>,
    line_ending: LineEnding,
}

impl CsvBatch {
    /// Parses raw CSV bytes.
    ///
    /// Empty input (or a bare BOM) yields an empty batch. The line ending of
    /// the first record is remembered for [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the content is not parseable CSV.
    pub fn parse(content: &[u8]) -> Result<Self> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content);

        let mut records = reader.byte_records();

        let Some(first) = records.next() else {
            return Ok(Self::default());
        };
        let header: Vec<Vec<u8>> = first.map_err(read_error)?.iter().map(<[u8]>::to_vec).collect();
        let names: Vec<String> = header
            .iter()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(read_error)?;
            let row: Row = record
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    Field::new(names.get(i).cloned().unwrap_or_default(), value.to_vec())
                })
                .collect();
            rows.push(row);
        }

        Ok(Self {
            header,
            rows,
            line_ending: LineEnding::detect(content),
        })
    }

    /// Returns the raw header cells.
    #[must_use]
    pub fn header(&self) -> &[Vec<u8>] {
        &self.header
    }

    /// Returns the data rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the line ending used by [`to_bytes`](Self::to_bytes).
    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Moves the data rows out, leaving the header in place.
    pub fn take_rows(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    /// Replaces the data rows.
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows;
    }

    /// Returns true if the batch has neither header nor rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.rows.is_empty()
    }

    /// Serializes the header and rows back to CSV.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if writing fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(self.line_ending.terminator())
            .from_writer(Vec::new());

        writer.write_record(&self.header).map_err(write_error)?;
        for row in &self.rows {
            writer.write_record(row.values()).map_err(write_error)?;
        }

        writer.into_inner().map_err(|e| Error::OperationFailed {
            operation: "write_csv".to_string(),
            cause: e.to_string(),
        })
    }
}

fn read_error(e: csv::Error) -> Error {
    Error::OperationFailed {
        operation: "read_csv".to_string(),
        cause: e.to_string(),
    }
}

fn write_error(e: csv::Error) -> Error {
    Error::OperationFailed {
        operation: "write_csv".to_string(),
        cause: e.to_string(),
    }
}
