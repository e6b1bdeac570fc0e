use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ExportError, Result};
use crate::source::RowSink;

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes one table as CSV: BOM, optional header, CRLF-terminated rows.
pub struct CsvTableWriter<W: Write> {
    inner: csv::Writer<W>,
    rows_written: u64,
}

impl CsvTableWriter<BufWriter<File>> {
    /// Create (or truncate) the CSV file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvTableWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(UTF8_BOM)?;
        let inner = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .flexible(true)
            .from_writer(writer);
        Ok(Self {
            inner,
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush buffered output and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        self.inner
            .into_inner()
            .map_err(|e| ExportError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
    }
}

impl<W: Write> RowSink for CsvTableWriter<W> {
    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        if !columns.is_empty() {
            self.inner.write_record(columns)?;
        }
        Ok(())
    }

    fn write_row(&mut self, values: &[Option<String>]) -> Result<()> {
        self.inner
            .write_record(values.iter().map(|v| v.as_deref().unwrap_or("")))?;
        self.rows_written += 1;
        Ok(())
    }
}
