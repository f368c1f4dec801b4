//! CSV report writer.
//!
//! Layout: UTF-8 byte-order mark, header row, one row per record in id order,
//! then optional benchmark summary rows. Every field is quoted; newlines and
//! carriage returns inside extracted text become single spaces. In streaming
//! mode the writer sits behind a shared lock and workers append rows as they
//! complete.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use csv::{QuoteStyle, WriterBuilder};
use parking_lot::Mutex;

use crate::benchmark::BenchmarkSummary;
use crate::error::PipelineError;
use crate::worker::OcrRecord;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
pub const HEADER: [&str; 4] = ["ID", "Filename", "ExtractedText", "ProcessingTime(ms)"];

/// Report writer shared between workers in streaming mode.
pub type SharedReport = Arc<Mutex<ReportWriter<BufWriter<File>>>>;

/// Replace each `\n` and `\r` with a space. Nothing else changes.
pub fn sanitize(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

pub struct ReportWriter<W: Write> {
    csv: csv::Writer<W>,
    rows: usize,
}

impl ReportWriter<BufWriter<File>> {
    /// Create (truncate) the report file and write BOM + header.
    pub fn create(path: &Path) -> Result<Self, PipelineError> {
        let file = File::create(path).map_err(|source| PipelineError::ReportOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_writer(BufWriter::new(file))
    }

    pub fn into_shared(self) -> SharedReport {
        Arc::new(Mutex::new(self))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn from_writer(mut inner: W) -> Result<Self, PipelineError> {
        inner.write_all(UTF8_BOM)?;
        let mut csv = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            // Summary rows have two columns.
            .flexible(true)
            .from_writer(inner);
        csv.write_record(HEADER)?;
        Ok(Self { csv, rows: 0 })
    }

    pub fn write_record(&mut self, record: &OcrRecord) -> Result<(), PipelineError> {
        self.csv.write_record([
            record.id.to_string(),
            record.filename.clone(),
            sanitize(&record.text),
            record.elapsed_ms.to_string(),
        ])?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_records<'a, I>(&mut self, records: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = &'a OcrRecord>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Append the benchmark comparison rows.
    pub fn write_summary(&mut self, summary: &BenchmarkSummary) -> Result<(), PipelineError> {
        let sequential_profile = summary
            .sequential
            .as_ref()
            .map(|s| s.profile.as_str())
            .unwrap_or("n/a");
        let duration = |ms: Option<u64>| ms.map(|v| format!("{v} ms")).unwrap_or_else(|| "n/a".into());

        let rows = [
            (
                "Total Duration for Sequential Run".to_string(),
                duration(summary.sequential.as_ref().map(|s| s.cumulative_ms)),
            ),
            (
                format!("Total Duration for Pooled Run ({} workers)", summary.pooled.workers),
                duration(Some(summary.pooled.cumulative_ms)),
            ),
            (
                "Performance Gain from Pool".to_string(),
                summary
                    .speedup_pct()
                    .map(|pct| format!("{pct:.2}%"))
                    .unwrap_or_else(|| "n/a".into()),
            ),
            (
                "Wall Clock for Sequential Run".to_string(),
                duration(summary.sequential.as_ref().map(|s| s.wall_ms)),
            ),
            (
                "Wall Clock for Pooled Run".to_string(),
                duration(Some(summary.pooled.wall_ms)),
            ),
            (
                "Normalization Profiles (sequential / pooled)".to_string(),
                format!("{sequential_profile} / {}", summary.pooled.profile),
            ),
        ];
        for (label, value) in rows {
            self.csv.write_record([label, value])?;
        }
        Ok(())
    }

    /// Data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<(), PipelineError> {
        self.csv.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, PipelineError> {
        self.csv
            .into_inner()
            .map_err(|e| PipelineError::Io(e.into_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::RunTotals;

    fn record(id: u64, name: &str, text: &str, ms: u64) -> OcrRecord {
        OcrRecord {
            id,
            filename: name.into(),
            text: text.into(),
            elapsed_ms: ms,
        }
    }

    fn render(f: impl FnOnce(&mut ReportWriter<Vec<u8>>)) -> String {
        let mut writer = ReportWriter::from_writer(Vec::new()).unwrap();
        f(&mut writer);
        let bytes = writer.into_inner().unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap()
    }

    #[test]
    fn sanitize_only_touches_line_breaks() {
        assert_eq!(sanitize("a\nb\r\nc\rd"), "a b  c d");
        assert_eq!(sanitize("tab\tand \"quote\""), "tab\tand \"quote\"");
    }

    #[test]
    fn header_follows_bom() {
        let out = render(|_| {});
        assert_eq!(out, "\"ID\",\"Filename\",\"ExtractedText\",\"ProcessingTime(ms)\"\n");
    }

    #[test]
    fn rows_are_quoted_and_single_line() {
        let out = render(|w| {
            w.write_record(&record(1, "a.png", "line one\nline \"two\"\r\n", 42))
                .unwrap();
            assert_eq!(w.rows(), 1);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "\"1\",\"a.png\",\"line one line \"\"two\"\"  \",\"42\""
        );
    }

    #[test]
    fn written_text_reads_back_unchanged_except_breaks() {
        let out = render(|w| {
            w.write_records(&[record(1, "x.png", "HELLO,\nWORLD", 7)]).unwrap();
        });
        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[2], "HELLO, WORLD");
        assert_eq!(&row[3], "7");
    }

    #[test]
    fn summary_rows_follow_data() {
        let summary = BenchmarkSummary {
            sequential: Some(RunTotals {
                profile: "scaled-gray".into(),
                workers: 1,
                files: 2,
                cumulative_ms: 300,
                wall_ms: 310,
            }),
            pooled: RunTotals {
                profile: "gamma-gray".into(),
                workers: 2,
                files: 2,
                cumulative_ms: 200,
                wall_ms: 120,
            },
        };
        let out = render(|w| w.write_summary(&summary).unwrap());
        assert!(out.contains("\"Total Duration for Sequential Run\",\"300 ms\""));
        assert!(out.contains("\"Total Duration for Pooled Run (2 workers)\",\"200 ms\""));
        assert!(out.contains("\"Performance Gain from Pool\",\"150.00%\""));
        assert!(out.contains("\"scaled-gray / gamma-gray\""));
    }

    #[test]
    fn summary_without_sequential_totals_reads_na() {
        let summary = BenchmarkSummary {
            sequential: None,
            pooled: RunTotals {
                profile: "gamma-gray".into(),
                workers: 2,
                files: 0,
                cumulative_ms: 0,
                wall_ms: 1,
            },
        };
        let out = render(|w| w.write_summary(&summary).unwrap());
        assert!(out.contains("\"Total Duration for Sequential Run\",\"n/a\""));
        assert!(out.contains("\"Performance Gain from Pool\",\"n/a\""));
        assert!(out.contains("\"n/a / gamma-gray\""));
    }

    #[test]
    fn create_fails_for_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.csv");
        assert!(matches!(
            ReportWriter::create(&path),
            Err(PipelineError::ReportOpen { .. })
        ));
    }
}
