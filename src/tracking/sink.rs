//! Output boundary for session records.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::encoding::slugify;
use super::types::{ResultRecord, SessionReport};

/// Consumes the ordered records of a session.
pub trait Sink: Send {
    /// Accept one record, in rank order.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written.
    fn record(&mut self, record: &ResultRecord) -> io::Result<()>;

    /// Accept the final report once the session has ended.
    ///
    /// # Errors
    /// Returns an error if the summary cannot be written.
    fn finish(&mut self, report: &SessionReport) -> io::Result<()>;
}

/// Writes one line per record, then the summary line.
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<BufWriter<File>> {
    /// Create (or truncate) a results log at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn record(&mut self, record: &ResultRecord) -> io::Result<()> {
        writeln!(self.writer, "{record}")
    }

    fn finish(&mut self, report: &SessionReport) -> io::Result<()> {
        writeln!(self.writer, "{}", report.summary_line())?;
        self.writer.flush()
    }
}

/// Buffers records and the summary in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Records received so far.
    pub records: Vec<ResultRecord>,
    /// Summary line, once finished.
    pub summary: Option<String>,
}

impl Sink for CollectingSink {
    fn record(&mut self, record: &ResultRecord) -> io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self, report: &SessionReport) -> io::Result<()> {
        self.summary = Some(report.summary_line());
        Ok(())
    }
}

/// Results log path for `query` under `dir`. The log is overwritten on every run.
#[must_use]
pub fn results_file_path(dir: &Path, query: &str) -> PathBuf {
    dir.join(format!("{}_web.log", slugify(query)))
}
