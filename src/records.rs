use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Context;
#[cfg(test)] use mockall::automock;
use tracing::info;

/// Reads the ordered list of outbound records: one record per line,
///  surrounding whitespace trimmed.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading records from {}", path.display()))?;

    Ok(content.lines()
        .map(|line| line.trim().to_string())
        .collect())
}

/// This is an abstraction for the sink that a session's accepted records are
///  flushed to, introduced to facilitate mocking the file I/O away for testing
#[cfg_attr(test, automock)]
pub trait RecordSink: Send {
    fn write_records(&mut self, records: &[String]) -> anyhow::Result<()>;
}

/// Writes the accepted records to a text file, one capitalized record per
///  line, replacing whatever a previous session wrote.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> FileSink {
        FileSink { path }
    }
}

impl RecordSink for FileSink {
    fn write_records(&mut self, records: &[String]) -> anyhow::Result<()> {
        let mut out = String::new();
        for record in records {
            out.push_str(&capitalize(record));
            out.push('\n');
        }

        fs::write(&self.path, out)
            .with_context(|| format!("writing records to {}", self.path.display()))?;

        info!("flushed {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// First character uppercased, the rest lowercased.
pub fn capitalize(record: &str) -> String {
    let mut chars = record.chars();
    match chars.next() {
        Some(first) => first.to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}
