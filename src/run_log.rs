use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

pub const HEADER: [&str; 6] = [
    "Timestamp",
    "Category",
    "Subcategory",
    "Manuscripts",
    "Status",
    "Error",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    NoData,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::NoData => "NO_DATA",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub timestamp: String,
    pub category: String,
    pub subcategory: String,
    pub manuscript_count: usize,
    pub status: RunStatus,
    pub error_message: String,
}

impl LogRow {
    pub fn now(
        category: &str,
        subcategory: &str,
        manuscript_count: usize,
        status: RunStatus,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            category: category.to_owned(),
            subcategory: subcategory.to_owned(),
            manuscript_count,
            status,
            error_message: error_message.into(),
        }
    }
}

/// Append-only CSV log, one row per subcategory attempt.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `row`, writing the header first when the file is new or empty.
    pub fn append(&self, row: &LogRow) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log dir: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open run log: {}", self.path.display()))?;
        let is_empty = file
            .metadata()
            .map(|m| m.len() == 0)
            .with_context(|| format!("stat run log: {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer.write_record(HEADER).context("write run log header")?;
        }

        let count = row.manuscript_count.to_string();
        writer
            .write_record([
                row.timestamp.as_str(),
                row.category.as_str(),
                row.subcategory.as_str(),
                count.as_str(),
                row.status.as_str(),
                row.error_message.as_str(),
            ])
            .context("write run log row")?;
        writer.flush().context("flush run log")?;
        Ok(())
    }
}
