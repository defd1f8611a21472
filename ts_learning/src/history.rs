//! Stage outcomes appended to a `;`-delimited CSV in the corpus root.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Ok,
    Skipped,
    Warning,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Local>,
    pub stage: Stage,
    pub status: StageStatus,
    pub detail: String,
}

#[derive(Clone, Debug)]
pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row; the header goes in only when the file is new.
    pub fn record(&self, stage: Stage, status: StageStatus, detail: &str) -> Result<(), csv::Error> {
        let is_new = self.path.metadata().map(|meta| meta.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().delimiter(b';').has_headers(is_new).from_writer(file);
        writer.serialize(HistoryRecord {
            timestamp: Local::now(),
            stage,
            status,
            detail: detail.to_string(),
        })?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(&self) -> Result<Vec<HistoryRecord>, csv::Error> {
        let file = File::open(&self.path)?;
        let mut reader = ReaderBuilder::new().delimiter(b';').from_reader(file);
        reader.deserialize().collect()
    }
}
