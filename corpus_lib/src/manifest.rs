use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use serde::Serialize;
use tracing::info;

use crate::{entry::CorpusEntry, error::CorpusError, store::CorpusStore};

/// Training sample list: base paths (no extension) in base-name order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SampleManifest {
    pub path: PathBuf,
    pub bases: Vec<PathBuf>,
}

impl SampleManifest {
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn first(&self) -> Option<&PathBuf> {
        self.bases.first()
    }
}

/// Rewrites `list.txt` from scratch. Multi-line entries are refused; they
/// must go through the splitter first.
pub fn build_manifest(
    store: &CorpusStore,
    entries: &[CorpusEntry],
    threshold: usize,
) -> Result<SampleManifest, CorpusError> {
    if let Some(entry) = entries.iter().find(|entry| entry.is_multiline(threshold)) {
        return Err(CorpusError::MalformedEntry {
            base: entry.base.clone(),
            reason: format!("{} text lines, split it before training", entry.non_empty_lines()),
        });
    }

    let path = store.manifest_path();
    let mut sorted: Vec<&CorpusEntry> = entries.iter().filter(|entry| entry.non_empty_lines() > 0).collect();
    sorted.sort_by(|a, b| a.base.cmp(&b.base));
    if sorted.is_empty() {
        return Err(CorpusError::EmptyManifest(path));
    }

    let bases: Vec<PathBuf> = sorted.iter().map(|entry| entry.base_path()).collect();
    let file = File::create(&path).map_err(CorpusError::io(&path))?;
    let mut writer = BufWriter::new(file);
    for base in &bases {
        writeln!(writer, "{}", base.display()).map_err(CorpusError::io(&path))?;
    }
    writer.flush().map_err(CorpusError::io(&path))?;

    info!(samples = bases.len(), path = %path.display(), "sample manifest written");
    Ok(SampleManifest { path, bases })
}

pub fn read_manifest(store: &CorpusStore) -> Result<SampleManifest, CorpusError> {
    let path = store.manifest_path();
    let contents = fs::read_to_string(&path).map_err(CorpusError::io(&path))?;
    let bases = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();
    Ok(SampleManifest { path, bases })
}
