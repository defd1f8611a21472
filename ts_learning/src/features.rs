//! Box extraction for every single-line entry and the corpus-wide symbol
//! inventory built from the resulting box files.

use std::{collections::BTreeSet, path::PathBuf};

use corpus_lib::{CorpusEntry, CorpusStore};
use rayon::prelude::*;
use serde::Serialize;
use tesseract_lib::{Engine, EngineError, boxfile::read_symbols, fs::is_up_to_date};
use tracing::{info, warn};

use crate::error::StageError;

/// Unique characters seen across all box files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SymbolInventory(pub BTreeSet<String>);

impl SymbolInventory {
    /// Union of the symbols of `box_files`; unreadable files are skipped
    /// with a warning.
    pub fn from_box_files(box_files: &[PathBuf]) -> Self {
        let mut symbols = BTreeSet::new();
        for path in box_files {
            match read_symbols(path) {
                Ok(found) => symbols.extend(found),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable box file"),
            }
        }
        Self(symbols)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Extraction {
    pub box_files: Vec<PathBuf>,
    pub reused: usize,
    /// Bases whose extraction failed.
    pub failed: Vec<String>,
    pub inventory: SymbolInventory,
    pub inventory_path: PathBuf,
}

// Box file for one entry; `true` when an earlier run produced it after the
// last change to the image and transcript.
fn entry_boxes(engine: &dyn Engine, store: &CorpusStore, entry: &CorpusEntry, psm: u8) -> Result<(PathBuf, bool), EngineError> {
    let existing = store.box_path(&entry.base);
    if is_up_to_date(&existing, &[entry.image.as_path(), entry.transcript.as_path()]) {
        return Ok((existing, true));
    }
    let produced = engine.extract_boxes(&entry.image, &entry.base_path(), psm)?;
    if !produced.is_file() {
        return Err(EngineError::Io {
            path: produced,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "box file was not written"),
        });
    }
    Ok((produced, false))
}

/// Extracts boxes in parallel, then writes the inventory file.
///
/// Per-image failures are logged and counted. The stage fails only when no
/// box file at all is available or no symbol could be read from them.
pub fn extract_features(
    engine: &dyn Engine,
    store: &CorpusStore,
    entries: &[CorpusEntry],
    psm: u8,
) -> Result<Extraction, StageError> {
    let mut results: Vec<(&str, Result<(PathBuf, bool), EngineError>)> = entries
        .par_iter()
        .map(|entry| (entry.base.as_str(), entry_boxes(engine, store, entry, psm)))
        .collect();
    results.sort_by(|a, b| a.0.cmp(b.0));

    let mut extraction = Extraction {
        inventory_path: store.inventory_path(),
        ..Extraction::default()
    };
    for (base, result) in results {
        match result {
            Ok((path, reused)) => {
                extraction.reused += usize::from(reused);
                extraction.box_files.push(path);
            }
            Err(err) => {
                warn!(base, error = %err, "box extraction failed");
                extraction.failed.push(base.to_string());
            }
        }
    }

    let no_output = || StageError::NoOutput {
        failed: extraction.failed.len(),
        total: entries.len(),
    };
    if extraction.box_files.is_empty() {
        return Err(no_output());
    }
    let inventory = SymbolInventory::from_box_files(&extraction.box_files);
    if inventory.is_empty() {
        return Err(no_output());
    }

    engine.build_inventory(&extraction.box_files, &extraction.inventory_path)?;
    if !extraction.inventory_path.is_file() {
        return Err(StageError::MissingPrecondition(extraction.inventory_path));
    }
    info!(
        boxes = extraction.box_files.len(),
        reused = extraction.reused,
        failed = extraction.failed.len(),
        symbols = inventory.len(),
        "symbol inventory written"
    );
    extraction.inventory = inventory;
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        time::{Duration, SystemTime},
    };

    use corpus_lib::CorpusStore;

    use super::*;
    use crate::fake::{FakeEngine, corpus_with, write_sample};

    #[test]
    fn inventory_does_not_depend_on_entry_order() {
        let (dir, store) = corpus_with(&[("x", "ab"), ("y", "cd"), ("z", "e")]);
        let engine = FakeEngine::default();
        let mut entries = store.entries().unwrap();
        let forward = extract_features(&engine, &store, &entries, 13).unwrap();

        for entry in &entries {
            fs::remove_file(store.box_path(&entry.base)).unwrap();
        }
        entries.reverse();
        let backward = extract_features(&engine, &store, &entries, 13).unwrap();

        assert_eq!(forward.inventory, backward.inventory);
        assert_eq!(forward.box_files, backward.box_files);
        let symbols: Vec<&str> = forward.inventory.0.iter().map(String::as_str).collect();
        assert_eq!(symbols, vec!["a", "b", "c", "d", "e"]);
        assert!(dir.path().join("unicharset").is_file());
    }

    #[test]
    fn existing_box_files_are_reused() {
        let (_dir, store) = corpus_with(&[("x", "ab"), ("y", "cd")]);
        let engine = FakeEngine::default();
        fs::write(store.box_path("x"), "q 0 0 1 1 0\n").unwrap();

        let extraction = extract_features(&engine, &store, &store.entries().unwrap(), 13).unwrap();
        assert_eq!(extraction.reused, 1);
        assert_eq!(engine.calls_to("extract_boxes"), 1);
        assert!(extraction.inventory.0.contains("q"));
    }

    #[test]
    fn rewritten_sample_gets_fresh_boxes() {
        let (dir, store) = corpus_with(&[("p1", "ab")]);
        let engine = FakeEngine::default();
        extract_features(&engine, &store, &store.entries().unwrap(), 13).unwrap();

        fs::File::options()
            .write(true)
            .open(store.box_path("p1"))
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))
            .unwrap();
        write_sample(dir.path(), "p1", 8, "xyz\n");

        let extraction = extract_features(&engine, &store, &store.entries().unwrap(), 13).unwrap();
        assert_eq!(extraction.reused, 0);
        assert_eq!(engine.calls_to("extract_boxes"), 2);
        let symbols: Vec<&str> = extraction.inventory.0.iter().map(String::as_str).collect();
        assert_eq!(symbols, vec!["x", "y", "z"]);
    }

    #[test]
    fn single_failures_are_counted_and_skipped() {
        let (_dir, store) = corpus_with(&[("x", "ab"), ("y", "cd")]);
        let engine = FakeEngine { failing_bases: vec!["x".into()], ..FakeEngine::default() };

        let extraction = extract_features(&engine, &store, &store.entries().unwrap(), 13).unwrap();
        assert_eq!(extraction.failed, vec!["x".to_string()]);
        assert_eq!(extraction.box_files, vec![store.box_path("y")]);
    }

    #[test]
    fn no_box_files_is_no_output() {
        let (_dir, store) = corpus_with(&[("x", "ab"), ("y", "cd")]);
        let engine = FakeEngine { failing_bases: vec!["x".into(), "y".into()], ..FakeEngine::default() };

        let err = extract_features(&engine, &store, &store.entries().unwrap(), 13).unwrap_err();
        assert!(matches!(err, StageError::NoOutput { failed: 2, total: 2 }));
        assert!(!store.inventory_path().exists());
        assert_eq!(engine.calls_to("build_inventory"), 0);
    }

    #[test]
    fn empty_store_has_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        let err = extract_features(&FakeEngine::default(), &store, &[], 13).unwrap_err();
        assert!(matches!(err, StageError::NoOutput { total: 0, .. }));
    }
}
