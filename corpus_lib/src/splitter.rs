//! Splits multi-line samples into one sample per transcript line.
//!
//! The image is cut into `line_count` equal full-width bands, where
//! `line_count` counts blank transcript lines too, so each line keeps its
//! vertical position. Blank lines yield no sample. Rows left over by the
//! integer division stay unused; no text-row detection is attempted.

use std::{collections::BTreeMap, fs, path::PathBuf};

use images::{ImagePNG, algorythms::Algorythms};
use serde::Serialize;
use tesseract_lib::engine::with_suffix;
use tracing::{info, warn};

use crate::{
    entry::CorpusEntry,
    error::CorpusError,
    store::{CorpusStore, TRANSCRIPT_SUFFIX},
};

/// Horizontal band of the source image holding one transcript line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Band {
    /// 1-based position of the line in the transcript.
    pub line_no: usize,
    pub y: u32,
    pub height: u32,
    pub text: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SplitSummary {
    pub scanned: usize,
    pub multiline: usize,
    pub created: Vec<String>,
    pub failed: Vec<String>,
    pub backup_dir: PathBuf,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RestoreSummary {
    pub restored: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Bases left in the archive because a file of theirs is back in the root.
    pub kept: Vec<String>,
}

pub fn line_base(base: &str, line_no: usize) -> String {
    format!("{base}_line{line_no:03}")
}

/// Computes the bands of the non-blank lines of a transcript.
pub fn plan_bands(base: &str, image_height: u32, lines: &[String]) -> Result<Vec<Band>, CorpusError> {
    let malformed = |reason: String| CorpusError::MalformedEntry { base: base.to_string(), reason };
    if lines.is_empty() {
        return Err(malformed("transcript has no lines".to_string()));
    }
    let line_count = u32::try_from(lines.len()).map_err(|_| malformed(format!("{} lines", lines.len())))?;
    let band_height = image_height / line_count;
    if band_height == 0 {
        return Err(malformed(format!("image is {image_height} px tall for {line_count} lines")));
    }

    Ok(lines
        .iter()
        .zip(0u32..)
        .filter(|(text, _)| !text.is_empty())
        .map(|(text, index)| Band {
            line_no: index as usize + 1,
            y: index * band_height,
            height: band_height,
            text: text.clone(),
        })
        .collect())
}

/// Writes one single-line entry per band and archives the original pair.
///
/// Nothing is written when the backup slot of the original is already taken.
pub fn split_entry(store: &CorpusStore, entry: &CorpusEntry) -> Result<Vec<CorpusEntry>, CorpusError> {
    let backup_dir = store.backup_dir();
    for original in [&entry.image, &entry.transcript] {
        if let Some(name) = original.file_name() {
            let target = backup_dir.join(name);
            if target.exists() {
                return Err(CorpusError::BackupExists(target));
            }
        }
    }

    let image = ImagePNG::open(&entry.image)?;
    let bands = plan_bands(&entry.base, image.height(), &entry.lines)?;
    info!(
        base = %entry.base,
        width = image.width(),
        height = image.height(),
        lines = entry.line_count(),
        "splitting multi-line entry"
    );

    let mut created = Vec::with_capacity(bands.len());
    for band in bands {
        let base = line_base(&entry.base, band.line_no);
        let image_path = with_suffix(&store.base_path(&base), ".png");
        let transcript_path = store.transcript_path(&base);
        image.crop_rows(band.y, band.height)?.write(&image_path)?;
        fs::write(&transcript_path, format!("{}\n", band.text)).map_err(CorpusError::io(&transcript_path))?;
        created.push(CorpusEntry {
            base,
            image: image_path,
            transcript: transcript_path,
            lines: vec![band.text],
        });
    }

    store.archive(&entry.image)?;
    store.archive(&entry.transcript)?;
    Ok(created)
}

/// Splits every entry with more than `threshold` non-empty lines.
///
/// A corpus without multi-line entries is left untouched, which makes a
/// second run a no-op.
pub fn split_corpus(store: &CorpusStore, threshold: usize) -> Result<SplitSummary, CorpusError> {
    let entries = store.entries()?;
    let multiline: Vec<&CorpusEntry> = entries.iter().filter(|entry| entry.is_multiline(threshold)).collect();
    let mut summary = SplitSummary {
        scanned: entries.len(),
        multiline: multiline.len(),
        backup_dir: store.backup_dir(),
        ..SplitSummary::default()
    };
    if multiline.is_empty() {
        info!(entries = entries.len(), "all entries are single-line, nothing to split");
        return Ok(summary);
    }

    for entry in multiline {
        match split_entry(store, entry) {
            Ok(created) => {
                info!(base = %entry.base, pieces = created.len(), "split done");
                summary.created.extend(created.into_iter().map(|e| e.base));
            }
            Err(err) => {
                warn!(base = %entry.base, error = %err, "cannot split entry");
                summary.failed.push(entry.base.clone());
            }
        }
    }

    if !summary.failed.is_empty() {
        return Err(CorpusError::SplitFailed {
            failed: summary.failed.len(),
            total: summary.multiline,
        });
    }
    info!(
        split = summary.multiline,
        created = summary.created.len(),
        backup = %summary.backup_dir.display(),
        "multi-line entries split"
    );
    Ok(summary)
}

// `<base>_lineNNN.<ext>` where NNN is at least three digits.
fn is_derived_from(name: &str, base: &str) -> bool {
    let Some(rest) = name.strip_prefix(base).and_then(|rest| rest.strip_prefix("_line")) else {
        return false;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits >= 3 && rest[digits..].starts_with('.')
}

/// Rolls a split back: archived originals return to the corpus root and the
/// single-line entries derived from them are removed. A base is restored as a
/// whole or not at all: when any of its files is taken in the root again, all
/// of them stay in the archive and its derived entries are kept.
pub fn restore(store: &CorpusStore) -> Result<RestoreSummary, CorpusError> {
    let mut by_base: BTreeMap<String, Vec<(PathBuf, PathBuf)>> = BTreeMap::new();
    for archived in store.archived()? {
        let Some(name) = archived.file_name().and_then(|name| name.to_str()).map(str::to_string) else {
            continue;
        };
        let base = match name.strip_suffix(TRANSCRIPT_SUFFIX) {
            Some(base) => base,
            None => name.rsplit_once('.').map_or(name.as_str(), |(base, _)| base),
        };
        let target = store.root().join(&name);
        by_base.entry(base.to_string()).or_default().push((archived, target));
    }

    let mut summary = RestoreSummary::default();
    for (base, files) in by_base {
        if let Some((_, taken)) = files.iter().find(|(_, target)| target.exists()) {
            warn!(base = %base, file = %taken.display(), "not restoring over an existing file");
            summary.kept.push(base);
            continue;
        }
        let root_files = tesseract_lib::fs::list_files(store.root()).map_err(CorpusError::io(store.root()))?;
        for derived in root_files {
            let is_derived = derived.file_name().and_then(|n| n.to_str()).is_some_and(|n| is_derived_from(n, &base));
            if is_derived {
                fs::remove_file(&derived).map_err(CorpusError::io(&derived))?;
                summary.removed.push(derived);
            }
        }
        for (archived, target) in files {
            fs::rename(&archived, &target).map_err(CorpusError::io(&archived))?;
            summary.restored.push(target);
        }
    }
    info!(
        restored = summary.restored.len(),
        removed = summary.removed.len(),
        kept = summary.kept.len(),
        "split rolled back"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{testutil::write_pair, validator::validate};

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        tesseract_lib::fs::list_files(dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn blank_lines_take_a_band_but_give_no_sample() {
        let bands = plan_bands("page", 100, &lines(&["first", "", "third"])).unwrap();
        assert_eq!(
            bands,
            vec![
                Band { line_no: 1, y: 0, height: 33, text: "first".into() },
                Band { line_no: 3, y: 66, height: 33, text: "third".into() },
            ]
        );
    }

    #[test]
    fn empty_transcript_and_tiny_image_are_malformed() {
        assert!(matches!(plan_bands("page", 100, &[]), Err(CorpusError::MalformedEntry { .. })));
        let err = plan_bands("page", 2, &lines(&["a", "b", "c"])).unwrap_err();
        assert!(err.to_string().contains("2 px tall for 3 lines"));
    }

    #[test]
    fn split_writes_bands_and_archives_original() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        write_pair(dir.path(), "page", 31, "first\nsecond\nthird\n");

        let entry = store.entries().unwrap().remove(0);
        let created = split_entry(&store, &entry).unwrap();

        assert_eq!(created.len(), 3);
        let second = ImagePNG::open(&created[1].image).unwrap();
        assert_eq!(second.height(), 10);
        // Row r of the source holds the value r.
        assert_eq!(second.bytes[0], 10);
        assert_eq!(fs::read_to_string(&created[2].transcript).unwrap(), "third\n");
        assert_eq!(created[0].base, "page_line001");

        assert!(!entry.image.exists());
        assert_eq!(file_names(&store.backup_dir()), vec!["page.gt.txt", "page.png"]);
        validate(&store).unwrap();
    }

    #[test]
    fn second_split_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        write_pair(dir.path(), "page", 20, "one\ntwo\n");
        write_pair(dir.path(), "single", 10, "only\n");

        let first = split_corpus(&store, 1).unwrap();
        assert_eq!(first.multiline, 1);
        let after_first = file_names(dir.path());

        let second = split_corpus(&store, 1).unwrap();
        assert_eq!(second.multiline, 0);
        assert!(second.created.is_empty());
        assert_eq!(file_names(dir.path()), after_first);
    }

    #[test]
    fn occupied_backup_slot_leaves_corpus_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        write_pair(dir.path(), "page", 20, "one\ntwo\n");
        fs::create_dir(store.backup_dir()).unwrap();
        fs::write(store.backup_dir().join("page.png"), b"older").unwrap();

        let err = split_corpus(&store, 1).unwrap_err();
        assert!(matches!(err, CorpusError::SplitFailed { failed: 1, total: 1 }));
        assert!(!dir.path().join("page_line001.png").exists());
        assert!(dir.path().join("page.png").exists());
    }

    #[test]
    fn threshold_keeps_short_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        write_pair(dir.path(), "pair", 20, "one\ntwo\n");
        let summary = split_corpus(&store, 2).unwrap();
        assert_eq!(summary.multiline, 0);
        assert!(dir.path().join("pair.png").exists());
    }

    #[test]
    fn restore_undoes_a_split() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        write_pair(dir.path(), "page", 20, "one\ntwo\n");
        write_pair(dir.path(), "page_lineup", 10, "kept\n");
        split_corpus(&store, 1).unwrap();
        fs::write(dir.path().join("page_line001.box"), b"").unwrap();

        let summary = restore(&store).unwrap();
        assert_eq!(summary.restored.len(), 2);
        assert_eq!(summary.removed.len(), 5);
        assert_eq!(
            file_names(dir.path()),
            vec!["page.gt.txt", "page.png", "page_lineup.gt.txt", "page_lineup.png"]
        );
        assert!(store.archived().unwrap().is_empty());
    }

    #[test]
    fn restore_keeps_a_pair_whose_image_came_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        write_pair(dir.path(), "page", 20, "one\ntwo\n");
        write_pair(dir.path(), "other", 20, "three\nfour\n");
        split_corpus(&store, 1).unwrap();
        fs::write(dir.path().join("page.png"), b"newer").unwrap();

        let summary = restore(&store).unwrap();
        assert_eq!(summary.kept, vec!["page".to_string()]);
        assert_eq!(summary.restored.len(), 2);
        assert_eq!(fs::read(dir.path().join("page.png")).unwrap(), b"newer");
        assert!(!dir.path().join("page.gt.txt").exists());
        assert!(dir.path().join("page_line001.png").exists());
        assert!(dir.path().join("page_line002.gt.txt").exists());
        assert!(!dir.path().join("other_line001.png").exists());
        assert_eq!(file_names(&store.backup_dir()), vec!["page.gt.txt", "page.png"]);
    }

    #[test]
    fn derived_names_need_three_digits() {
        assert!(is_derived_from("page_line001.png", "page"));
        assert!(is_derived_from("page_line1234.gt.txt", "page"));
        assert!(!is_derived_from("page_line01.png", "page"));
        assert!(!is_derived_from("page_lineup.png", "page"));
        assert!(!is_derived_from("other_line001.png", "page"));
    }
}
