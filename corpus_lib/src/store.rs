//! Path conventions of a corpus directory and the single asset-discovery
//! routine every stage goes through.
//!
//! ```text
//! <root>/<base>.<png|jpg|jpeg|tif|tiff>   image
//! <root>/<base>.gt.txt                    transcript
//! <root>/<base>.box                       character boxes
//! <root>/unicharset                       symbol inventory
//! <root>/list.txt                         sample manifest
//! <root>/seed/<model>/<model>.traineddata seed model
//! <root>/checkpoints/                     training checkpoints + state
//! <root>/<model>.traineddata              final model
//! <root>/multiline_originals/             archived multi-line originals
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tesseract_lib::{
    engine::with_suffix,
    fs::{dir_exists, is_image_extension, list_files},
};
use tracing::{debug, warn};

use crate::{entry::CorpusEntry, error::CorpusError};

pub const TRANSCRIPT_SUFFIX: &str = ".gt.txt";
pub const BACKUP_DIR: &str = "multiline_originals";
pub const INVENTORY_FILE: &str = "unicharset";
pub const MANIFEST_FILE: &str = "list.txt";
pub const HISTORY_FILE: &str = "pipeline_history.csv";

/// Files of the corpus root grouped by base name.
#[derive(Debug, Default)]
pub struct Scan {
    /// More than one path for a base means the same base exists under two
    /// image extensions.
    pub images: BTreeMap<String, Vec<PathBuf>>,
    pub transcripts: BTreeMap<String, PathBuf>,
}

enum Asset<'a> {
    Image(&'a str),
    Transcript(&'a str),
}

fn classify(name: &str) -> Option<Asset<'_>> {
    if let Some(base) = name.strip_suffix(TRANSCRIPT_SUFFIX) {
        return (!base.is_empty()).then_some(Asset::Transcript(base));
    }
    let (base, ext) = name.rsplit_once('.')?;
    (!base.is_empty() && is_image_extension(ext)).then_some(Asset::Image(base))
}

#[derive(Clone, Debug)]
pub struct CorpusStore {
    root: PathBuf,
}

impl CorpusStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens an existing corpus directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CorpusError> {
        let root = root.into();
        dir_exists(&root, false).map_err(CorpusError::io(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_path(&self, base: &str) -> PathBuf {
        self.root.join(base)
    }

    pub fn transcript_path(&self, base: &str) -> PathBuf {
        with_suffix(&self.base_path(base), TRANSCRIPT_SUFFIX)
    }

    pub fn box_path(&self, base: &str) -> PathBuf {
        with_suffix(&self.base_path(base), ".box")
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.root.join(INVENTORY_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn seed_dir(&self) -> PathBuf {
        self.root.join("seed")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    /// Prefix handed to the trainer as `--model_output`.
    pub fn model_output(&self, model: &str) -> PathBuf {
        self.checkpoint_dir().join(model)
    }

    pub fn training_state_path(&self) -> PathBuf {
        self.checkpoint_dir().join("training_state.json")
    }

    pub fn final_model_path(&self, model: &str) -> PathBuf {
        self.root.join(format!("{model}.traineddata"))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Groups the direct children of the root into images and transcripts.
    /// Subdirectories and derived artifacts are ignored.
    pub fn scan(&self) -> Result<Scan, CorpusError> {
        let mut scan = Scan::default();
        for path in list_files(&self.root).map_err(CorpusError::io(&self.root))? {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                warn!(path = %path.display(), "skipping file with a non UTF-8 name");
                continue;
            };
            match classify(name) {
                Some(Asset::Image(base)) => scan.images.entry(base.to_string()).or_default().push(path.clone()),
                Some(Asset::Transcript(base)) => {
                    scan.transcripts.insert(base.to_string(), path.clone());
                }
                None => {}
            }
        }
        debug!(images = scan.images.len(), transcripts = scan.transcripts.len(), "corpus scanned");
        Ok(scan)
    }

    /// Paired entries sorted by base name. Unpaired files are left to the
    /// validator to report.
    pub fn entries(&self) -> Result<Vec<CorpusEntry>, CorpusError> {
        let scan = self.scan()?;
        scan.images
            .into_iter()
            .filter_map(|(base, images)| {
                let transcript = scan.transcripts.get(&base)?.clone();
                let image = images.into_iter().next()?;
                Some((base, image, transcript))
            })
            .map(|(base, image, transcript)| CorpusEntry::load(base, image, transcript))
            .collect()
    }

    /// Moves a corpus file into the backup directory and returns its new path.
    /// An existing backup with the same name is never replaced.
    pub fn archive(&self, path: &Path) -> Result<PathBuf, CorpusError> {
        let backup_dir = self.backup_dir();
        dir_exists(&backup_dir, true).map_err(CorpusError::io(&backup_dir))?;
        let name = path.file_name().ok_or_else(|| CorpusError::MalformedEntry {
            base: path.display().to_string(),
            reason: "path has no file name".to_string(),
        })?;
        let target = backup_dir.join(name);
        if target.exists() {
            return Err(CorpusError::BackupExists(target));
        }
        fs::rename(path, &target).map_err(CorpusError::io(path))?;
        debug!(from = %path.display(), to = %target.display(), "archived");
        Ok(target)
    }

    /// Files currently held in the backup directory.
    pub fn archived(&self) -> Result<Vec<PathBuf>, CorpusError> {
        let backup_dir = self.backup_dir();
        if !backup_dir.is_dir() {
            return Ok(Vec::new());
        }
        list_files(&backup_dir).map_err(CorpusError::io(&backup_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_pair;

    #[test]
    fn scan_groups_by_base_and_ignores_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_pair(root, "alpha", 4, "a\n");
        fs::write(root.join("beta.TIF"), b"").unwrap();
        fs::write(root.join("alpha.box"), b"").unwrap();
        fs::write(root.join("unicharset"), b"").unwrap();
        fs::write(root.join("gamma.gt.txt"), b"g\n").unwrap();

        let scan = CorpusStore::new(root).scan().unwrap();
        assert_eq!(scan.images.keys().collect::<Vec<_>>(), vec!["alpha", "beta"]);
        assert_eq!(scan.transcripts.keys().collect::<Vec<_>>(), vec!["alpha", "gamma"]);
    }

    #[test]
    fn entries_are_paired_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "b", 4, "bee\n");
        write_pair(dir.path(), "a", 4, "ay\n");
        fs::write(dir.path().join("orphan.png"), b"").unwrap();

        let entries = CorpusStore::new(dir.path()).entries().unwrap();
        let bases: Vec<&str> = entries.iter().map(|e| e.base.as_str()).collect();
        assert_eq!(bases, vec!["a", "b"]);
        assert_eq!(entries[0].lines, vec!["ay"]);
    }

    #[test]
    fn archive_moves_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path());
        let original = dir.path().join("page.gt.txt");
        fs::write(&original, "one\ntwo\n").unwrap();

        let target = store.archive(&original).unwrap();
        assert!(!original.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "one\ntwo\n");
        assert_eq!(store.archived().unwrap(), vec![target.clone()]);

        fs::write(&original, "newer\n").unwrap();
        assert!(matches!(store.archive(&original), Err(CorpusError::BackupExists(_))));
        assert!(original.exists());
    }

    #[test]
    fn open_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CorpusStore::open(dir.path().join("missing")).is_err());
        assert!(CorpusStore::open(dir.path()).is_ok());
    }
}
