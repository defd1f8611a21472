use std::{fs, io, path::{Path, PathBuf}};

use crate::engine::with_suffix;

/// Image extensions accepted in a corpus, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext))
}

// Checks whether directory/path exists.
// If `need_create` is true, creates missing directories.
pub fn dir_exists<P: AsRef<Path>>(path: P, need_create: bool) -> io::Result<()> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(());
    }
    if need_create {
        return fs::create_dir_all(path);
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("directory {} is not found", path.display()),
    ))
}

// Returns full paths of the direct file children, sorted by file name.
pub fn list_files<P: AsRef<Path>>(path: P) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Finds the image that belongs to a corpus base path, trying every known
/// extension in lower and upper case.
pub fn find_image(base: &Path) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .flat_map(|ext| [format!(".{ext}"), format!(".{}", ext.to_ascii_uppercase())])
        .map(|ext| with_suffix(base, &ext))
        .find(|candidate| candidate.is_file())
}

/// True when `artifact` exists and no existing `source` was modified after
/// it. Missing sources are ignored.
pub fn is_up_to_date(artifact: &Path, sources: &[&Path]) -> bool {
    let Ok(built) = artifact.metadata().and_then(|meta| meta.modified()) else {
        return false;
    };
    sources
        .iter()
        .filter_map(|source| source.metadata().and_then(|meta| meta.modified()).ok())
        .all(|changed| changed <= built)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn touch(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn artifact_older_than_a_source_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("p1.png");
        let boxes = dir.path().join("p1.box");
        fs::write(&image, b"").unwrap();
        fs::write(&boxes, b"").unwrap();

        touch(&image, 1_000);
        touch(&boxes, 2_000);
        assert!(is_up_to_date(&boxes, &[image.as_path(), dir.path().join("missing.gt.txt").as_path()]));

        touch(&image, 3_000);
        assert!(!is_up_to_date(&boxes, &[image.as_path()]));
        assert!(!is_up_to_date(&dir.path().join("p1.lstmf"), &[image.as_path()]));
    }

    #[test]
    fn list_files_skips_directories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.png"), b"").unwrap();
        fs::write(dir.path().join("a.gt.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("multiline_originals")).unwrap();

        let names: Vec<String> = list_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.gt.txt", "b.png"]);
    }

    #[test]
    fn find_image_accepts_upper_case_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scan.JPG"), b"").unwrap();
        assert_eq!(find_image(&dir.path().join("scan")), Some(dir.path().join("scan.JPG")));
        assert_eq!(find_image(&dir.path().join("other")), None);
    }

    #[test]
    fn dir_exists_creates_only_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("checkpoints/run");
        assert!(dir_exists(&nested, false).is_err());
        dir_exists(&nested, true).unwrap();
        assert!(nested.is_dir());
    }
}
