//! Deterministic in-process engine for stage tests.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use corpus_lib::CorpusStore;
use images::{
    ImagePNG,
    png::base::{BitDepthPNG, ColorTypePNG},
};
use tesseract_lib::{
    Engine, EngineError, TrainRequest,
    boxfile::read_symbols,
    engine::with_suffix,
};

#[derive(Debug, Default)]
pub struct FakeEngine {
    /// Bases whose box extraction fails.
    pub failing_bases: Vec<String>,
    pub missing_tool: Option<&'static str>,
    /// Seed build "succeeds" without writing the seed model.
    pub silent_seed: bool,
    pub failing_finalize: bool,
    /// Seed build and finalize write their artifact, then report failure.
    pub failing_after_write: bool,
    pub calls: Mutex<Vec<&'static str>>,
    pub train_requests: Mutex<Vec<TrainRequest>>,
}

impl FakeEngine {
    fn note(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls_to(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn last_request(&self) -> Option<TrainRequest> {
        self.train_requests.lock().unwrap().last().cloned()
    }
}

fn failed(tool: &'static str) -> EngineError {
    EngineError::Failed { tool, status: "exit status: 1".into(), stderr: "fake failure".into() }
}

impl Engine for FakeEngine {
    fn check_available(&self) -> Result<(), EngineError> {
        self.note("check_available");
        match self.missing_tool {
            Some(tool) => Err(EngineError::ToolMissing { tool, path: PathBuf::from(tool) }),
            None => Ok(()),
        }
    }

    fn extract_boxes(&self, _image: &Path, out_base: &Path, _psm: u8) -> Result<PathBuf, EngineError> {
        self.note("extract_boxes");
        let base = out_base.file_name().unwrap().to_string_lossy().into_owned();
        if self.failing_bases.contains(&base) {
            return Err(failed("tesseract"));
        }
        let text = fs::read_to_string(with_suffix(out_base, ".gt.txt")).unwrap();
        let body: String = text
            .trim()
            .chars()
            .enumerate()
            .map(|(i, c)| format!("{c} {i} 0 {} 10 0\n", i + 1))
            .collect();
        let path = with_suffix(out_base, ".box");
        fs::write(&path, body).unwrap();
        Ok(path)
    }

    fn build_inventory(&self, box_files: &[PathBuf], output: &Path) -> Result<(), EngineError> {
        self.note("build_inventory");
        let mut symbols = BTreeSet::new();
        for path in box_files {
            symbols.extend(read_symbols(path)?);
        }
        let body: Vec<String> = symbols.into_iter().collect();
        fs::write(output, body.join("\n")).unwrap();
        Ok(())
    }

    fn build_seed_model(&self, _inventory: &Path, _script_dir: &Path, name: &str, output_dir: &Path) -> Result<(), EngineError> {
        self.note("build_seed_model");
        if self.silent_seed {
            return Ok(());
        }
        let seed = self.seed_model_path(output_dir, name);
        fs::create_dir_all(seed.parent().unwrap()).unwrap();
        fs::write(seed, "seed").unwrap();
        if self.failing_after_write {
            return Err(failed("combine_lang_model"));
        }
        Ok(())
    }

    fn train(&self, request: &TrainRequest) -> Result<(), EngineError> {
        self.note("train");
        assert!(request.seed_model.is_file());
        self.train_requests.lock().unwrap().push(request.clone());
        let checkpoint = self.checkpoint_path(&request.model_output);
        fs::write(checkpoint, format!("iterations={}", request.max_iterations)).unwrap();
        Ok(())
    }

    fn finalize(&self, checkpoint: &Path, _seed_model: &Path, output: &Path) -> Result<(), EngineError> {
        self.note("finalize");
        if self.failing_finalize {
            return Err(failed("lstmtraining"));
        }
        fs::copy(checkpoint, output).unwrap();
        if self.failing_after_write {
            return Err(failed("lstmtraining"));
        }
        Ok(())
    }

    fn infer(&self, model_dir: &Path, name: &str, image: &Path, _psm: u8) -> Result<String, EngineError> {
        self.note("infer");
        assert!(model_dir.join(format!("{name}.traineddata")).is_file());
        let transcript = with_suffix(&image.with_extension(""), ".gt.txt");
        Ok(fs::read_to_string(transcript).unwrap_or_else(|_| "recognized".into()))
    }
}

/// Corpus of single-line pairs with tiny grayscale images.
pub fn corpus_with(pairs: &[(&str, &str)]) -> (tempfile::TempDir, CorpusStore) {
    let dir = tempfile::tempdir().unwrap();
    for (base, text) in pairs {
        write_sample(dir.path(), base, 8, &format!("{text}\n"));
    }
    let store = CorpusStore::new(dir.path());
    (dir, store)
}

pub fn write_sample(root: &Path, base: &str, height: u32, transcript: &str) {
    let bytes = vec![255u8; 16 * height as usize];
    ImagePNG::new(bytes, 16, height, ColorTypePNG::Grayscale, BitDepthPNG::Eight)
        .write(&root.join(format!("{base}.png")))
        .unwrap();
    fs::write(root.join(format!("{base}.gt.txt")), transcript).unwrap();
}
