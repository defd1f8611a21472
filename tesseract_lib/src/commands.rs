//! Tesseract CLI wrappers for box extraction, model assembly, LSTM training
//! and inference.
//!
//! Executables are resolved under an optional tool directory (the install
//! folder on Windows, usually nothing on Unix where they live on `PATH`).

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tracing::{debug, info};

use crate::{
    engine::{ContinueFrom, Engine, TrainRequest, with_suffix},
    error::EngineError,
    fs::{find_image, is_up_to_date},
};

const TESSERACT: &str = "tesseract";
const UNICHARSET_EXTRACTOR: &str = "unicharset_extractor";
const COMBINE_LANG_MODEL: &str = "combine_lang_model";
const COMBINE_TESSDATA: &str = "combine_tessdata";
const LSTMTRAINING: &str = "lstmtraining";

const REQUIRED_TOOLS: [&str; 5] = [TESSERACT, UNICHARSET_EXTRACTOR, COMBINE_LANG_MODEL, COMBINE_TESSDATA, LSTMTRAINING];

/// [`Engine`] backed by the Tesseract executables.
#[derive(Clone, Debug, Default)]
pub struct TesseractEngine {
    tool_dir: Option<PathBuf>,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractEngine {
    pub fn new(tool_dir: Option<PathBuf>, tessdata_dir: Option<PathBuf>) -> Self {
        Self { tool_dir, tessdata_dir }
    }

    fn tool_path(&self, tool: &str) -> PathBuf {
        let exe = format!("{tool}{}", std::env::consts::EXE_SUFFIX);
        match &self.tool_dir {
            Some(dir) => dir.join(exe),
            None => PathBuf::from(exe),
        }
    }

    fn command(&self, tool: &str) -> Command {
        Command::new(self.tool_path(tool))
    }

    fn with_tessdata(&self, command: &mut Command) {
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
    }

    // Runs a prepared command and turns launch problems and non-zero exits
    // into errors carrying the tail of stderr.
    fn run(&self, tool: &'static str, mut command: Command) -> Result<Output, EngineError> {
        debug!(?command, "running {tool}");
        let output = command.output().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                EngineError::ToolMissing { tool, path: self.tool_path(tool) }
            } else {
                EngineError::Launch { tool, source }
            }
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(EngineError::Failed {
                tool,
                status: output.status.to_string(),
                stderr: tail.into_iter().rev().collect::<Vec<_>>().join(" | "),
            });
        }
        Ok(output)
    }

    // Generates `<base>.lstmf` next to the sample image unless one newer than
    // the image, box file and transcript is already there.
    fn make_lstmf(&self, base: &Path, psm: u8) -> Result<PathBuf, EngineError> {
        let lstmf = with_suffix(base, ".lstmf");
        let image = find_image(base);
        let box_file = with_suffix(base, ".box");
        let transcript = with_suffix(base, ".gt.txt");
        let mut sources = vec![box_file.as_path(), transcript.as_path()];
        sources.extend(image.as_deref());
        if is_up_to_date(&lstmf, &sources) {
            return Ok(lstmf);
        }
        let image = image.ok_or_else(|| EngineError::MissingImage { base: base.to_path_buf() })?;
        let mut command = self.command(TESSERACT);
        command.arg(&image).arg(base);
        self.with_tessdata(&mut command);
        command.arg("--psm").arg(psm.to_string()).arg("lstm.train");
        self.run(TESSERACT, command)?;
        Ok(lstmf)
    }

    /// Turns the base-path manifest into the `.lstmf` list `lstmtraining`
    /// reads, creating missing samples on the way.
    pub fn prepare_listfile(&self, manifest: &Path, psm: u8) -> Result<PathBuf, EngineError> {
        let contents = fs::read_to_string(manifest).map_err(EngineError::io(manifest))?;
        let listfile = manifest.with_extension("lstmf.txt");
        let file = fs::File::create(&listfile).map_err(EngineError::io(&listfile))?;
        let mut writer = BufWriter::new(file);
        for base in contents.lines().filter(|line| !line.trim().is_empty()) {
            let lstmf = self.make_lstmf(Path::new(base.trim()), psm)?;
            writeln!(writer, "{}", lstmf.display()).map_err(EngineError::io(&listfile))?;
        }
        writer.flush().map_err(EngineError::io(&listfile))?;
        Ok(listfile)
    }

    // `lstmtraining` continues from `.lstm` weights; a pretrained
    // `.traineddata` has them extracted once next to the checkpoints.
    fn pretrained_lstm(&self, pretrained: &Path, model_output: &Path) -> Result<PathBuf, EngineError> {
        let is_traineddata = pretrained.extension().is_some_and(|ext| ext == "traineddata");
        if !is_traineddata {
            return Ok(pretrained.to_path_buf());
        }
        let stem = pretrained.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let dir = model_output.parent().unwrap_or(Path::new("."));
        let lstm = dir.join(format!("{stem}.lstm"));
        if !lstm.exists() {
            let mut command = self.command(COMBINE_TESSDATA);
            command.arg("-e").arg(pretrained).arg(&lstm);
            self.run(COMBINE_TESSDATA, command)?;
        }
        Ok(lstm)
    }
}

impl Engine for TesseractEngine {
    fn check_available(&self) -> Result<(), EngineError> {
        for tool in REQUIRED_TOOLS {
            // Only a missing executable matters here; some of the tools
            // exit non-zero on `--version`.
            let mut command = self.command(tool);
            command.arg("--version");
            match self.run(tool, command) {
                Ok(_) | Err(EngineError::Failed { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn extract_boxes(&self, image: &Path, out_base: &Path, psm: u8) -> Result<PathBuf, EngineError> {
        let mut command = self.command(TESSERACT);
        command.arg(image).arg(out_base);
        self.with_tessdata(&mut command);
        command.arg("--psm").arg(psm.to_string()).arg("lstmbox");
        self.run(TESSERACT, command)?;
        Ok(with_suffix(out_base, ".box"))
    }

    fn build_inventory(&self, box_files: &[PathBuf], output: &Path) -> Result<(), EngineError> {
        let mut command = self.command(UNICHARSET_EXTRACTOR);
        command.arg("--output_unicharset").arg(output).arg("--norm_mode").arg("2");
        command.args(box_files);
        self.run(UNICHARSET_EXTRACTOR, command)?;
        Ok(())
    }

    fn build_seed_model(&self, inventory: &Path, script_dir: &Path, name: &str, output_dir: &Path) -> Result<(), EngineError> {
        let mut command = self.command(COMBINE_LANG_MODEL);
        command
            .arg("--input_unicharset")
            .arg(inventory)
            .arg("--script_dir")
            .arg(script_dir)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--lang")
            .arg(name);
        // Optional dictionaries from the script data directory.
        for (flag, ext) in [("--words", "wordlist"), ("--numbers", "numbers"), ("--puncs", "punc")] {
            let path = script_dir.join(format!("{name}.{ext}"));
            if path.is_file() {
                command.arg(flag).arg(path);
            }
        }
        self.run(COMBINE_LANG_MODEL, command)?;
        Ok(())
    }

    fn train(&self, request: &TrainRequest) -> Result<(), EngineError> {
        let listfile = self.prepare_listfile(&request.manifest, request.psm)?;
        let mut command = self.command(LSTMTRAINING);
        command
            .arg("--model_output")
            .arg(&request.model_output)
            .arg("--traineddata")
            .arg(&request.seed_model)
            .arg("--train_listfile")
            .arg(&listfile)
            .arg("--max_iterations")
            .arg(request.max_iterations.to_string());
        match &request.continue_from {
            ContinueFrom::Checkpoint(checkpoint) => {
                command.arg("--continue_from").arg(checkpoint);
            }
            ContinueFrom::Pretrained(pretrained) => {
                let lstm = self.pretrained_lstm(pretrained, &request.model_output)?;
                command.arg("--continue_from").arg(lstm);
                if pretrained.extension().is_some_and(|ext| ext == "traineddata") {
                    command.arg("--old_traineddata").arg(pretrained);
                }
            }
            ContinueFrom::Scratch { net_spec } => {
                command.arg("--net_spec").arg(net_spec);
            }
        }
        info!(max_iterations = request.max_iterations, "lstmtraining started");
        self.run(LSTMTRAINING, command)?;
        Ok(())
    }

    fn finalize(&self, checkpoint: &Path, seed_model: &Path, output: &Path) -> Result<(), EngineError> {
        let mut command = self.command(LSTMTRAINING);
        command
            .arg("--stop_training")
            .arg("--continue_from")
            .arg(checkpoint)
            .arg("--traineddata")
            .arg(seed_model)
            .arg("--model_output")
            .arg(output);
        self.run(LSTMTRAINING, command)?;
        Ok(())
    }

    fn infer(&self, model_dir: &Path, name: &str, image: &Path, psm: u8) -> Result<String, EngineError> {
        let mut command = self.command(TESSERACT);
        command
            .arg(image)
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(model_dir)
            .arg("-l")
            .arg(name)
            .arg("--psm")
            .arg(psm.to_string());
        let output = self.run(TESSERACT, command)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
