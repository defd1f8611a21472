use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config {path} is not valid JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one pipeline run. Resolved once, then passed by reference to
/// every stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory with `<base>.<image>` / `<base>.gt.txt` pairs.
    pub corpus_root: PathBuf,
    /// Name of the produced model (`<model_name>.traineddata`).
    pub model_name: String,
    /// Pretrained `.traineddata` or `.lstm` to fine-tune.
    pub base_model: Option<PathBuf>,
    /// VGSL network spec used when training from scratch.
    pub net_spec: Option<String>,
    pub max_iterations: u32,
    /// Page segmentation mode passed to every recognition call.
    pub psm: u8,
    /// Entries with more non-empty transcript lines than this are split.
    pub split_threshold: usize,
    /// Script and language data for building the seed model.
    pub script_dir: PathBuf,
    pub tool_dir: Option<PathBuf>,
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus_root: PathBuf::from("data/ground-truth"),
            model_name: "custom".to_string(),
            base_model: None,
            net_spec: None,
            max_iterations: 10_000,
            psm: 13,
            split_threshold: 1,
            script_dir: PathBuf::from("data/langdata"),
            tool_dir: None,
            tessdata_dir: None,
        }
    }
}

impl PipelineConfig {
    // Reads config JSON from disk; absent keys keep their defaults.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    // Saves the full configuration as pretty-formatted JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.model_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("model name is empty".to_string()));
        }
        // The name becomes a file name and a `-l` argument.
        if name.contains(['/', '\\', '+', ' ']) {
            return Err(ConfigError::Invalid(format!("model name `{name}` must be a plain file name")));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be positive".to_string()));
        }
        if self.split_threshold == 0 {
            return Err(ConfigError::Invalid("split_threshold must be at least 1".to_string()));
        }
        if self.psm > 13 {
            return Err(ConfigError::Invalid(format!("page segmentation mode {} is out of range 0..=13", self.psm)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "model_name": "receipts", "max_iterations": 400 }"#).unwrap();

        let config = PipelineConfig::read(&path).unwrap();
        assert_eq!(config.model_name, "receipts");
        assert_eq!(config.max_iterations, 400);
        assert_eq!(config.split_threshold, 1);
        assert_eq!(config.psm, 13);
    }

    #[test]
    fn saved_config_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = PipelineConfig {
            base_model: Some(PathBuf::from("tessdata/eng.traineddata")),
            ..PipelineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::read(&path).unwrap(), config);
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let bad_name = PipelineConfig { model_name: "eng+custom".into(), ..Default::default() };
        assert!(bad_name.validate().is_err());
        let no_iterations = PipelineConfig { max_iterations: 0, ..Default::default() };
        assert!(no_iterations.validate().is_err());
        let zero_threshold = PipelineConfig { split_threshold: 0, ..Default::default() };
        assert!(zero_threshold.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn broken_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ model_name: ").unwrap();
        assert!(matches!(PipelineConfig::read(&path), Err(ConfigError::Parse { .. })));
    }
}
