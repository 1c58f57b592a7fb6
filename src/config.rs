use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_ID: &str = "onnx-community/mgp-str-base";

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hugging Face repository holding the exported MGP-STR model.
    pub model_id: String,
    /// Use `onnx/model_quantized.onnx` instead of `onnx/model.onnx`.
    pub quantized: bool,
    /// Repository providing the GPT-2 `vocab.json` for the bpe head.
    pub bpe_vocab_repo: String,
    /// Repository providing the BERT `vocab.txt` for the wordpiece head.
    pub wp_vocab_repo: String,
    /// ONNX Runtime intra-op threads, 0 lets the runtime decide.
    pub intra_threads: i16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.into(),
            quantized: true,
            bpe_vocab_repo: "openai-community/gpt2".into(),
            wp_vocab_repo: "google-bert/bert-base-uncased".into(),
            intra_threads: 0,
        }
    }
}

impl Config {
    /// Directory: ~/.config/scene-text-reader/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("scene-text-reader");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::path())
    }

    fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Path of the ONNX graph inside the model repository.
    pub fn onnx_file(&self) -> &'static str {
        if self.quantized {
            "onnx/model_quantized.onnx"
        } else {
            "onnx/model.onnx"
        }
    }
}
