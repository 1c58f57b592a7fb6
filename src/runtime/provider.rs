use std::path::PathBuf;
use std::sync::Arc;

use super::onnx::OnnxTextModel;
use super::processor::{MgpstrProcessor, PreprocessorConfig};
use super::vocab::{BpeVocab, CharVocab, WordPieceVocab};
use super::{ModelProvider, TextModel, TextProcessor};
use crate::config::Config;
use crate::error::RecognitionError;
use crate::hub::{self, RemoteFile};

const PREPROCESSOR_FILE: &str = "preprocessor_config.json";
const CHAR_VOCAB_FILE: &str = "vocab.json";
const BPE_VOCAB_FILE: &str = "vocab.json";
const WP_VOCAB_FILE: &str = "vocab.txt";

/// Loads MGP-STR from the local hub cache.
#[derive(Debug, Clone)]
pub struct HubProvider {
    root: PathBuf,
    onnx_file: &'static str,
    bpe_vocab_repo: String,
    wp_vocab_repo: String,
    intra_threads: i16,
}

impl HubProvider {
    pub fn new(config: &Config) -> Self {
        Self::with_root(hub::models_dir(), config)
    }

    pub fn with_root(root: PathBuf, config: &Config) -> Self {
        Self {
            root,
            onnx_file: config.onnx_file(),
            bpe_vocab_repo: config.bpe_vocab_repo.clone(),
            wp_vocab_repo: config.wp_vocab_repo.clone(),
            intra_threads: config.intra_threads,
        }
    }

    fn files(&self, model_id: &str) -> Vec<RemoteFile> {
        vec![
            hub::remote_file(&self.root, model_id, self.onnx_file),
            hub::remote_file(&self.root, model_id, PREPROCESSOR_FILE),
            hub::remote_file(&self.root, model_id, CHAR_VOCAB_FILE),
            hub::remote_file(&self.root, &self.bpe_vocab_repo, BPE_VOCAB_FILE).optional(),
            hub::remote_file(&self.root, &self.wp_vocab_repo, WP_VOCAB_FILE).optional(),
        ]
    }

    fn local(&self, repo: &str, file: &str) -> PathBuf {
        hub::repo_dir(&self.root, repo).join(file)
    }
}

impl ModelProvider for HubProvider {
    fn missing_files(&self, model_id: &str) -> Vec<RemoteFile> {
        self.files(model_id)
            .into_iter()
            .filter(|f| !f.path.exists())
            .collect()
    }

    fn load_model(&self, model_id: &str) -> Result<Arc<dyn TextModel>, RecognitionError> {
        let path = self.local(model_id, self.onnx_file);
        let model = OnnxTextModel::from_file(&path, model_id, self.intra_threads)?;
        Ok(Arc::new(model))
    }

    fn load_processor(&self, model_id: &str) -> Result<Arc<dyn TextProcessor>, RecognitionError> {
        let as_load_err = |e: RecognitionError| RecognitionError::model_load(model_id, e.to_string());

        let config = PreprocessorConfig::from_file(&self.local(model_id, PREPROCESSOR_FILE))
            .map_err(as_load_err)?;
        let char_vocab =
            CharVocab::from_file(&self.local(model_id, CHAR_VOCAB_FILE)).map_err(as_load_err)?;

        // The subword heads only improve the result; a broken vocab disables the head.
        let bpe_vocab = BpeVocab::from_file(&self.local(&self.bpe_vocab_repo, BPE_VOCAB_FILE))
            .map_err(|e| log::warn!("bpe head disabled: {e}"))
            .ok();
        let wp_vocab = WordPieceVocab::from_file(&self.local(&self.wp_vocab_repo, WP_VOCAB_FILE))
            .map_err(|e| log::warn!("wordpiece head disabled: {e}"))
            .ok();

        Ok(Arc::new(MgpstrProcessor::new(
            config, char_vocab, bpe_vocab, wp_vocab,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn provider(root: &std::path::Path) -> HubProvider {
        HubProvider::with_root(root.to_path_buf(), &Config::default())
    }

    #[test]
    fn everything_missing_in_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let missing = provider(dir.path()).missing_files("acme/str");
        assert_eq!(missing.len(), 5);
        assert!(missing[0].url.ends_with("acme/str/resolve/main/onnx/model_quantized.onnx"));
        assert!(missing[3].url.contains("openai-community/gpt2"));
    }

    #[test]
    fn only_subword_vocabs_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let optional: Vec<bool> = provider(dir.path())
            .missing_files("acme/str")
            .iter()
            .map(|f| f.optional)
            .collect();
        assert_eq!(optional, [false, false, false, true, true]);
    }

    #[test]
    fn cached_files_are_not_requested_again() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let cached = provider.local("acme/str", PREPROCESSOR_FILE);
        fs::create_dir_all(cached.parent().unwrap()).unwrap();
        fs::write(&cached, "{}").unwrap();
        let missing = provider.missing_files("acme/str");
        assert_eq!(missing.len(), 4);
        assert!(missing.iter().all(|f| f.path != cached));
    }

    #[test]
    fn processor_loads_without_subword_vocabs() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(dir.path());
        let repo = hub::repo_dir(dir.path(), "acme/str");
        fs::create_dir_all(&repo).unwrap();
        fs::write(repo.join(PREPROCESSOR_FILE), r#"{"size": {"height": 32, "width": 128}}"#).unwrap();
        fs::write(repo.join(CHAR_VOCAB_FILE), r#"{"[GO]": 0, "[s]": 1, "a": 2}"#).unwrap();
        assert!(provider.load_processor("acme/str").is_ok());
    }

    #[test]
    fn processor_without_char_vocab_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = provider(dir.path()).load_processor("acme/str").err().unwrap();
        assert!(matches!(err, RecognitionError::ModelLoad { .. }));
    }
}
