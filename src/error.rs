use thiserror::Error;

/// Failures of model loading and of a single recognition request.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("model is not ready yet")]
    NotReady,
    #[error("failed to load model '{model_id}': {message}")]
    ModelLoad { model_id: String, message: String },
    #[error("failed to download {url}: {message}")]
    Download { url: String, message: String },
    #[error("could not read image: {0}")]
    ImageDecode(String),
    #[error("preprocessing failed: {0}")]
    Preprocess(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("decoding failed: {0}")]
    Decode(String),
}

impl RecognitionError {
    pub fn model_load(model_id: &str, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model_id: model_id.to_string(),
            message: message.into(),
        }
    }
}
