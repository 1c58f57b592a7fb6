//! Scene-text model runtime: the seams the orchestrator talks to, plus the
//! ONNX/MGP-STR implementation behind them.

mod onnx;
mod processor;
mod provider;
mod vocab;

use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use ndarray::{Array3, Array4};

use crate::error::RecognitionError;
use crate::hub::RemoteFile;

pub use provider::HubProvider;

/// Normalised NCHW pixel batch fed to the model.
#[derive(Debug, Clone)]
pub struct PixelBatch(pub Array4<f32>);

/// Raw `[batch, steps, vocab]` outputs of the three recognition heads.
#[derive(Debug, Clone)]
pub struct HeadLogits {
    pub char: Array3<f32>,
    pub bpe: Option<Array3<f32>>,
    pub wp: Option<Array3<f32>>,
}

/// Decoded text of one batch item with the confidence of the head that won.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    pub score: f32,
}

pub trait TextModel: Send + Sync {
    fn infer(&self, batch: &PixelBatch) -> Result<HeadLogits, RecognitionError>;
}

pub trait TextProcessor: Send + Sync {
    fn preprocess(&self, image: &DynamicImage) -> Result<PixelBatch, RecognitionError>;

    fn batch_decode(&self, logits: &HeadLogits) -> Result<Vec<Decoded>, RecognitionError>;
}

/// Source of model and processor handles. Loading is CPU-heavy; call from a blocking context.
pub trait ModelProvider: Send + Sync {
    /// Files that have to be downloaded before `load_model`/`load_processor` can succeed.
    fn missing_files(&self, model_id: &str) -> Vec<RemoteFile>;

    fn load_model(&self, model_id: &str) -> Result<Arc<dyn TextModel>, RecognitionError>;

    fn load_processor(&self, model_id: &str) -> Result<Arc<dyn TextProcessor>, RecognitionError>;
}

/// Model and processor loaded once and shared by every recognition request.
pub struct RecognitionContext {
    pub model_id: String,
    pub model: Arc<dyn TextModel>,
    pub processor: Arc<dyn TextProcessor>,
}

impl RecognitionContext {
    pub fn load(provider: &dyn ModelProvider, model_id: &str) -> Result<Self, RecognitionError> {
        let model = provider.load_model(model_id)?;
        let processor = provider.load_processor(model_id)?;
        Ok(Self {
            model_id: model_id.to_string(),
            model,
            processor,
        })
    }
}

impl fmt::Debug for RecognitionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionContext")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}
