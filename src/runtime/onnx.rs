use std::path::Path;
use std::sync::Arc;

use ndarray::{Array3, CowArray, Ix3, IxDyn};
use ort::environment::Environment;
use ort::error::OrtError;
use ort::session::{Session, SessionBuilder};
use ort::value::Value;

use super::{HeadLogits, PixelBatch, TextModel};
use crate::error::RecognitionError;

const HEADS: [&str; 3] = ["char_logits", "bpe_logits", "wp_logits"];

/// MGP-STR exported to ONNX: `pixel_values -> (char_logits, bpe_logits, wp_logits)`.
#[derive(Debug)]
pub struct OnnxTextModel {
    _environment: Arc<Environment>,
    session: Session,
    /// Output slot of each head in `HEADS` order.
    slots: [Option<usize>; 3],
}

impl OnnxTextModel {
    pub fn from_file(path: &Path, model_id: &str, intra_threads: i16) -> Result<Self, RecognitionError> {
        if !path.exists() {
            return Err(RecognitionError::model_load(
                model_id,
                format!("onnx model file '{}' does not exist", path.display()),
            ));
        }

        let load_err = |e: OrtError| RecognitionError::model_load(model_id, e.to_string());
        let environment = Arc::new(
            Environment::builder()
                .with_name("scene-text-reader")
                .build()
                .map_err(load_err)?,
        );
        let mut builder = SessionBuilder::new(&environment).map_err(load_err)?;
        if intra_threads > 0 {
            builder = builder.with_intra_threads(intra_threads).map_err(load_err)?;
        }
        let session = builder.with_model_from_file(path).map_err(load_err)?;

        let names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let slots = resolve_slots(&names);
        if slots[0].is_none() {
            return Err(RecognitionError::model_load(model_id, "model has no outputs"));
        }
        log::info!("Loaded {} with outputs {names:?}", path.display());

        Ok(Self {
            _environment: environment,
            session,
            slots,
        })
    }
}

/// Match head outputs by name, falling back to position when the export uses other names.
fn resolve_slots(names: &[&str]) -> [Option<usize>; 3] {
    let by_name = HEADS.map(|head| names.iter().position(|n| *n == head));
    if by_name[0].is_some() {
        return by_name;
    }
    [0, 1, 2].map(|i| (i < names.len()).then_some(i))
}

impl TextModel for OnnxTextModel {
    fn infer(&self, batch: &PixelBatch) -> Result<HeadLogits, RecognitionError> {
        let infer_err = |e: OrtError| RecognitionError::Inference(e.to_string());

        let input: CowArray<'_, f32, IxDyn> = CowArray::from(batch.0.view().into_dyn());
        let tensor = Value::from_array(self.session.allocator(), &input).map_err(infer_err)?;
        let outputs = self.session.run(vec![tensor]).map_err(infer_err)?;

        let mut heads: [Option<Array3<f32>>; 3] = [None, None, None];
        for (head, slot) in heads.iter_mut().zip(self.slots) {
            let Some(slot) = slot else { continue };
            let value = outputs
                .get(slot)
                .ok_or_else(|| RecognitionError::Inference(format!("missing output {slot}")))?;
            let tensor = value.try_extract::<f32>().map_err(infer_err)?;
            let view = tensor.view();
            log::debug!("Output {slot} shape {:?}", view.shape());
            let logits = view
                .to_owned()
                .into_dimensionality::<Ix3>()
                .map_err(|e| RecognitionError::Inference(format!("unexpected logits shape: {e}")))?;
            *head = Some(logits);
        }

        let [char, bpe, wp] = heads;
        let char = char.ok_or_else(|| RecognitionError::Inference("model produced no char logits".into()))?;
        Ok(HeadLogits { char, bpe, wp })
    }
}
