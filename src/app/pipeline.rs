use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use image::DynamicImage;

use super::event_handler::finish_request;
use super::state::{view, AppState, BackendEvent, RequestPhase};
use super::view::error_text;
use crate::error::RecognitionError;
use crate::runtime::{Decoded, RecognitionContext};

/// Start a recognition request for `path`, superseding any request still in flight.
pub fn dispatch_recognition(state: &Rc<RefCell<AppState>>, path: PathBuf) {
    let (generation, ctx) = {
        let mut s = state.borrow_mut();
        s.generation += 1;
        (s.generation, s.context())
    };

    let Some(ctx) = ctx else {
        log::warn!("Image selected before the model is ready");
        let text = error_text(&RecognitionError::NotReady.to_string());
        finish_request(state, RequestPhase::Failed, &text, "Model not ready");
        return;
    };

    log::info!("Request {generation}: {}", path.display());
    state.borrow_mut().phase = RequestPhase::Loading;
    if let Some(view) = view(state) {
        view.set_busy(true);
        view.set_result("");
        view.set_status("Reading image...");
    }

    let s = state.borrow();
    let sender = s.backend_sender.clone();

    s.tokio_rt.spawn(async move {
        let event = match run_request(ctx, &path, generation, &sender).await {
            Ok(decoded) => BackendEvent::RecognitionComplete { generation, decoded },
            Err(e) => BackendEvent::RecognitionFailed {
                generation,
                message: e.to_string(),
            },
        };
        let _ = sender.send(event).await;
    });
}

async fn run_request(
    ctx: Arc<RecognitionContext>,
    path: &Path,
    generation: u64,
    sender: &async_channel::Sender<BackendEvent>,
) -> Result<Decoded, RecognitionError> {
    let image = read_image(path).await?;
    let _ = sender
        .send(BackendEvent::RequestPhase {
            generation,
            phase: RequestPhase::Recognizing,
        })
        .await;

    tokio::task::spawn_blocking(move || recognize(&ctx, &image))
        .await
        .map_err(|e| RecognitionError::Inference(format!("recognition task panicked: {e}")))?
}

/// Read and decode an image file. Decoding runs on the blocking pool.
pub async fn read_image(path: &Path) -> Result<DynamicImage, RecognitionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RecognitionError::ImageDecode(format!("{}: {e}", path.display())))?;

    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| RecognitionError::ImageDecode(format!("decode task panicked: {e}")))?
        .map_err(|e| RecognitionError::ImageDecode(e.to_string()))
}

/// Preprocess, infer and decode in sequence; the first decoded string is the result.
/// CPU-heavy, call from `spawn_blocking`.
pub fn recognize(ctx: &RecognitionContext, image: &DynamicImage) -> Result<Decoded, RecognitionError> {
    let batch = ctx.processor.preprocess(image)?;
    let logits = ctx.model.infer(&batch)?;
    ctx.processor
        .batch_decode(&logits)?
        .into_iter()
        .next()
        .ok_or_else(|| RecognitionError::Decode("model returned an empty batch".into()))
}
