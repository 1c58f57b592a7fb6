use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use super::state::{update_status, view, AppState, BackendEvent, ModelStatus};
use crate::runtime::RecognitionContext;

/// Download missing model files if needed, then load model and processor.
/// A no-op while a load is in flight or after it has succeeded.
pub fn initialize_model(state: &Rc<RefCell<AppState>>) {
    {
        let s = state.borrow();
        if matches!(s.model_status, ModelStatus::Loading | ModelStatus::Ready(_)) {
            log::info!("Model already {:?}, not loading again", s.model_status);
            return;
        }
    }

    state.borrow_mut().model_status = ModelStatus::Loading;
    if let Some(view) = view(state) {
        view.set_input_enabled(false);
        view.set_retry_visible(false);
    }
    update_status(state, "Loading model...");

    let s = state.borrow();
    let provider = s.provider.clone();
    let model_id = s.config.model_id.clone();
    let sender = s.backend_sender.clone();
    log::info!("Initialising model {model_id}");

    s.tokio_rt.spawn(async move {
        let missing = provider.missing_files(&model_id);
        if !missing.is_empty() {
            log::info!("{} model file(s) missing, starting download", missing.len());
            let progress_sender = sender.clone();
            let result = crate::hub::download_files(&missing, move |file, downloaded, total| {
                let _ = progress_sender.try_send(BackendEvent::ModelDownloadProgress {
                    file: file.to_string(),
                    downloaded,
                    total,
                });
            })
            .await;

            if let Err(e) = result {
                let _ = sender.send(BackendEvent::ModelFailed(e.to_string())).await;
                return;
            }
        }

        let result = tokio::task::spawn_blocking(move || {
            RecognitionContext::load(provider.as_ref(), &model_id)
        })
        .await;

        let event = match result {
            Ok(Ok(ctx)) => BackendEvent::ModelReady(Arc::new(ctx)),
            Ok(Err(e)) => BackendEvent::ModelFailed(e.to_string()),
            Err(e) => BackendEvent::ModelFailed(format!("Model load panicked: {e}")),
        };
        let _ = sender.send(event).await;
    });
}

/// Store the loaded handles. The first context wins; later ones are dropped.
pub fn on_model_ready(state: &Rc<RefCell<AppState>>, ctx: Arc<RecognitionContext>) {
    {
        let mut s = state.borrow_mut();
        if let ModelStatus::Ready(current) = &s.model_status {
            log::warn!(
                "Ignoring second model context for {}, keeping {}",
                ctx.model_id,
                current.model_id
            );
            return;
        }
        log::info!("Model {} ready", ctx.model_id);
        s.model_status = ModelStatus::Ready(ctx);
    }

    if let Some(view) = view(state) {
        view.set_download_progress(None);
        view.set_retry_visible(false);
        view.set_input_enabled(true);
    }
    update_status(state, "Ready");
}

pub fn on_model_failed(state: &Rc<RefCell<AppState>>, message: String) {
    log::error!("Model load failed: {message}");
    let label = format!("Model failed to load: {message}");
    state.borrow_mut().model_status = ModelStatus::Failed(message);

    if let Some(view) = view(state) {
        view.set_download_progress(None);
        view.set_input_enabled(false);
        view.set_retry_visible(true);
    }
    update_status(state, &label);
}
