use std::cell::RefCell;
use std::rc::Rc;

use super::model::{initialize_model, on_model_failed, on_model_ready};
use super::pipeline::dispatch_recognition;
use super::state::{update_status, view, AppState, BackendEvent, RequestPhase};
use super::view::{error_text, result_text};

/// Handle a backend event. This is the core state machine.
pub fn handle_backend_event(state: &Rc<RefCell<AppState>>, event: BackendEvent) {
    match event {
        BackendEvent::FileSelected(None) => {
            log::debug!("File dialog closed without a selection");
        }
        BackendEvent::FileSelected(Some(path)) => dispatch_recognition(state, path),
        BackendEvent::RequestPhase { generation, phase } => {
            if !is_current(state, generation) {
                return;
            }
            state.borrow_mut().phase = phase;
            if phase == RequestPhase::Recognizing {
                update_status(state, "Recognizing...");
            }
        }
        BackendEvent::RecognitionComplete { generation, decoded } => {
            if !is_current(state, generation) {
                log::warn!("Dropping result of superseded request {generation}");
                return;
            }
            log::info!("Request {generation} recognized '{}'", decoded.text);
            finish_request(
                state,
                RequestPhase::Done,
                &result_text(&decoded),
                &format!("Done (confidence {:.2})", decoded.score),
            );
        }
        BackendEvent::RecognitionFailed { generation, message } => {
            if !is_current(state, generation) {
                log::warn!("Dropping failure of superseded request {generation}: {message}");
                return;
            }
            log::error!("Request {generation} failed: {message}");
            finish_request(state, RequestPhase::Failed, &error_text(&message), "Failed");
        }
        BackendEvent::ModelDownloadProgress {
            file,
            downloaded,
            total,
        } => {
            if let Some(view) = view(state) {
                view.set_download_progress(Some((file.as_str(), downloaded, total)));
            }
        }
        BackendEvent::ModelReady(ctx) => on_model_ready(state, ctx),
        BackendEvent::ModelFailed(message) => on_model_failed(state, message),
        BackendEvent::RetryModelLoad => {
            log::info!("Retrying model load");
            initialize_model(state);
        }
    }
}

fn is_current(state: &Rc<RefCell<AppState>>, generation: u64) -> bool {
    state.borrow().generation == generation
}

/// Every request ends here: spinner hidden, result or error rendered.
pub(super) fn finish_request(state: &Rc<RefCell<AppState>>, phase: RequestPhase, text: &str, status: &str) {
    state.borrow_mut().phase = phase;
    if let Some(view) = view(state) {
        view.set_busy(false);
        view.set_result(text);
    }
    update_status(state, status);
}
