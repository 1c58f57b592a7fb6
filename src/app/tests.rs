use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use ndarray::{Array3, Array4};

use super::state::{ModelStatus, RequestPhase};
use super::*;
use crate::config::Config;
use crate::error::RecognitionError;
use crate::hub::RemoteFile;
use crate::runtime::{
    Decoded, HeadLogits, ModelProvider, PixelBatch, RecognitionContext, TextModel, TextProcessor,
};

struct StubModel {
    fail: bool,
}

impl TextModel for StubModel {
    fn infer(&self, batch: &PixelBatch) -> Result<HeadLogits, RecognitionError> {
        if self.fail {
            return Err(RecognitionError::Inference("stub failure".into()));
        }
        // carry the image width through to the decoder
        let width = batch.0.shape()[3];
        Ok(HeadLogits {
            char: Array3::zeros((1, width, 1)),
            bpe: None,
            wp: None,
        })
    }
}

/// Decodes to `text`, or to `W<image width>` when no text is fixed.
struct StubProcessor {
    text: Option<String>,
}

impl TextProcessor for StubProcessor {
    fn preprocess(&self, image: &DynamicImage) -> Result<PixelBatch, RecognitionError> {
        Ok(PixelBatch(Array4::zeros((1, 3, 1, image.width() as usize))))
    }

    fn batch_decode(&self, logits: &HeadLogits) -> Result<Vec<Decoded>, RecognitionError> {
        let text = match &self.text {
            Some(text) => text.clone(),
            None => format!("W{}", logits.char.shape()[1]),
        };
        Ok(vec![Decoded { text, score: 0.9 }])
    }
}

#[derive(Default)]
struct StubProvider {
    text: Option<String>,
    infer_fails: bool,
    load_failures: AtomicUsize,
    loads: AtomicUsize,
}

impl ModelProvider for StubProvider {
    fn missing_files(&self, _model_id: &str) -> Vec<RemoteFile> {
        Vec::new()
    }

    fn load_model(&self, model_id: &str) -> Result<Arc<dyn TextModel>, RecognitionError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.load_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.load_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RecognitionError::model_load(model_id, "404 Not Found"));
        }
        Ok(Arc::new(StubModel {
            fail: self.infer_fails,
        }))
    }

    fn load_processor(&self, _model_id: &str) -> Result<Arc<dyn TextProcessor>, RecognitionError> {
        Ok(Arc::new(StubProcessor {
            text: self.text.clone(),
        }))
    }
}

#[derive(Default)]
struct FakeView {
    busy: Cell<bool>,
    result: RefCell<String>,
    status: RefCell<String>,
    progress: RefCell<Option<(String, u64, u64)>>,
    input_enabled: Cell<bool>,
    retry_visible: Cell<bool>,
    calls: Cell<usize>,
}

impl FakeView {
    fn touch(&self) {
        self.calls.set(self.calls.get() + 1);
    }

    fn result(&self) -> String {
        self.result.borrow().clone()
    }
}

impl RecognitionView for FakeView {
    fn set_busy(&self, busy: bool) {
        self.touch();
        self.busy.set(busy);
    }

    fn set_result(&self, text: &str) {
        self.touch();
        *self.result.borrow_mut() = text.to_string();
    }

    fn set_status(&self, text: &str) {
        self.touch();
        *self.status.borrow_mut() = text.to_string();
    }

    fn set_download_progress(&self, progress: Option<(&str, u64, u64)>) {
        self.touch();
        *self.progress.borrow_mut() = progress.map(|(f, d, t)| (f.to_string(), d, t));
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.touch();
        self.input_enabled.set(enabled);
    }

    fn set_retry_visible(&self, visible: bool) {
        self.touch();
        self.retry_visible.set(visible);
    }
}

struct Harness {
    state: Rc<RefCell<AppState>>,
    rx: async_channel::Receiver<BackendEvent>,
    view: Rc<FakeView>,
    provider: Arc<StubProvider>,
    dir: tempfile::TempDir,
}

impl Harness {
    fn new(provider: StubProvider) -> Self {
        let (tx, rx) = async_channel::unbounded();
        let provider = Arc::new(provider);
        let state = Rc::new(RefCell::new(AppState::with_provider(
            tx,
            Config::default(),
            provider.clone(),
        )));
        let view = Rc::new(FakeView::default());
        state.borrow_mut().view = Some(view.clone());
        Self {
            state,
            rx,
            view,
            provider,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn ready(provider: StubProvider) -> Self {
        let h = Self::new(provider);
        initialize_model(&h.state);
        h.pump_until(|e| matches!(e, BackendEvent::ModelReady(_)));
        h
    }

    /// Feed events back into the handler, like the GTK loop does, until `done` matches one.
    fn pump_until(&self, done: impl Fn(&BackendEvent) -> bool) {
        loop {
            let event = self.rx.recv_blocking().expect("event channel closed");
            let stop = done(&event);
            handle_backend_event(&self.state, event);
            if stop {
                return;
            }
        }
    }

    fn pump_until_finished(&self) {
        self.pump_until(is_terminal);
    }

    fn png(&self, name: &str, width: u32) -> PathBuf {
        let path = self.dir.path().join(name);
        RgbImage::new(width, 4).save(&path).unwrap();
        path
    }

    fn select(&self, path: &Path) {
        handle_backend_event(&self.state, BackendEvent::FileSelected(Some(path.to_path_buf())));
    }

    fn phase(&self) -> RequestPhase {
        self.state.borrow().phase
    }
}

fn is_terminal(event: &BackendEvent) -> bool {
    matches!(
        event,
        BackendEvent::RecognitionComplete { .. } | BackendEvent::RecognitionFailed { .. }
    )
}

fn stop_provider() -> StubProvider {
    StubProvider {
        text: Some("STOP".into()),
        ..StubProvider::default()
    }
}

#[test]
fn valid_image_renders_recognized_text() {
    let h = Harness::ready(stop_provider());
    let path = h.png("stop.png", 16);

    h.select(&path);
    assert!(h.view.busy.get());
    assert_eq!(h.view.result(), "");
    assert_eq!(h.phase(), RequestPhase::Loading);

    h.pump_until_finished();
    assert_eq!(h.view.result(), "Recognized Text: STOP");
    assert!(!h.view.busy.get());
    assert_eq!(h.phase(), RequestPhase::Done);
    assert!(h.view.status.borrow().starts_with("Done"));
}

#[test]
fn corrupt_file_shows_error_and_hides_spinner() {
    let h = Harness::ready(stop_provider());
    let path = h.dir.path().join("broken.png");
    std::fs::write(&path, b"definitely not a png").unwrap();

    h.select(&path);
    h.pump_until_finished();
    assert!(h.view.result().starts_with("Error: could not read image"));
    assert!(!h.view.busy.get());
    assert_eq!(h.phase(), RequestPhase::Failed);
}

#[test]
fn missing_file_shows_error() {
    let h = Harness::ready(stop_provider());
    h.select(&h.dir.path().join("gone.png"));
    h.pump_until_finished();
    assert!(h.view.result().starts_with("Error: could not read image"));
    assert!(!h.view.busy.get());
}

#[test]
fn empty_selection_leaves_ui_untouched() {
    let h = Harness::ready(stop_provider());
    let calls = h.view.calls.get();
    let generation = h.state.borrow().generation;

    handle_backend_event(&h.state, BackendEvent::FileSelected(None));
    assert_eq!(h.view.calls.get(), calls);
    assert_eq!(h.phase(), RequestPhase::Idle);
    assert_eq!(h.state.borrow().generation, generation);
    assert!(h.rx.is_empty());
}

#[test]
fn failing_inference_shows_error_within_one_run() {
    let h = Harness::ready(StubProvider {
        infer_fails: true,
        ..stop_provider()
    });
    let path = h.png("stop.png", 16);

    h.select(&path);
    h.pump_until_finished();
    assert_eq!(h.view.result(), "Error: inference failed: stub failure");
    assert!(!h.view.busy.get());
    assert_eq!(h.phase(), RequestPhase::Failed);
}

#[test]
fn initialization_is_idempotent() {
    let h = Harness::new(stop_provider());
    initialize_model(&h.state);
    initialize_model(&h.state);
    h.pump_until(|e| matches!(e, BackendEvent::ModelReady(_)));
    assert_eq!(h.provider.loads.load(Ordering::SeqCst), 1);

    // once ready, initialising again does nothing either
    initialize_model(&h.state);
    assert!(h.rx.is_empty());
    assert_eq!(h.provider.loads.load(Ordering::SeqCst), 1);

    let first = h.state.borrow().context().unwrap();
    let other = RecognitionContext::load(h.provider.as_ref(), "other/model").unwrap();
    handle_backend_event(&h.state, BackendEvent::ModelReady(Arc::new(other)));
    let current = h.state.borrow().context().unwrap();
    assert!(Arc::ptr_eq(&first, &current));
}

#[test]
fn recognition_before_ready_reports_not_ready() {
    let h = Harness::new(stop_provider());
    let path = h.png("stop.png", 16);

    h.select(&path);
    assert_eq!(h.view.result(), "Error: model is not ready yet");
    assert_eq!(h.view.status.borrow().as_str(), "Model not ready");
    assert!(!h.view.busy.get());
    assert_eq!(h.phase(), RequestPhase::Failed);
    assert!(h.rx.is_empty());
}

#[test]
fn superseded_results_never_reach_the_view() {
    let h = Harness::ready(StubProvider::default());
    let first = h.png("narrow.png", 8);
    let second = h.png("wide.png", 24);

    h.select(&first);
    h.select(&second);
    assert_eq!(h.state.borrow().generation, 2);

    // a late result for the first request is dropped
    handle_backend_event(
        &h.state,
        BackendEvent::RecognitionComplete {
            generation: 1,
            decoded: Decoded {
                text: "stale".into(),
                score: 1.0,
            },
        },
    );
    assert_eq!(h.view.result(), "");
    assert!(h.view.busy.get());

    let finished = Cell::new(0);
    h.pump_until(|e| {
        if is_terminal(e) {
            finished.set(finished.get() + 1);
        }
        finished.get() == 2
    });
    assert_eq!(h.view.result(), "Recognized Text: W24");
    assert!(!h.view.busy.get());
    assert_eq!(h.phase(), RequestPhase::Done);
}

#[test]
fn model_failure_offers_retry() {
    let h = Harness::new(StubProvider {
        load_failures: AtomicUsize::new(1),
        ..stop_provider()
    });
    initialize_model(&h.state);
    h.pump_until(|e| matches!(e, BackendEvent::ModelFailed(_)));
    assert!(matches!(h.state.borrow().model_status, ModelStatus::Failed(_)));
    assert!(h.view.retry_visible.get());
    assert!(!h.view.input_enabled.get());
    assert!(h.view.status.borrow().contains("404 Not Found"));

    handle_backend_event(&h.state, BackendEvent::RetryModelLoad);
    h.pump_until(|e| matches!(e, BackendEvent::ModelReady(_)));
    assert!(!h.view.retry_visible.get());
    assert!(h.view.input_enabled.get());
    assert_eq!(h.view.status.borrow().as_str(), "Ready");
    assert_eq!(h.provider.loads.load(Ordering::SeqCst), 2);
}

#[test]
fn download_progress_is_forwarded() {
    let h = Harness::new(stop_provider());
    handle_backend_event(
        &h.state,
        BackendEvent::ModelDownloadProgress {
            file: "model_quantized.onnx".into(),
            downloaded: 10,
            total: 100,
        },
    );
    assert_eq!(
        *h.view.progress.borrow(),
        Some(("model_quantized.onnx".to_string(), 10, 100))
    );
}
