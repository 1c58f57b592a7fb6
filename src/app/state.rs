use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use super::view::RecognitionView;
use crate::config::Config;
use crate::runtime::{Decoded, HubProvider, ModelProvider, RecognitionContext};

/// Events sent from background tasks and widgets to the GTK main thread.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    FileSelected(Option<PathBuf>),
    RequestPhase { generation: u64, phase: RequestPhase },
    RecognitionComplete { generation: u64, decoded: Decoded },
    RecognitionFailed { generation: u64, message: String },
    ModelDownloadProgress { file: String, downloaded: u64, total: u64 },
    ModelReady(Arc<RecognitionContext>),
    ModelFailed(String),
    RetryModelLoad,
}

/// Lifecycle of the current recognition request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestPhase {
    Idle,
    Loading,
    Recognizing,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready(Arc<RecognitionContext>),
    Failed(String),
}

/// Central application state. Lives on the GTK main thread inside Rc<RefCell<>>.
pub struct AppState {
    pub config: Config,
    pub model_status: ModelStatus,
    pub provider: Arc<dyn ModelProvider>,
    pub tokio_rt: tokio::runtime::Runtime,
    pub backend_sender: async_channel::Sender<BackendEvent>,

    // Request tracking; only the newest generation may touch the view
    pub generation: u64,
    pub phase: RequestPhase,

    pub view: Option<Rc<dyn RecognitionView>>,
}

impl AppState {
    pub fn new(sender: async_channel::Sender<BackendEvent>) -> Self {
        let config = Config::load();
        if let Err(e) = config.save() {
            log::warn!("Failed to save config: {e}");
        }
        let provider = Arc::new(HubProvider::new(&config));
        Self::with_provider(sender, config, provider)
    }

    pub fn with_provider(
        sender: async_channel::Sender<BackendEvent>,
        config: Config,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        let tokio_rt = tokio::runtime::Runtime::new()
            .expect("Failed to create tokio runtime");

        Self {
            config,
            model_status: ModelStatus::Unloaded,
            provider,
            tokio_rt,
            backend_sender: sender,
            generation: 0,
            phase: RequestPhase::Idle,
            view: None,
        }
    }

    /// Loaded model and processor, if initialisation has finished.
    pub fn context(&self) -> Option<Arc<RecognitionContext>> {
        match &self.model_status {
            ModelStatus::Ready(ctx) => Some(ctx.clone()),
            _ => None,
        }
    }
}

/// Clone the view handle out of the state so no borrow is held while widgets update.
pub fn view(state: &Rc<RefCell<AppState>>) -> Option<Rc<dyn RecognitionView>> {
    state.borrow().view.clone()
}

/// Helper to update the status line.
pub fn update_status(state: &Rc<RefCell<AppState>>, label_text: &str) {
    if let Some(view) = view(state) {
        view.set_status(label_text);
    }
}
