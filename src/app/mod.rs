mod event_handler;
mod model;
mod pipeline;
mod state;
mod view;

#[cfg(test)]
mod tests;

pub use event_handler::handle_backend_event;
pub use model::initialize_model;
pub use state::{AppState, BackendEvent};
pub use view::RecognitionView;
