mod app;
mod config;
mod error;
mod hub;
mod runtime;
mod ui;

use std::cell::RefCell;
use std::rc::Rc;

use gtk4::prelude::*;

use app::{AppState, BackendEvent};

fn main() {
    env_logger::init();
    log::info!("Scene Text Reader starting");

    let application = libadwaita::Application::builder()
        .application_id("com.github.scene-text-reader")
        .build();

    application.connect_activate(on_activate);
    application.run();
}

fn on_activate(app: &libadwaita::Application) {
    // Create async channel for backend → UI communication
    let (backend_tx, backend_rx) = async_channel::unbounded::<BackendEvent>();

    // Build app state
    let state = Rc::new(RefCell::new(AppState::new(backend_tx)));

    // Build UI
    let model_id = state.borrow().config.model_id.clone();
    let widgets = Rc::new(ui::window::build_window(app, &model_id));

    // Wire up the "Open Image" button
    {
        let sender = state.borrow().backend_sender.clone();
        let window = widgets.window.clone();
        widgets.open_button.connect_clicked(move |_| {
            let sender = sender.clone();
            ui::window::choose_image(&window, move |path| {
                let _ = sender.try_send(BackendEvent::FileSelected(path));
            });
        });
    }

    // Wire up the "Retry" button
    {
        let sender = state.borrow().backend_sender.clone();
        widgets.retry_button.connect_clicked(move |_| {
            let _ = sender.try_send(BackendEvent::RetryModelLoad);
        });
    }

    // Store UI handle in state
    state.borrow_mut().view = Some(widgets.clone());

    widgets.window.present();

    // Attach backend event handler
    {
        let state_clone = state.clone();
        gtk4::glib::spawn_future_local(async move {
            while let Ok(event) = backend_rx.recv().await {
                app::handle_backend_event(&state_clone, event);
            }
        });
    }

    // Start model download/load
    app::initialize_model(&state);
}
