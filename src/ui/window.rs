use gtk4::prelude::*;
use libadwaita::prelude::*;

use crate::app::RecognitionView;

/// Handles returned from building the main window.
pub struct WindowWidgets {
    pub window: libadwaita::ApplicationWindow,
    pub open_button: gtk4::Button,
    pub retry_button: gtk4::Button,
    pub spinner: gtk4::Spinner,
    pub result_label: gtk4::Label,
    pub status_label: gtk4::Label,
    pub progress_bar: gtk4::ProgressBar,
}

/// Build the main window: image picker, spinner, result text and model status.
pub fn build_window(app: &libadwaita::Application, model_id: &str) -> WindowWidgets {
    let window = libadwaita::ApplicationWindow::builder()
        .application(app)
        .title("Scene Text Reader")
        .default_width(450)
        .default_height(360)
        .build();

    let toolbar_view = libadwaita::ToolbarView::new();
    let header = libadwaita::HeaderBar::new();
    toolbar_view.add_top_bar(&header);

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    content.set_margin_start(16);
    content.set_margin_end(16);
    content.set_margin_top(12);
    content.set_margin_bottom(12);

    // --- Image group ---
    let image_group = libadwaita::PreferencesGroup::new();
    image_group.set_title("Image");

    let open_row = libadwaita::ActionRow::builder()
        .title("Upload an image")
        .subtitle("PNG, JPEG, WebP, ...")
        .build();
    let open_button = gtk4::Button::builder()
        .label("Open Image")
        .valign(gtk4::Align::Center)
        .sensitive(false)
        .build();
    open_button.add_css_class("suggested-action");
    open_row.add_suffix(&open_button);
    image_group.add(&open_row);

    content.append(&image_group);
    content.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

    // --- Result group ---
    let result_group = libadwaita::PreferencesGroup::new();
    result_group.set_title("Result");
    result_group.set_margin_top(12);

    let result_box = gtk4::Box::new(gtk4::Orientation::Horizontal, 12);
    result_box.set_margin_top(8);
    result_box.set_margin_bottom(8);

    let spinner = gtk4::Spinner::new();
    spinner.set_visible(false);
    result_box.append(&spinner);

    let result_label = gtk4::Label::new(None);
    result_label.set_wrap(true);
    result_label.set_xalign(0.0);
    result_label.set_selectable(true);
    result_label.add_css_class("title-3");
    result_box.append(&result_label);

    result_group.add(&result_box);
    content.append(&result_group);
    content.append(&gtk4::Separator::new(gtk4::Orientation::Horizontal));

    // --- Model group ---
    let model_group = libadwaita::PreferencesGroup::new();
    model_group.set_title("Model");
    model_group.set_margin_top(12);

    let status_row = libadwaita::ActionRow::builder().title(model_id).build();
    let status_label = gtk4::Label::new(Some("Starting..."));
    status_label.add_css_class("dim-label");
    status_label.set_wrap(true);
    status_row.add_suffix(&status_label);

    let retry_button = gtk4::Button::builder()
        .label("Retry")
        .valign(gtk4::Align::Center)
        .visible(false)
        .build();
    status_row.add_suffix(&retry_button);
    model_group.add(&status_row);

    content.append(&model_group);

    // --- Download progress bar ---
    let progress_bar = gtk4::ProgressBar::new();
    progress_bar.set_margin_top(16);
    progress_bar.set_visible(false);
    progress_bar.set_show_text(true);
    content.append(&progress_bar);

    // Assemble
    let scrolled = gtk4::ScrolledWindow::builder()
        .hscrollbar_policy(gtk4::PolicyType::Never)
        .child(&content)
        .build();
    toolbar_view.set_content(Some(&scrolled));
    window.set_content(Some(&toolbar_view));

    WindowWidgets {
        window,
        open_button,
        retry_button,
        spinner,
        result_label,
        status_label,
        progress_bar,
    }
}

/// Ask for an image file. `on_result` gets `None` when the dialog is dismissed.
pub fn choose_image<F>(parent: &libadwaita::ApplicationWindow, on_result: F)
where
    F: FnOnce(Option<std::path::PathBuf>) + 'static,
{
    let filter = gtk4::FileFilter::new();
    filter.set_name(Some("Images"));
    filter.add_mime_type("image/*");
    let filters = gtk4::gio::ListStore::new::<gtk4::FileFilter>();
    filters.append(&filter);

    let dialog = gtk4::FileDialog::builder()
        .title("Choose an image")
        .modal(true)
        .filters(&filters)
        .default_filter(&filter)
        .build();

    dialog.open(
        Some(parent),
        None::<&gtk4::gio::Cancellable>,
        move |result| match result {
            Ok(file) => on_result(file.path()),
            Err(e) => {
                log::debug!("File dialog dismissed: {e}");
                on_result(None);
            }
        },
    );
}

impl RecognitionView for WindowWidgets {
    fn set_busy(&self, busy: bool) {
        self.spinner.set_visible(busy);
        self.spinner.set_spinning(busy);
    }

    fn set_result(&self, text: &str) {
        self.result_label.set_text(text);
    }

    fn set_status(&self, text: &str) {
        self.status_label.set_text(text);
    }

    fn set_download_progress(&self, progress: Option<(&str, u64, u64)>) {
        let Some((file, downloaded, total)) = progress else {
            self.progress_bar.set_visible(false);
            return;
        };
        self.progress_bar.set_visible(true);
        if total > 0 {
            self.progress_bar
                .set_fraction(downloaded as f64 / total as f64);
            let mb_done = downloaded as f64 / 1_048_576.0;
            let mb_total = total as f64 / 1_048_576.0;
            self.progress_bar.set_text(Some(&format!(
                "Downloading {file}: {mb_done:.1} / {mb_total:.1} MB"
            )));
        } else {
            self.progress_bar.pulse();
            self.progress_bar
                .set_text(Some(&format!("Downloading {file}...")));
        }
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.open_button.set_sensitive(enabled);
    }

    fn set_retry_visible(&self, visible: bool) {
        self.retry_button.set_visible(visible);
    }
}
