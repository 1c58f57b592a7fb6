use crate::runtime::Decoded;

/// The widgets the orchestrator drives. Implemented by the GTK window.
pub trait RecognitionView {
    /// Show or hide the spinner.
    fn set_busy(&self, busy: bool);

    fn set_result(&self, text: &str);

    fn set_status(&self, text: &str);

    /// `Some((file, downloaded, total))` shows the bar, `None` hides it.
    fn set_download_progress(&self, progress: Option<(&str, u64, u64)>);

    fn set_input_enabled(&self, enabled: bool);

    fn set_retry_visible(&self, visible: bool);
}

pub fn result_text(decoded: &Decoded) -> String {
    format!("Recognized Text: {}", decoded.text)
}

pub fn error_text(message: &str) -> String {
    format!("Error: {message}")
}
