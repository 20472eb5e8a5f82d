//! Spinner helpers using indicatif.
//!
//! Spinners draw on stderr and stay hidden when it is not a terminal.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Scale-themed spinner characters.
const SCALE_SPINNER: &[&str] = &["⚖ ", "◐ ", "◓ ", "◑ ", "◒ "];

/// Creates a new spinner with a message.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(SCALE_SPINNER)
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }

    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));

    pb
}

/// Finishes a spinner and clears it from the terminal.
pub fn finish_and_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}
