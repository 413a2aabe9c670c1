//! Progress indicators.
//!
//! Bars are cosmetic: every loop they decorate runs sequentially.

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over `len` items with a leading message.
pub fn bar(len: usize, message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style =
        ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb.set_message(message.into());
    pb
}
