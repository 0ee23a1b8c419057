//! Transform progress display with progress bars.

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for a file transform.
pub struct TransformProgress {
    bar: ProgressBar,
}

impl TransformProgress {
    /// Create a new progress tracker.
    #[must_use]
    pub fn new(total_bytes: u64, filename: &str) -> Self {
        let bar = ProgressBar::new(total_bytes);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );

        bar.set_message(format!("Processing: {filename}"));

        Self { bar }
    }

    /// Update progress.
    pub fn update(&self, processed_bytes: u64) {
        self.bar.set_position(processed_bytes);
    }

    /// Finish with custom message.
    pub fn finish_with_message(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }

    /// Abandon the progress bar (for errors).
    #[allow(dead_code)]
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Format bytes in human-readable form.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}
