//! Terminal progress reporting with indicatif.

use std::time::Duration;

use firmscope_core::{BatchMode, BatchProgress};
use firmscope_shared::ProcessingResult;
use indicatif::{ProgressBar, ProgressStyle};

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner shown while a single URL is processed.
pub(crate) fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(TICKS),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message);
    spinner
}

/// Batch progress bar: one tick per finished URL.
pub(crate) struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .tick_strings(TICKS)
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BatchProgress for CliProgress {
    fn started(&self, total: usize, mode: BatchMode) {
        self.bar.set_length(total as u64);
        self.bar.set_message(format!("{mode:?} batch"));
    }

    fn item_finished(&self, done: usize, _total: usize, result: &ProcessingResult) {
        self.bar.set_position(done as u64);
        let status = if result.is_success() { "ok" } else { "failed" };
        self.bar.set_message(format!("{status}: {}", result.url()));
    }

    fn chunk_finished(&self, chunk: usize, chunks: usize) {
        self.bar
            .println(format!("  chunk {chunk}/{chunks} complete"));
    }
}
