//! Progress indicators for flyform CLI.

use colored::Colorize;
use declarative::{BatchOp, BatchOutcome, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message; hidden when `quiet`
pub fn spinner(msg: impl Into<String>, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Reports secret batches on a spinner
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressCallback for BatchProgress {
    fn on_batch_start(&mut self, op: BatchOp, entity: &str, names: &[String]) {
        self.bar
            .set_message(format!("{} {} secret(s) on {}", op, names.len(), entity));
    }

    fn on_batch_complete(&mut self, op: BatchOp, entity: &str, outcome: BatchOutcome) {
        let symbol = match outcome {
            BatchOutcome::Applied => "✓".green(),
            BatchOutcome::NoOp => "○".dimmed(),
            BatchOutcome::Failed => "✗".red(),
        };
        self.bar
            .println(format!("    {} {} secrets on {}", symbol, op, entity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_progress_on_hidden_bar() {
        let mut progress = BatchProgress::new(spinner("Applying", true));
        progress.on_batch_start(BatchOp::Set, "web", &["A".to_string()]);
        assert_eq!(progress.bar.message(), "set 1 secret(s) on web");
        progress.on_batch_complete(BatchOp::Set, "web", BatchOutcome::Applied);
    }
}
