use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Numbered spinner per phase of a resolution run, drawn on stderr.
///
/// Each `next` marks the current phase done and starts the following one.
pub struct PhaseProgress {
    pb: ProgressBar,
    phase: usize,
    total: usize,
    message: String,
}

impl PhaseProgress {
    pub fn start(title: &str, total: usize, message: impl Into<String>) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright(title).underlined());
        Self::phase(1, total, message.into())
    }

    fn phase(phase: usize, total: usize, message: String) -> Self {
        let pb = create_spinner(
            bright_yellow(format!("Phase {phase}/{total}: {message}")).to_string(),
        );
        Self {
            pb,
            phase,
            total,
            message,
        }
    }

    fn finish_current(&self) {
        self.pb.finish_with_message(
            bright_green(format!(
                "Phase {}/{}: {} ✓",
                self.phase, self.total, self.message
            ))
            .to_string(),
        );
    }

    pub fn next(self, message: impl Into<String>) -> Self {
        self.finish_current();
        Self::phase(self.phase + 1, self.total, message.into())
    }

    pub fn finish(self) {
        self.finish_current();
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("  {msg} {spinner} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());

    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr())
        .with_style(style)
        .with_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
