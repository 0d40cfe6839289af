use std::time::Instant;

use hhmmss::Hhmmss;
use indicatif::{ProgressBar, ProgressStyle};

/// Sink for human readable progress lines of long computations.
pub trait Progress: Send + Sync {
    fn line(&self, message: &str);

    fn finish(&self) {}
}

impl<F: Fn(&str) + Send + Sync> Progress for F {
    fn line(&self, message: &str) {
        self(message)
    }
}

/// Terminal spinner showing the latest progress line.
pub struct BarProgress {
    timer: Instant,
    progress: ProgressBar,
}

impl Default for BarProgress {
    fn default() -> Self {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}") {
            progress.set_style(style);
        }

        Self {
            timer: Instant::now(),
            progress,
        }
    }
}

impl BarProgress {
    pub fn hidden() -> Self {
        Self {
            timer: Instant::now(),
            progress: ProgressBar::hidden(),
        }
    }
}

impl Progress for BarProgress {
    fn line(&self, message: &str) {
        self.progress.set_message(message.to_string());
        self.progress.tick();
    }

    fn finish(&self) {
        let elapsed = self.timer.elapsed();
        self.progress
            .finish_with_message(format!("done in {}", elapsed.hhmmssxxx()));
    }
}

/// Forwards progress lines to `tracing` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn line(&self, message: &str) {
        tracing::info!("{message}");
    }
}

pub(crate) fn report(progress: Option<&dyn Progress>, message: impl FnOnce() -> String) {
    if let Some(progress) = progress {
        progress.line(&message());
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn closure_sink() {
        let lines = Mutex::new(Vec::new());
        let sink = |line: &str| lines.lock().unwrap().push(line.to_string());

        report(Some(&sink), || "first".to_string());
        report(None, || unreachable!());
        sink.finish();

        assert_eq!(*lines.lock().unwrap(), vec!["first".to_string()]);
    }

    #[test]
    fn hidden_bar() {
        let bar = BarProgress::hidden();
        bar.line("filled rows 1/2");
        bar.finish();
    }
}
