use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

use super::{ProgressSink, ProgressSnapshot};
use crate::worker::Phase;

const HEADER_TEMPLATE: &str = "{prefix:.bold} [{bar:30.green/white}] {msg}";
const WORKER_TEMPLATE: &str = "{prefix:.bold.magenta} {bar:20.cyan/blue} {pos:>3}% {msg}";

/// Live terminal view: one stats line plus one line per worker
pub struct IndicatifSink {
    multi: MultiProgress,
    header: ProgressBar,
    workers: Mutex<Vec<ProgressBar>>,
}

impl IndicatifSink {
    /// Draw on `multi`. Share the same `MultiProgress` with
    /// [`SuspendingWriter`] so log lines print above the view.
    pub fn new(multi: MultiProgress) -> Self {
        let header = multi.add(ProgressBar::new(0));
        header.set_style(style(HEADER_TEMPLATE));
        header.set_prefix("Progress");

        Self {
            multi,
            header,
            workers: Mutex::new(Vec::new()),
        }
    }

    fn worker_bar(&self) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(style(WORKER_TEMPLATE));
        bar
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn phase_text(phase: Phase) -> String {
    let icon = match phase {
        Phase::Idle => "💤",
        Phase::Searching => "🔎",
        Phase::Downloading => "⬇️",
        Phase::Completed => "✅",
        Phase::Failed => "❌",
    };
    format!("{icon} {:<11}", phase.label())
}

impl ProgressSink for IndicatifSink {
    fn render(&self, snapshot: &ProgressSnapshot) {
        self.header.set_length(snapshot.total as u64);
        self.header.set_position(snapshot.done() as u64);
        self.header.set_message(snapshot.summary_line());

        let mut bars = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        while bars.len() < snapshot.workers.len() {
            let bar = self.worker_bar();
            bars.push(bar);
        }

        for (bar, view) in bars.iter().zip(&snapshot.workers) {
            bar.set_prefix(format!("Worker-{}", view.worker_id));
            bar.set_position(u64::from(view.progress));
            bar.set_message(format!("{} {}", phase_text(view.phase), view.label));
        }
    }

    fn finish(&self, snapshot: &ProgressSnapshot) {
        self.render(snapshot);
        self.header.finish();
        for bar in self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            bar.finish();
        }
    }
}

/// Log writer that hides the live view while a line is written
#[derive(Clone)]
pub struct SuspendingWriter {
    multi: MultiProgress,
}

impl SuspendingWriter {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Write for SuspendingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for SuspendingWriter {
    type Writer = SuspendingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::StatusView;
    use indicatif::ProgressDrawTarget;
    use std::time::Duration;

    fn hidden_sink() -> IndicatifSink {
        IndicatifSink::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    fn snapshot() -> ProgressSnapshot {
        ProgressSnapshot {
            total: 4,
            completed: 1,
            failed: 1,
            skipped: 0,
            elapsed: Duration::from_secs(10),
            workers: vec![
                StatusView {
                    worker_id: 1,
                    phase: Phase::Downloading,
                    label: "Some Video".to_string(),
                    progress: 50,
                },
                StatusView {
                    worker_id: 2,
                    phase: Phase::Idle,
                    label: String::new(),
                    progress: 0,
                },
            ],
        }
    }

    #[test]
    fn test_render_sets_header_and_worker_bars() {
        let sink = hidden_sink();
        sink.render(&snapshot());

        assert_eq!(sink.header.length(), Some(4));
        assert_eq!(sink.header.position(), 2);

        let bars = sink.workers.lock().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].position(), 50);
        assert!(bars[0].message().contains("Some Video"));
        assert_eq!(bars[0].prefix(), "Worker-1");
        assert_eq!(bars[1].position(), 0);
    }

    #[test]
    fn test_repeated_render_reuses_bars() {
        let sink = hidden_sink();
        sink.render(&snapshot());
        sink.render(&snapshot());
        sink.finish(&snapshot());

        assert_eq!(sink.workers.lock().unwrap().len(), 2);
        assert!(sink.header.is_finished());
    }
}
