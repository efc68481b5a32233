use std::io::{self, Write};

use crossbeam_channel::Receiver;
use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Print, PrintStyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { total: usize },
    Advanced { completed: usize, total: usize },
    Finished { total: usize },
}

/// External display for fetch progress. Called from the reporter thread only,
/// never from a batch worker.
pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

/// Single redrawn status line on stderr.
pub struct TerminalProgress {
    label: String,
    width: usize,
}

impl TerminalProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            width: 40,
        }
    }

    fn draw(&self, completed: usize, total: usize) -> io::Result<()> {
        let filled = if total == 0 {
            self.width
        } else {
            completed.min(total) * self.width / total
        };
        let mut err = io::stderr().lock();
        err.queue(MoveToColumn(0))?;
        err.queue(Clear(ClearType::CurrentLine))?;
        err.queue(Print(format!("{} [", self.label)))?;
        for (i, base) in "ACGT".chars().cycle().take(filled).enumerate() {
            let color = match i % 4 {
                0 => Color::Green,
                1 => Color::Blue,
                2 => Color::Yellow,
                _ => Color::Red,
            };
            err.queue(PrintStyledContent(base.with(color)))?;
        }
        err.queue(Print(" ".repeat(self.width - filled)))?;
        err.queue(Print(format!("] {completed}/{total}")))?;
        err.flush()
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let result = match event {
            ProgressEvent::Started { total } => self.draw(0, total),
            ProgressEvent::Advanced { completed, total } => self.draw(completed, total),
            ProgressEvent::Finished { total } => self
                .draw(total, total)
                .and_then(|_| writeln!(io::stderr())),
        };
        if let Err(err) = result {
            tracing::debug!("progress redraw failed: {err}");
        }
    }
}

/// Consumes one completion signal per terminal batch and forwards the
/// running count to `sink`.
///
/// Signals that arrive together are coalesced into a single update, so the
/// forwarded counts are strictly increasing. Returns the last count seen once
/// it reaches `total` or every sender is gone.
pub fn report_progress(completions: Receiver<()>, total: usize, sink: &dyn ProgressSink) -> usize {
    sink.event(ProgressEvent::Started { total });
    let mut completed = 0usize;
    while completed < total {
        if completions.recv().is_err() {
            break;
        }
        completed = (completed + 1 + completions.try_iter().count()).min(total);
        sink.event(ProgressEvent::Advanced { completed, total });
    }
    if completed == total {
        sink.event(ProgressEvent::Finished { total });
    }
    completed
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for Recorder {
        fn event(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn zero_total_finishes_immediately() {
        let (_tx, rx) = crossbeam_channel::unbounded();
        let recorder = Recorder::default();
        assert_eq!(report_progress(rx, 0, &recorder), 0);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                ProgressEvent::Started { total: 0 },
                ProgressEvent::Finished { total: 0 }
            ]
        );
    }

    #[test]
    fn burst_is_coalesced() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for _ in 0..3 {
            tx.send(()).unwrap();
        }
        let recorder = Recorder::default();
        assert_eq!(report_progress(rx, 3, &recorder), 3);
        let events = recorder.0.lock().unwrap();
        assert_eq!(
            events[1],
            ProgressEvent::Advanced {
                completed: 3,
                total: 3
            }
        );
        assert_eq!(events.last(), Some(&ProgressEvent::Finished { total: 3 }));
    }

    #[test]
    fn disconnected_senders_stop_reporter() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(()).unwrap();
        drop(tx);
        let recorder = Recorder::default();
        assert_eq!(report_progress(rx, 5, &recorder), 1);
        assert!(
            !recorder
                .0
                .lock()
                .unwrap()
                .iter()
                .any(|event| matches!(event, ProgressEvent::Finished { .. }))
        );
    }
}
