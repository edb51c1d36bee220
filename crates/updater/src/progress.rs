//! Download progress reporting for gateway transfers.
//!
//! The reporter samples the size of the file being written by the transfer
//! on its own timer and never touches the writer. The transfer signals
//! completion through a [`ProgressHandle`], carrying the final byte count.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

const PROGRESS_LABEL: &str = "Download progress:";

/// Default time between two size samples.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Destination for progress updates.
pub trait ProgressSink: Send + Sync {
    /// Called on every sample with the completion percentage.
    fn progress(&self, percent: f64);
    /// Called once, after the transfer wrote its last byte.
    fn complete(&self, bytes: u64);
}

/// Writes a single in-place progress line to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn progress(&self, percent: f64) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r{PROGRESS_LABEL} {percent:.0}%");
        let _ = err.flush();
    }

    fn complete(&self, _bytes: u64) {
        let _ = writeln!(io::stderr().lock(), "\r{PROGRESS_LABEL} COMPLETE");
    }
}

/// Discards all progress updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _percent: f64) {}

    fn complete(&self, _bytes: u64) {}
}

/// How a reporter stopped.
#[derive(Debug)]
pub enum ProgressOutcome {
    /// The completion signal arrived and the COMPLETE line was emitted.
    Completed(u64),
    /// The handle was dropped or cancelled before completion.
    Cancelled,
    /// The file could not be sampled; the reporter stopped on its own and
    /// the transfer was not told.
    Unreadable(io::Error),
}

/// Periodic sampler of a file that another task is writing.
pub struct ProgressReporter {
    path: PathBuf,
    total: u64,
    interval: Duration,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressReporter {
    /// Track `path` against an expected size of `total` bytes.
    pub fn new(path: impl Into<PathBuf>, total: u64, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            path: path.into(),
            total,
            interval: DEFAULT_PROGRESS_INTERVAL,
            sink,
        }
    }

    /// Override the sampling interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start sampling on a background task.
    pub fn spawn(self) -> ProgressHandle {
        let (done, signal) = oneshot::channel();
        let task = tokio::spawn(self.run(signal));
        ProgressHandle {
            done: Some(done),
            task,
        }
    }

    async fn run(self, mut signal: oneshot::Receiver<u64>) -> ProgressOutcome {
        let mut ticker = tokio::time::interval(self.interval);
        let mut last = 0.0_f64;

        loop {
            tokio::select! {
                biased;
                done = &mut signal => {
                    return match done {
                        Ok(bytes) => {
                            self.sink.complete(bytes);
                            ProgressOutcome::Completed(bytes)
                        }
                        Err(_) => ProgressOutcome::Cancelled,
                    };
                }
                _ = ticker.tick() => {
                    let size = match tokio::fs::metadata(&self.path).await {
                        Ok(meta) => meta.len(),
                        Err(err) => {
                            debug!("progress sampling of {:?} stopped: {}", self.path, err);
                            return ProgressOutcome::Unreadable(err);
                        }
                    };
                    // A flush race can briefly report a smaller size.
                    last = percent(size, self.total).max(last);
                    self.sink.progress(last);
                }
            }
        }
    }
}

/// Owner side of a running reporter.
///
/// Dropping the handle without calling [`ProgressHandle::finish`] stops the
/// reporter without a completion line.
pub struct ProgressHandle {
    done: Option<oneshot::Sender<u64>>,
    task: JoinHandle<ProgressOutcome>,
}

impl ProgressHandle {
    /// Report that `bytes` were written and wait for the reporter to stop.
    pub async fn finish(mut self, bytes: u64) -> ProgressOutcome {
        if let Some(done) = self.done.take() {
            // The reporter may already have stopped on an unreadable file.
            let _ = done.send(bytes);
        }
        self.join().await
    }

    /// Stop the reporter without a completion line.
    pub async fn cancel(mut self) -> ProgressOutcome {
        self.done.take();
        self.join().await
    }

    async fn join(self) -> ProgressOutcome {
        self.task.await.unwrap_or(ProgressOutcome::Cancelled)
    }
}

/// Percentage of `total` that `size` bytes represent, capped at 100. An
/// empty file counts as one byte; an empty total counts as done.
fn percent(size: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (size.max(1) as f64 / total as f64 * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Progress(f64),
        Complete(u64),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn progress(&self, percent: f64) {
            self.events.lock().unwrap().push(Event::Progress(percent));
        }

        fn complete(&self, bytes: u64) {
            self.events.lock().unwrap().push(Event::Complete(bytes));
        }
    }

    async fn wait_for_events(sink: &RecordingSink, count: usize) {
        for _ in 0..200 {
            if sink.events().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("reporter produced no events");
    }

    #[test]
    fn percent_of_total() {
        assert_eq!(percent(50, 200), 25.0);
        assert_eq!(percent(200, 200), 100.0);
    }

    #[test]
    fn empty_file_counts_as_one_byte() {
        assert_eq!(percent(0, 100), 1.0);
        assert!(percent(0, 1).is_finite());
    }

    #[test]
    fn oversized_file_caps_at_hundred() {
        assert_eq!(percent(300, 200), 100.0);
        assert_eq!(percent(201, 200), 100.0);
    }

    #[test]
    fn empty_total_is_complete() {
        assert_eq!(percent(0, 0), 100.0);
    }

    #[tokio::test]
    async fn growing_file_reports_non_decreasing_progress() {
        let file = NamedTempFile::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let handle = ProgressReporter::new(file.path(), 100, sink.clone())
            .interval(Duration::from_millis(10))
            .spawn();

        let mut writer = file.reopen().unwrap();
        for _ in 0..4 {
            writer.write_all(&[7u8; 25]).unwrap();
            writer.flush().unwrap();
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let outcome = handle.finish(100).await;
        assert!(matches!(outcome, ProgressOutcome::Completed(100)));

        let events = sink.events();
        let (last, samples) = events.split_last().unwrap();
        assert_eq!(*last, Event::Complete(100));
        assert!(!samples.is_empty());

        let mut previous = 0.0;
        for event in samples {
            match event {
                Event::Progress(p) => {
                    assert!(*p >= previous, "progress went backwards: {p} < {previous}");
                    previous = *p;
                }
                Event::Complete(_) => panic!("completion reported more than once"),
            }
        }
        assert!(previous <= 100.0);
    }

    #[tokio::test]
    async fn first_sample_of_empty_file_is_one_percent() {
        let file = NamedTempFile::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let handle = ProgressReporter::new(file.path(), 100, sink.clone())
            .interval(Duration::from_secs(3600))
            .spawn();

        wait_for_events(&sink, 1).await;
        assert_eq!(sink.events()[0], Event::Progress(1.0));

        handle.finish(0).await;
        assert_eq!(sink.events().last(), Some(&Event::Complete(0)));
    }

    // An unreadable file stops the reporter silently, and the transfer only
    // finds out when it signals completion.
    #[tokio::test]
    async fn unreadable_file_stops_reporter_without_completion() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let handle = ProgressReporter::new(dir.path().join("missing"), 100, sink.clone())
            .interval(Duration::from_millis(10))
            .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = handle.finish(100).await;
        assert!(matches!(outcome, ProgressOutcome::Unreadable(_)));
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn cancel_stops_without_completion() {
        let file = NamedTempFile::new().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let handle = ProgressReporter::new(file.path(), 10, sink.clone())
            .interval(Duration::from_secs(3600))
            .spawn();

        wait_for_events(&sink, 1).await;
        let outcome = handle.cancel().await;
        assert!(matches!(outcome, ProgressOutcome::Cancelled));
        assert!(!sink.events().contains(&Event::Complete(10)));
    }
}
