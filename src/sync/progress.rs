use serde::Serialize;
use tokio::sync::mpsc;

/// Announces the feed a batch run is about to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    /// 1-based position of this feed in the run
    pub current_index: usize,
    pub total_feeds: usize,
    pub feed_title: String,
    pub feed_url: String,
}

/// Receives progress events from a batch run.
///
/// Called exactly once per attempted feed, in processing order, before that
/// feed's fetch starts. Implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &SyncProgress);
}

/// Discards all progress events
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _progress: &SyncProgress) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(&SyncProgress) + Send + Sync,
{
    fn report(&self, progress: &SyncProgress) {
        self(progress)
    }
}

/// Forwards events to a presentation task; a dropped receiver is ignored
impl ProgressReporter for mpsc::UnboundedSender<SyncProgress> {
    fn report(&self, progress: &SyncProgress) {
        let _ = self.send(progress.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(i: usize) -> SyncProgress {
        SyncProgress {
            current_index: i,
            total_feeds: 2,
            feed_title: format!("Feed {}", i),
            feed_url: format!("https://example.com/{}", i),
        }
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |p: &SyncProgress| seen.lock().unwrap().push(p.current_index);

        reporter.report(&event(1));
        reporter.report(&event(2));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_channel_reporter() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.report(&event(1));
        assert_eq!(rx.recv().await, Some(event(1)));

        drop(rx);
        // Reporting after the receiver is gone must not panic
        tx.report(&event(2));
    }
}
