use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::DispatchError;
use crate::request::ImportRequest;

/// Delivers one import request.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &ImportRequest) -> Result<(), DispatchError>;
}

/// Outcome of a live dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub total: usize,
    pub dispatched: usize,
    /// Group index and error of every failed group.
    pub failed: Vec<(usize, DispatchError)>,
    pub cancelled: bool,
}

impl DispatchReport {
    pub fn new(total: usize) -> Self {
        DispatchReport {
            total,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.dispatched == self.total
    }
}

/// Cooperative cancellation shared between the dispatch loop and the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration`, waking early on cancellation. Returns whether
    /// the flag was set.
    pub fn wait(&self, duration: Duration) -> bool {
        const STEP: Duration = Duration::from_millis(100);
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(STEP.min(deadline - now));
        }
    }
}

// ── Browser dispatcher ───────────────────────────────────────────────────────

/// Opens each link with the desktop's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserDispatcher;

impl BrowserDispatcher {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

impl Dispatcher for BrowserDispatcher {
    fn dispatch(&self, request: &ImportRequest) -> Result<(), DispatchError> {
        let status = Self::command(&request.url)
            .status()
            .map_err(|e| DispatchError::Open(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::Open(format!("opener exited with {status}")))
        }
    }
}

// ── HTTP dispatcher ──────────────────────────────────────────────────────────

/// Issues a GET for each link.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: reqwest::blocking::Client,
}

impl HttpDispatcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, DispatchError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| DispatchError::Http(e.to_string()))?;
        Ok(HttpDispatcher { client })
    }
}

impl Dispatcher for HttpDispatcher {
    fn dispatch(&self, request: &ImportRequest) -> Result<(), DispatchError> {
        let response = self
            .client
            .get(&request.url)
            .send()
            .map_err(|e| DispatchError::Http(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Status(status.as_u16()))
        }
    }
}

// ── Recording dispatcher (tests and dry runs) ────────────────────────────────

/// Keeps every URL it is given. Groups whose index is listed in `fail_on`
/// fail instead.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub fail_on: Vec<usize>,
    sent: Mutex<Vec<String>>,
    cancel_after: Option<(usize, CancelFlag)>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(indices: &[usize]) -> Self {
        RecordingDispatcher {
            fail_on: indices.to_vec(),
            ..Self::default()
        }
    }

    /// Sets `flag` once `count` requests have been attempted.
    pub fn cancelling_after(count: usize, flag: CancelFlag) -> Self {
        RecordingDispatcher {
            cancel_after: Some((count, flag)),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, request: &ImportRequest) -> Result<(), DispatchError> {
        let attempted = match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(request.url.clone());
                sent.len()
            }
            Err(_) => return Err(DispatchError::Open("recorder poisoned".to_string())),
        };
        if let Some((count, flag)) = &self.cancel_after {
            if attempted >= *count {
                flag.cancel();
            }
        }
        if self.fail_on.contains(&request.index) {
            return Err(DispatchError::Status(500));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBatchExporter;
    use chrono::NaiveDate;
    use kassensturz_core::{Amount, Transaction, TransactionBatch};

    fn batch(n: usize) -> TransactionBatch {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        TransactionBatch::new(
            "test",
            (0..n)
                .map(|i| Transaction::on_date(date, Amount::from(-1_i64), "CHF", format!("t{i}")))
                .collect(),
        )
    }

    fn exporter() -> RequestBatchExporter {
        RequestBatchExporter::default().with_pause(Duration::ZERO)
    }

    #[test]
    fn dispatches_every_group_in_order() {
        let b = batch(60);
        let recorder = RecordingDispatcher::new();
        let report = exporter().dispatch(&b, &recorder, &CancelFlag::new()).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.dispatched, 3);
        assert!(report.is_complete());

        let expected: Vec<String> = exporter()
            .dry_run(&b)
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(recorder.sent(), expected);
    }

    #[test]
    fn failure_does_not_stop_remaining_groups() {
        let recorder = RecordingDispatcher::failing_on(&[1]);
        let report = exporter().dispatch(&batch(75), &recorder, &CancelFlag::new()).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.failed, vec![(1, DispatchError::Status(500))]);
        assert_eq!(recorder.sent().len(), 3);
        assert!(!report.is_complete());
    }

    #[test]
    fn cancel_stops_before_next_group() {
        let flag = CancelFlag::new();
        let recorder = RecordingDispatcher::cancelling_after(2, flag.clone());
        let report = exporter().dispatch(&batch(100), &recorder, &flag).unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.dispatched, 2);
        assert!(report.cancelled);
        assert_eq!(recorder.sent().len(), 2);
    }

    #[test]
    fn already_cancelled_sends_nothing() {
        let flag = CancelFlag::new();
        flag.cancel();
        let recorder = RecordingDispatcher::new();
        let report = exporter().dispatch(&batch(10), &recorder, &flag).unwrap();
        assert_eq!(report.dispatched, 0);
        assert!(report.cancelled);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn empty_batch_dispatches_nothing() {
        let recorder = RecordingDispatcher::new();
        let report = exporter().dispatch(&batch(0), &recorder, &CancelFlag::new()).unwrap();
        assert_eq!(report, DispatchReport::new(0));
        assert!(report.is_complete());
    }

    #[test]
    fn wait_returns_early_when_cancelled() {
        let flag = CancelFlag::new();
        flag.cancel();
        let started = Instant::now();
        assert!(flag.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!CancelFlag::new().wait(Duration::from_millis(10)));
    }

    #[test]
    fn pause_is_applied_between_groups() {
        let recorder = RecordingDispatcher::new();
        let started = Instant::now();
        RequestBatchExporter::default()
            .with_pause(Duration::from_millis(50))
            .dispatch(&batch(51), &recorder, &CancelFlag::new())
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(recorder.sent().len(), 3);
    }

    #[test]
    fn http_dispatcher_reports_unreachable_host() {
        let http = HttpDispatcher::new(Some(Duration::from_millis(500))).unwrap();
        let request = ImportRequest {
            index: 0,
            transaction_count: 1,
            url: "http://127.0.0.1:9/addTransaction?JSON=%7B%7D".to_string(),
        };
        assert!(matches!(http.dispatch(&request), Err(DispatchError::Http(_))));
    }
}
