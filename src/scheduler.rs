//! Bounded fan-out of a manifest over a fixed pool of upload workers

use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::logger::{Logger, NoopLogger};
use crate::manifest::{Manifest, TransferRecord};
use crate::progress::{FileProgress, ProgressSink, ProgressState};
use crate::retry::RetryPolicy;
use crate::transfer::{Transfer, TransferOutcome};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Totals for one finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub files_total: u64,
    pub files_completed: u64,
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub bytes_total: u64,
    pub bytes_transferred: u64,
    /// Directories left out of the manifest because they could not be read
    pub unreadable: u64,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.files_failed > 0 || self.unreadable > 0
    }

    /// MB/s over the whole run
    pub fn throughput(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.bytes_transferred as f64 / 1_048_576.0 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

pub struct Scheduler {
    concurrency: usize,
    retry: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, RetryPolicy::default())
    }
}

impl Scheduler {
    pub fn new(concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            retry,
            logger: Arc::new(NoopLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Upload every record of `manifest` and wait for all of them.
    ///
    /// At most `concurrency` records are in flight; each worker holds its slot
    /// for the whole retry sequence of a record, backoff included. Records are
    /// handed out in manifest order, completions interleave freely. A failed
    /// record never stops the others and is still counted as completed.
    pub fn run(
        &self,
        manifest: &Manifest,
        executor: &dyn Transfer,
        progress: &Arc<ProgressState>,
        sink: &dyn ProgressSink,
    ) -> RunSummary {
        let start = Instant::now();
        let records = manifest.records();
        let next = AtomicUsize::new(0);
        let workers = self.concurrency.min(records.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    let Some(record) = records.get(idx) else {
                        break;
                    };
                    self.process(record, executor, progress, sink);
                });
            }
        });

        let snap = progress.snapshot();
        let summary = RunSummary {
            files_total: snap.files_total,
            files_completed: snap.files_completed,
            files_succeeded: snap.files_completed - snap.files_failed,
            files_failed: snap.files_failed,
            files_skipped: snap.files_skipped,
            bytes_total: snap.bytes_total,
            bytes_transferred: snap.bytes_transferred,
            unreadable: manifest.unreadable(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        self.logger.done(
            summary.files_completed,
            summary.files_failed,
            summary.bytes_transferred,
            summary.elapsed_secs,
        );
        summary
    }

    fn process(
        &self,
        record: &TransferRecord,
        executor: &dyn Transfer,
        progress: &Arc<ProgressState>,
        sink: &dyn ProgressSink,
    ) {
        progress.set_current_file(&record.relative_name);
        sink.file_started(record);

        let file_progress = FileProgress::new(Arc::clone(progress));
        let outcome = self.retry.attempt(record, &*self.logger, |_| {
            // A panicking executor costs one attempt, not the whole run
            panic::catch_unwind(AssertUnwindSafe(|| executor.transfer(record, &file_progress)))
                .unwrap_or_else(|p| TransferOutcome::failed(panic_message(p)))
        });

        progress.increment_files_completed();
        if !outcome.succeeded {
            progress.record_failure();
        } else if outcome.skipped {
            progress.record_skip();
        }
        sink.file_finished(record, &outcome);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("upload panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("upload panicked: {s}")
    } else {
        "upload panicked".to_string()
    }
}
