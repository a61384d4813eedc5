//! Upload progress accounting and the terminal progress bar
//!
//! `ProgressState` is the shared counter block every worker updates; the bar
//! is just one consumer polling its snapshots.

use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::manifest::{Manifest, TransferRecord};
use crate::transfer::TransferOutcome;

/// Counters for one manifest run, shared by all workers
#[derive(Debug, Default)]
pub struct ProgressState {
    files_completed: AtomicU64,
    bytes_transferred: AtomicU64,
    files_total: u64,
    bytes_total: u64,
    files_failed: AtomicU64,
    files_skipped: AtomicU64,
    current_file: Mutex<String>,
}

/// Point-in-time copy of [`ProgressState`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub files_completed: u64,
    pub bytes_transferred: u64,
    pub files_total: u64,
    pub bytes_total: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub current_file: String,
}

impl ProgressState {
    pub fn new(files_total: u64, bytes_total: u64) -> Self {
        Self {
            files_total,
            bytes_total,
            ..Self::default()
        }
    }

    pub fn for_manifest(manifest: &Manifest) -> Self {
        Self::new(manifest.len() as u64, manifest.total_bytes())
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_transferred.fetch_add(n, Ordering::SeqCst);
    }

    pub fn increment_files_completed(&self) {
        self.files_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_skip(&self) {
        self.files_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set_current_file(&self, name: &str) {
        let mut current = self.current_file.lock();
        current.clear();
        current.push_str(name);
    }

    pub fn files_total(&self) -> u64 {
        self.files_total
    }

    pub fn bytes_total(&self) -> u64 {
        self.bytes_total
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_completed: self.files_completed.load(Ordering::SeqCst),
            bytes_transferred: self.bytes_transferred.load(Ordering::SeqCst),
            files_total: self.files_total,
            bytes_total: self.bytes_total,
            files_failed: self.files_failed.load(Ordering::SeqCst),
            files_skipped: self.files_skipped.load(Ordering::SeqCst),
            current_file: self.current_file.lock().clone(),
        }
    }
}

/// Byte credit for a single file across all of its attempts.
///
/// Offsets are high-water marks: a retry that re-reads the first bytes of a
/// file does not count them a second time, while partial progress from a
/// failed attempt stays counted.
#[derive(Debug)]
pub struct FileProgress {
    state: Arc<ProgressState>,
    credited: AtomicU64,
}

impl FileProgress {
    pub fn new(state: Arc<ProgressState>) -> Arc<Self> {
        Arc::new(Self {
            state,
            credited: AtomicU64::new(0),
        })
    }

    /// Credit everything up to `offset` bytes into the file
    pub fn advance_to(&self, offset: u64) {
        let prev = self.credited.fetch_max(offset, Ordering::SeqCst);
        if offset > prev {
            self.state.add_bytes(offset - prev);
        }
    }

    pub fn credited(&self) -> u64 {
        self.credited.load(Ordering::SeqCst)
    }
}

/// `Read` adapter that reports every byte pulled through it
pub struct ProgressReader<R> {
    inner: R,
    offset: u64,
    progress: Arc<FileProgress>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, progress: Arc<FileProgress>) -> Self {
        Self {
            inner,
            offset: 0,
            progress,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.offset += n as u64;
            self.progress.advance_to(self.offset);
        }
        Ok(n)
    }
}

/// Per-file notifications from the scheduler to a display
pub trait ProgressSink: Send + Sync {
    fn file_started(&self, _record: &TransferRecord) {}
    fn file_finished(&self, _record: &TransferRecord, _outcome: &TransferOutcome) {}
}

pub struct NoopSink;
impl ProgressSink for NoopSink {}

/// Byte progress bar refreshed from a [`ProgressState`] by a heartbeat thread
pub struct UploadProgress {
    bar: ProgressBar,
    show_files: bool,
    running: Arc<AtomicBool>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl UploadProgress {
    pub fn start(state: Arc<ProgressState>, show_files: bool) -> Self {
        let bar = ProgressBar::new(state.bytes_total());
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let running = Arc::new(AtomicBool::new(true));
        let hb_running = Arc::clone(&running);
        let hb_bar = bar.clone();
        let heartbeat = thread::spawn(move || {
            while hb_running.load(Ordering::SeqCst) {
                refresh(&hb_bar, &state.snapshot());
                thread::sleep(Duration::from_millis(100));
            }
            refresh(&hb_bar, &state.snapshot());
        });

        Self {
            bar,
            show_files,
            running,
            heartbeat: Mutex::new(Some(heartbeat)),
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    /// Stop the heartbeat and leave the final state on screen
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.heartbeat.lock().take() {
            let _ = h.join();
        }
        self.bar.finish();
    }
}

fn refresh(bar: &ProgressBar, snap: &ProgressSnapshot) {
    bar.set_position(snap.bytes_transferred.min(snap.bytes_total));
    bar.set_message(format!(
        "{}/{} {}",
        snap.files_completed, snap.files_total, snap.current_file
    ));
}

impl ProgressSink for UploadProgress {
    fn file_finished(&self, record: &TransferRecord, outcome: &TransferOutcome) {
        if !self.show_files {
            return;
        }
        let (label, color) = if !outcome.succeeded {
            ("Failed", Color::Red)
        } else if outcome.skipped {
            ("Skipped", Color::Yellow)
        } else {
            ("Uploaded", Color::Green)
        };
        self.bar.println(format!(
            "  {} {}",
            label.with(color).bold(),
            record.source_path.display().to_string().with(Color::Cyan)
        ));
    }
}

impl Drop for UploadProgress {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.heartbeat.get_mut().take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let state = ProgressState::new(2, 30);
        state.add_bytes(10);
        state.add_bytes(20);
        state.increment_files_completed();
        state.record_failure();
        state.set_current_file("sub/b.txt");

        let snap = state.snapshot();
        assert_eq!(snap.bytes_transferred, 30);
        assert_eq!(snap.files_completed, 1);
        assert_eq!(snap.files_failed, 1);
        assert_eq!(snap.files_total, 2);
        assert_eq!(snap.current_file, "sub/b.txt");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let state = Arc::new(ProgressState::new(800, 0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.add_bytes(3);
                        s.increment_files_completed();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = state.snapshot();
        assert_eq!(snap.files_completed, 800);
        assert_eq!(snap.bytes_transferred, 2400);
    }

    #[test]
    fn reader_counts_bytes_once_across_retries() {
        let state = Arc::new(ProgressState::new(1, 10));
        let file = FileProgress::new(Arc::clone(&state));
        let data = vec![7u8; 10];

        // First attempt dies after 4 bytes
        let mut first = ProgressReader::new(&data[..4], Arc::clone(&file));
        io::copy(&mut first, &mut io::sink()).unwrap();
        assert_eq!(state.snapshot().bytes_transferred, 4);

        // Second attempt streams the whole file again
        let mut second = ProgressReader::new(&data[..], Arc::clone(&file));
        io::copy(&mut second, &mut io::sink()).unwrap();
        assert_eq!(state.snapshot().bytes_transferred, 10);
        assert_eq!(file.credited(), 10);
    }

    #[test]
    fn advance_never_goes_backwards() {
        let state = Arc::new(ProgressState::new(1, 100));
        let file = FileProgress::new(Arc::clone(&state));
        file.advance_to(60);
        file.advance_to(20);
        file.advance_to(100);
        assert_eq!(state.snapshot().bytes_transferred, 100);
    }
}
