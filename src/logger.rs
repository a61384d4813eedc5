use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Event log for an upload run. Every method defaults to a no-op so sinks
/// only implement what they care about.
pub trait Logger: Send + Sync {
    fn start(&self, _root: &Path, _url: &str) {}
    fn upload_done(&self, _url: &str, _bytes: u64) {}
    fn skipped(&self, _url: &str, _bytes: u64) {}
    fn symlink_skipped(&self, _path: &Path) {}
    fn retry(&self, _name: &str, _attempt: u32, _msg: &str) {}
    fn error(&self, _context: &str, _path: &Path, _msg: &str) {}
    fn done(&self, _files: u64, _failed: u64, _bytes: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Append-only text log with one timestamped line per event
pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("Failed to open log file {}", path.as_ref().display()))?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn start(&self, root: &Path, url: &str) {
        self.line(&format!("START root={} url={}", root.display(), url));
    }
    fn upload_done(&self, url: &str, bytes: u64) {
        self.line(&format!("PUT url={} bytes={}", url, bytes));
    }
    fn skipped(&self, url: &str, bytes: u64) {
        self.line(&format!("SKIP url={} bytes={}", url, bytes));
    }
    fn symlink_skipped(&self, path: &Path) {
        self.line(&format!("SKIP-LINK path={}", path.display()));
    }
    fn retry(&self, name: &str, attempt: u32, msg: &str) {
        self.line(&format!("RETRY name={} attempt={} msg={}", name, attempt, msg));
    }
    fn error(&self, context: &str, path: &Path, msg: &str) {
        self.line(&format!("ERROR ctx={} path={} msg={}", context, path.display(), msg));
    }
    fn done(&self, files: u64, failed: u64, bytes: u64, seconds: f64) {
        self.line(&format!(
            "DONE files={files} failed={failed} bytes={bytes} seconds={seconds:.3}"
        ));
    }
}

/// Operator-facing diagnostics on stderr. Only failures and skipped
/// symlinks are reported here; successful uploads are shown by the progress
/// display instead. While a bar is attached, lines are written with the bar
/// suspended so they do not tear it.
pub struct ConsoleLogger {
    quiet: bool,
    bar: parking_lot::Mutex<Option<ProgressBar>>,
    out: parking_lot::Mutex<Box<dyn Write + Send>>,
}

impl ConsoleLogger {
    pub fn new(quiet: bool) -> Self {
        Self::with_writer(quiet, Box::new(io::stderr()))
    }

    pub fn with_writer(quiet: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            quiet,
            bar: parking_lot::Mutex::new(None),
            out: parking_lot::Mutex::new(out),
        }
    }

    /// Route output around `bar` until [`ConsoleLogger::detach`]
    pub fn attach(&self, bar: &ProgressBar) {
        *self.bar.lock() = Some(bar.clone());
    }

    pub fn detach(&self) {
        self.bar.lock().take();
    }

    fn emit(&self, line: &str) {
        if self.quiet {
            return;
        }
        let write = || {
            let mut out = self.out.lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        };
        let bar = self.bar.lock().clone();
        match bar {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }
}

impl Logger for ConsoleLogger {
    fn symlink_skipped(&self, path: &Path) {
        self.emit(&format!("Skipping symlink {}", path.display()));
    }
    fn retry(&self, name: &str, attempt: u32, msg: &str) {
        self.emit(&format!("attempt {} failed for {}: {}", attempt, name, msg));
    }
    fn error(&self, context: &str, path: &Path, msg: &str) {
        self.emit(&format!("Error {} {}: {}", context, path.display(), msg));
    }
}

/// Forwards every event to each inner logger in order
pub struct TeeLogger {
    inner: Vec<Arc<dyn Logger>>,
}

impl TeeLogger {
    pub fn new(inner: Vec<Arc<dyn Logger>>) -> Self {
        Self { inner }
    }
}

impl Logger for TeeLogger {
    fn start(&self, root: &Path, url: &str) {
        self.inner.iter().for_each(|l| l.start(root, url));
    }
    fn upload_done(&self, url: &str, bytes: u64) {
        self.inner.iter().for_each(|l| l.upload_done(url, bytes));
    }
    fn skipped(&self, url: &str, bytes: u64) {
        self.inner.iter().for_each(|l| l.skipped(url, bytes));
    }
    fn symlink_skipped(&self, path: &Path) {
        self.inner.iter().for_each(|l| l.symlink_skipped(path));
    }
    fn retry(&self, name: &str, attempt: u32, msg: &str) {
        self.inner.iter().for_each(|l| l.retry(name, attempt, msg));
    }
    fn error(&self, context: &str, path: &Path, msg: &str) {
        self.inner.iter().for_each(|l| l.error(context, path, msg));
    }
    fn done(&self, files: u64, failed: u64, bytes: u64, seconds: f64) {
        self.inner
            .iter()
            .for_each(|l| l.done(files, failed, bytes, seconds));
    }
}
