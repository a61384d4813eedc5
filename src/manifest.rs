use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::logger::Logger;
// Filesystem discovery: turns a root path into the sized list of uploads

/// One file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Forward-slash path relative to the walk root; appended to the base URL
    pub relative_name: String,
    pub source_path: PathBuf,
    /// Length at discovery time
    pub size: u64,
}

/// Ordered upload list for one root path.
///
/// Records keep directory-listing order. `total_bytes` always equals the sum
/// of the record sizes: the only ways to obtain a manifest are
/// [`build_manifest`] and collecting records, both of which sum as they go.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    records: Vec<TransferRecord>,
    total_bytes: u64,
    unreadable: u64,
}

impl Manifest {
    fn push(&mut self, record: TransferRecord) {
        self.total_bytes += record.size;
        self.records.push(record);
    }

    pub fn records(&self) -> &[TransferRecord] {
        &self.records
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of directories (or entries) that could not be read during the
    /// walk and were left out
    pub fn unreadable(&self) -> u64 {
        self.unreadable
    }
}

impl FromIterator<TransferRecord> for Manifest {
    fn from_iter<I: IntoIterator<Item = TransferRecord>>(iter: I) -> Self {
        let mut manifest = Manifest::default();
        for record in iter {
            manifest.push(record);
        }
        manifest
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().first() == Some(&b'.')
}

/// Join the components of `path` below `root` with '/'
fn relative_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// What the walk reports for one entry below the root
#[derive(Debug)]
enum WalkEvent {
    File { path: PathBuf, size: u64 },
    Symlink(PathBuf),
    Unreadable {
        context: &'static str,
        path: PathBuf,
        message: String,
    },
}

fn walk(root: &Path, include_hidden: bool) -> impl Iterator<Item = WalkEvent> + '_ {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        // Skip hidden entries entirely - this prevents walking into them
        .filter_entry(move |e| include_hidden || e.depth() == 0 || !is_hidden(e))
        .filter_map(move |entry| match entry {
            Err(e) => Some(WalkEvent::Unreadable {
                context: "read_dir",
                path: e.path().unwrap_or(root).to_path_buf(),
                message: e.to_string(),
            }),
            Ok(entry) if entry.file_type().is_symlink() => Some(WalkEvent::Symlink(entry.into_path())),
            Ok(entry) if entry.file_type().is_file() => Some(match entry.metadata() {
                Ok(metadata) => WalkEvent::File {
                    size: metadata.len(),
                    path: entry.into_path(),
                },
                Err(e) => WalkEvent::Unreadable {
                    context: "stat",
                    path: entry.into_path(),
                    message: e.to_string(),
                },
            }),
            Ok(_) => None,
        })
}

fn collect(root: &Path, events: impl IntoIterator<Item = WalkEvent>, logger: &dyn Logger) -> Manifest {
    let mut manifest = Manifest::default();
    for event in events {
        match event {
            WalkEvent::File { path, size } => manifest.push(TransferRecord {
                relative_name: relative_name(root, &path),
                source_path: path,
                size,
            }),
            WalkEvent::Symlink(path) => logger.symlink_skipped(&path),
            WalkEvent::Unreadable { context, path, message } => {
                logger.error(context, &path, &message);
                manifest.unreadable += 1;
            }
        }
    }
    manifest
}

/// Walk `root` and build its manifest.
///
/// Entries named with a leading '.' are pruned, subtree and all, unless
/// `include_hidden` is set; the root itself is never pruned. Symlinks are
/// neither followed nor uploaded; each one is reported through
/// [`Logger::symlink_skipped`]. A directory that cannot be listed is reported
/// to `logger` and its subtree is omitted; the walk carries on. Only a root
/// that cannot be stat'ed is an error.
pub fn build_manifest(root: &Path, include_hidden: bool, logger: &dyn Logger) -> Result<Manifest> {
    let root_meta =
        std::fs::metadata(root).with_context(|| format!("Couldn't read {}", root.display()))?;

    if root_meta.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        let mut manifest = Manifest::default();
        manifest.push(TransferRecord {
            relative_name: name,
            source_path: root.to_path_buf(),
            size: root_meta.len(),
        });
        return Ok(manifest);
    }

    Ok(collect(root, walk(root, include_hidden), logger))
}
