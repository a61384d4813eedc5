//! Destination URL templating and local root validation

use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

pub const UUID_PLACEHOLDER: &str = "[uuid]";

/// Replace every `[uuid]` in `url` with one fresh v4 UUID.
/// Returns the resolved URL and whether a substitution happened.
pub fn expand_uuid(url: &str) -> (String, bool) {
    expand_uuid_with(url, &Uuid::new_v4().to_string())
}

fn expand_uuid_with(url: &str, id: &str) -> (String, bool) {
    if url.contains(UUID_PLACEHOLDER) {
        (url.replace(UUID_PLACEHOLDER, id), true)
    } else {
        (url.to_string(), false)
    }
}

/// Lexically clean a path: drop `.` segments and fold `name/..` pairs.
/// Leading `..` segments of a relative path cannot be folded and are kept;
/// `..` directly under the root is dropped.
pub fn clean_path(p: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in p.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Clean a root argument and reject it if it still climbs out with `..`
pub fn validate_root(p: &Path) -> Result<PathBuf> {
    let cleaned = clean_path(p);
    if cleaned.components().any(|c| c == Component::ParentDir) {
        bail!("Invalid path: {}", p.display());
    }
    Ok(cleaned)
}

/// Base URL for the records of one root.
///
/// A directory root is uploaded under its own name (`url + name + "/"`)
/// unless `flat` is set; a file root's single record already carries the
/// file name, so `url` is used as-is.
pub fn base_url_for_root(url: &str, root: &Path, is_dir: bool, flat: bool) -> String {
    if !is_dir || flat {
        return url.to_string();
    }
    match root.file_name() {
        Some(name) => format!("{}{}/", url, name.to_string_lossy()),
        None => url.to_string(),
    }
}
