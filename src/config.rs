//! Optional TOML defaults for upload runs; command-line flags win

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cli::Args;
use crate::retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::scheduler::DEFAULT_CONCURRENCY;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub concurrency: usize,
    pub include_hidden: bool,
    pub sync: bool,
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub timeout_secs: Option<u64>,
    pub flat: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            include_hidden: false,
            sync: false,
            retries: DEFAULT_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
            timeout_secs: None,
            flat: false,
        }
    }
}

impl UploadConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("Invalid config {}", path.display()))
    }
}

/// Effective options for a run after merging config file and flags
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub concurrency: usize,
    pub include_hidden: bool,
    pub sync: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub strict: bool,
    pub flat: bool,
    pub json: bool,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
}

impl Settings {
    pub fn resolve(args: &Args, config: &UploadConfig) -> Self {
        Self {
            concurrency: args.concurrency.unwrap_or(config.concurrency).max(1),
            include_hidden: args.all || config.include_hidden,
            sync: args.sync || config.sync,
            verbose: args.verbose,
            quiet: args.quiet,
            strict: args.strict,
            flat: args.flat || config.flat,
            json: args.json,
            retry: RetryPolicy::new(
                args.retries.unwrap_or(config.retries),
                Duration::from_secs(args.retry_delay.unwrap_or(config.retry_delay_secs)),
            ),
            timeout: args
                .timeout
                .or(config.timeout_secs)
                .map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: UploadConfig = toml::from_str("concurrency = 2\nsync = true\n").unwrap();
        assert_eq!(cfg.concurrency, 2);
        assert!(cfg.sync);
        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.retry_delay_secs, 10);
        assert_eq!(cfg.timeout_secs, None);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blitup.toml");
        std::fs::write(&path, "retries = 5\ntimeout_secs = 30\nflat = true\n").unwrap();
        let cfg = UploadConfig::load(&path).unwrap();
        assert_eq!(cfg.retries, 5);
        assert_eq!(cfg.timeout_secs, Some(30));
        assert!(cfg.flat);
    }

    #[test]
    fn bad_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "concurrency = \"many\"").unwrap();
        assert!(UploadConfig::load(&path).is_err());
        assert!(UploadConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cfg = UploadConfig {
            concurrency: 2,
            retries: 5,
            include_hidden: true,
            ..UploadConfig::default()
        };
        let args = Args::parse_from(["blitup", "-k", "16", "--retry-delay", "1", "http://h/", "dir"]);
        let s = Settings::resolve(&args, &cfg);
        assert_eq!(s.concurrency, 16);
        assert_eq!(s.retry, RetryPolicy::new(5, Duration::from_secs(1)));
        assert!(s.include_hidden);
        assert!(!s.sync);
    }

    #[test]
    fn defaults_without_flags() {
        let args = Args::parse_from(["blitup", "http://h/", "dir"]);
        let s = Settings::resolve(&args, &UploadConfig::default());
        assert_eq!(s.concurrency, 8);
        assert_eq!(s.retry, RetryPolicy::default());
        assert_eq!(s.timeout, None);
        assert!(!s.quiet && !s.verbose && !s.strict);
    }
}
