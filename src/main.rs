//! Blitup - bulk directory upload over HTTP PUT
//!
//! Design goals:
//! - One PUT per file, a fixed number in flight
//! - A failed file never stops the rest of the run
//! - Progress stays accurate under concurrent updates

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blitup::cli::Args;
use blitup::config::{Settings, UploadConfig};
use blitup::logger::{ConsoleLogger, Logger, TeeLogger, TextLogger};
use blitup::manifest::build_manifest;
use blitup::progress::{NoopSink, ProgressSink, ProgressState, UploadProgress};
use blitup::scheduler::{RunSummary, Scheduler};
use blitup::transfer::{http_client, HttpUploader};
use blitup::url::{base_url_for_root, expand_uuid, validate_root};

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    let args = Args::parse();

    let (raw_url, raw_paths) = match (args.url(), args.paths()) {
        (Some(url), paths) if !paths.is_empty() => (url.to_string(), paths.to_vec()),
        _ => {
            let _ = Args::command().print_help();
            std::process::exit(1);
        }
    };

    let config = match args.config {
        Some(ref p) => UploadConfig::load(p)?,
        None => UploadConfig::default(),
    };
    let settings = Settings::resolve(&args, &config);

    let (url, substituted) = expand_uuid(&raw_url);
    if substituted {
        println!("{}", url);
    }

    // Validate every root before the first byte goes out
    let mut roots: Vec<(PathBuf, bool)> = Vec::with_capacity(raw_paths.len());
    for raw in &raw_paths {
        let root = validate_root(Path::new(raw))?;
        let meta = std::fs::metadata(&root).with_context(|| format!("Couldn't read {}", root.display()))?;
        roots.push((root, meta.is_dir()));
    }

    let console = Arc::new(ConsoleLogger::new(settings.quiet));
    let logger = build_logger(&args, Arc::clone(&console))?;
    let client = http_client(settings.timeout)?;
    let scheduler = Scheduler::new(settings.concurrency, settings.retry).with_logger(Arc::clone(&logger));

    let mut any_failures = false;
    for (root, is_dir) in &roots {
        let base_url = base_url_for_root(&url, root, *is_dir, settings.flat);
        logger.start(root, &base_url);

        let manifest = build_manifest(root, settings.include_hidden, &*logger)
            .with_context(|| format!("Failed to enumerate {}", root.display()))?;
        let uploader = HttpUploader::new(client.clone(), base_url, settings.sync, Arc::clone(&logger));

        let progress = Arc::new(ProgressState::for_manifest(&manifest));
        let display = (!settings.quiet).then(|| UploadProgress::start(Arc::clone(&progress), settings.verbose));
        let sink: &dyn ProgressSink = match display {
            Some(ref d) => {
                console.attach(d.bar());
                d as &dyn ProgressSink
            }
            None => &NoopSink,
        };

        let summary = scheduler.run(&manifest, &uploader, &progress, sink);
        if let Some(ref d) = display {
            d.finish();
            console.detach();
        }

        report(root, &summary, &settings)?;
        any_failures |= summary.has_failures();
    }

    if settings.strict && any_failures {
        std::process::exit(2);
    }
    Ok(())
}

/// Console diagnostics, plus a text log when `--log-file` is given
fn build_logger(args: &Args, console: Arc<ConsoleLogger>) -> Result<Arc<dyn Logger>> {
    let console: Arc<dyn Logger> = console;
    match args.log_file {
        Some(ref p) => {
            let file: Arc<dyn Logger> = Arc::new(TextLogger::new(p)?);
            Ok(Arc::new(TeeLogger::new(vec![console, file])))
        }
        None => Ok(console),
    }
}

fn report(root: &Path, summary: &RunSummary, settings: &Settings) -> Result<()> {
    if settings.json {
        println!("{}", serde_json::to_string(summary).context("Failed to encode summary")?);
        return Ok(());
    }
    if settings.quiet {
        return Ok(());
    }

    println!();
    println!("=== Upload Complete: {} ===", root.display());
    println!(
        "Files uploaded: {} of {}",
        summary.files_succeeded - summary.files_skipped,
        summary.files_total
    );
    if summary.files_skipped > 0 {
        println!("Files already present: {}", summary.files_skipped);
    }
    println!(
        "Total size: {:.2} MB",
        summary.bytes_transferred as f64 / 1_048_576.0
    );
    println!("Time: {:.2}s", summary.elapsed_secs);
    println!("Throughput: {:.2} MB/s", summary.throughput());
    if summary.files_failed > 0 {
        println!("Failed files: {}", summary.files_failed);
    }
    if summary.unreadable > 0 {
        println!("Unreadable directories skipped: {}", summary.unreadable);
    }
    Ok(())
}
