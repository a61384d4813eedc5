//! Blitup Library
//!
//! Bulk directory upload over HTTP: discovery, bounded concurrent PUTs,
//! per-file retry and shared progress accounting

pub mod cli;
pub mod config;
pub mod logger;
pub mod manifest;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod transfer;
pub mod url;
