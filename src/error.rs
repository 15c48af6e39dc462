// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestreamerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GStreamer error: {0}")]
    GStreamer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Router authentication failed: {0}")]
    AuthFailed(String),

    #[error("Reachability check failed: {0}")]
    Unreachable(String),

    #[error("Source '{name}' failed to open: {reason}")]
    SourceOpenFailed { name: String, reason: String },

    #[error("Sink '{name}' failed to spawn encoder: {reason}")]
    SinkSpawnFailed { name: String, reason: String },

    #[error("Router probe failed: {0}")]
    ProbeFailed(String),

    #[error("Invalid ladder: {0}")]
    BadLadder(String),
}

pub type Result<T> = std::result::Result<T, RestreamerError>;
