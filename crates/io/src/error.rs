use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::format::ScanFormat;

/// Why one decoder could not produce a point cloud.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("LAS decoder: {0}")]
    Las(#[from] las::Error),
    #[error("E57 decoder: {0}")]
    E57(#[from] e57::Error),
    #[error("{0}")]
    Malformed(String),
    #[error("unsupported {0}")]
    Unsupported(String),
    #[error("no scans in container")]
    NoScans,
    #[error("decoder produced no points")]
    Empty,
    #[error("file signature does not match")]
    SignatureMismatch,
}

/// One failed attempt recorded while probing a file of unknown format.
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub error: DecodeError,
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("invalid path: the path is empty")]
    InvalidPath,
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("expected a file path but {} is a directory", .0.display())]
    IsDirectory(PathBuf),
    #[error("cannot read {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {format} file {}", .path.display())]
    Decode {
        format: ScanFormat,
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error("no scans in container {}", .0.display())]
    NoScans(PathBuf),
    #[error(
        "unsupported extension '{extension}' for {path:?}; supported: {supported}. \
         If the extension is empty the file was likely stored without its original suffix. \
         Tried: {}",
        summarize(.attempts),
        supported = ScanFormat::SUPPORTED
    )]
    Undetected {
        extension: String,
        path: PathBuf,
        attempts: Vec<StrategyFailure>,
    },
}

fn summarize(attempts: &[StrategyFailure]) -> String {
    let mut out = String::new();
    for (i, attempt) in attempts.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{} ({})", attempt.strategy, attempt.error);
    }
    out
}
