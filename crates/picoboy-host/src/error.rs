use std::io;
use std::path::PathBuf;

use picoboy_core::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("failed to read ROM {path}: {source}")]
    RomRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("audio device: {0}")]
    AudioDevice(String),
    #[error("failed to start console reader: {0}")]
    Console(#[source] io::Error),
    #[error("failed to write snapshot {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
