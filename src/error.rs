use std::path::PathBuf;

use thiserror::Error;

use crate::shader::Stage;

/// Startup failures. Every variant is fatal; the frame loop itself never fails.
#[derive(Debug, Error)]
pub enum VisualiserError {
    #[error("failed to read shader source {}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open asset {}", path.display())]
    AssetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    AssetMalformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to decode audio {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("failed to compile {stage} shader:\n{log}")]
    Compile { stage: Stage, log: String },

    #[error("failed to link shader program:\n{log}")]
    Link { log: String },

    #[error("failed to initialise {0}")]
    ContextInit(String),
}

pub type Result<T> = std::result::Result<T, VisualiserError>;
