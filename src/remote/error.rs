// ABOUTME: Error types for serving the remote unit protocol
// ABOUTME: Covers transport faults around the never-failing command handler

use thiserror::Error;

use crate::envelope::EnvelopeError;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request handler aborted: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
