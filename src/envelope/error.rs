// ABOUTME: Error types for envelope encoding and decoding
// ABOUTME: Framing violations are fatal; there is no resynchronization

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Invalid envelope magic: expected '#~', found {found:?}")]
    BadMagic { found: [u8; 2] },

    #[error("Unsupported envelope version: expected 'DF02', found {found:?}")]
    BadVersion { found: [u8; 4] },

    #[error("Invalid envelope trailer: expected '~#', found {found:?}")]
    BadTrailer { found: [u8; 2] },

    #[error("Envelope metadata is not a valid JSON object: {0}")]
    InvalidMeta(#[from] serde_json::Error),

    #[error("Envelope section of {0} bytes exceeds the u32 length field")]
    Oversize(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
