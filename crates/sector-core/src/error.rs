use thiserror::Error;

pub type SectorResult<T> = Result<T, SectorError>;

/// Precondition and configuration failures.
///
/// Every check happens before a mode writes any output byte, so a failed
/// call leaves the destination buffer untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SectorError {
    #[error("{mode} needs at least {minimum} block(s), got {actual}")]
    InvalidBlockCount {
        mode: &'static str,
        minimum: usize,
        actual: usize,
    },

    #[error("unsupported tag size: {0} bits (expected 64 or 128)")]
    InvalidTagSize(u32),

    #[error("buffer length {length} is not a multiple of the {block_size}-byte block size")]
    InvalidBufferLength { length: usize, block_size: usize },

    #[error("output buffer is {output} bytes but input is {input} bytes")]
    LengthMismatch { input: usize, output: usize },

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SectorError {
    fn from(err: std::io::Error) -> Self {
        SectorError::Io(err.to_string())
    }
}
