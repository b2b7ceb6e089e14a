use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DecoderAttempt {
    pub decoder: &'static str,
    pub message: String,
}

impl DecoderAttempt {
    pub fn new(decoder: &'static str, message: impl Into<String>) -> Self {
        Self {
            decoder,
            message: message.into(),
        }
    }
}

impl fmt::Display for DecoderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.decoder, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{decoder} format mismatch: {reason}")]
    FormatMismatch {
        decoder: &'static str,
        reason: String,
    },

    #[error("{decoder} could not determine float/profile identity: {message}")]
    MissingIdentity {
        decoder: &'static str,
        message: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{decoder} failed to assemble observation frame: {source}")]
    Frame {
        decoder: &'static str,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("no decoder recognized this transmission; attempts: {attempts:?}")]
    NoMatchingDecoder { attempts: Vec<DecoderAttempt> },
}
