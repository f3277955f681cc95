use thiserror::Error;

pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;

/// Errors raised while decoding graphics or forms streams.
///
/// None of these abort a whole run by themselves: the walkers decide, based on
/// [`DeserializationError::is_recoverable`], whether to resume at the next known boundary.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("buffer too small for {what} at offset {offset} (need {need} bytes, have {have})")]
    OutOfBounds {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("unexpected {what} at offset {offset}: expected {expected}, found {found:#x}")]
    StructuralMismatch {
        what: &'static str,
        offset: u64,
        expected: &'static str,
        found: u64,
    },

    #[error("invalid {what} at offset {offset}: {message}")]
    SchemaViolation {
        what: &'static str,
        offset: u64,
        message: String,
    },

    #[error("refusing to seek backwards while reading {what} (from {from} to {to})")]
    InvalidSeek {
        what: &'static str,
        from: u64,
        to: u64,
    },

    #[error("failed to decode {what} as {encoding} string: {message}")]
    FailedToDecodeAnsiString {
        what: &'static str,
        encoding: &'static str,
        message: String,
    },
}

impl DeserializationError {
    pub(crate) fn out_of_bounds(what: &'static str, offset: usize, need: usize, len: usize) -> Self {
        DeserializationError::OutOfBounds {
            what,
            offset: offset as u64,
            need,
            have: len.saturating_sub(offset),
        }
    }

    pub(crate) fn mismatch(
        what: &'static str,
        offset: usize,
        expected: &'static str,
        found: impl Into<u64>,
    ) -> Self {
        DeserializationError::StructuralMismatch {
            what,
            offset: offset as u64,
            expected,
            found: found.into(),
        }
    }

    pub(crate) fn schema(what: &'static str, offset: usize, message: impl Into<String>) -> Self {
        DeserializationError::SchemaViolation {
            what,
            offset: offset as u64,
            message: message.into(),
        }
    }

    /// Whether a walker that knows an authoritative outer boundary may resume after this error.
    ///
    /// Backward seeks indicate a bookkeeping bug rather than hostile input, so they are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DeserializationError::InvalidSeek { .. })
    }

    /// Absolute offset the error was raised at, when known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            DeserializationError::OutOfBounds { offset, .. }
            | DeserializationError::StructuralMismatch { offset, .. }
            | DeserializationError::SchemaViolation { offset, .. } => Some(*offset),
            DeserializationError::InvalidSeek { from, .. } => Some(*from),
            DeserializationError::FailedToDecodeAnsiString { .. } => None,
        }
    }
}
