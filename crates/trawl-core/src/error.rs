use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Fatal failures of a single artifact decode.
///
/// These abort the current artifact and surface to the caller, who moves on
/// to the next evidence file. Soft conditions (unsupported versions, failed
/// embedded sub-decodes) are never errors; they travel as [`crate::diag::Diagnostic`]
/// values alongside the decoded record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("buffer underrun at byte {at}, need {needed} more bytes")]
    BufferUnderrun { at: usize, needed: usize },

    #[error("limit exceeded for {field}: {value} > {max}")]
    LimitExceeded {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },

    #[error("invalid offset {offset} for seek (size {size})")]
    InvalidSeek { offset: usize, size: usize },
}
