//! Error taxonomy for the translation pipeline.
//!
//! Every stage reports failures through `anyhow::Result`, but the root cause is
//! always one of the typed errors below so callers (and tests) can recover the
//! category with `downcast_ref::<TranslateError>()`.

use thiserror::Error;

/// Broad category of a translation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed bitstream: bad magic, unaligned read, EOF, illegal abbreviation.
    Format,
    /// Well-formed bitstream whose content cannot be decoded into the typed module.
    Semantic,
    /// Decoded module that falls outside the lowered instruction subset.
    Lowering,
    /// Malformed structuring text.
    Grammar,
}

/// Main error type for the translator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("format error at bit {bit_offset}: {reason}")]
    Format { bit_offset: u64, reason: String },

    #[error("semantic error: {reason}")]
    Semantic { reason: String },

    #[error("unsupported opcode {code} ({name})")]
    UnsupportedOpcode { code: u64, name: &'static str },

    #[error("lowering error: {reason}")]
    Lowering { reason: String },

    #[error("shape grammar error at {position}: {reason}")]
    Grammar { position: usize, reason: String },
}

impl TranslateError {
    pub fn format(bit_offset: u64, reason: impl Into<String>) -> Self {
        TranslateError::Format {
            bit_offset,
            reason: reason.into(),
        }
    }

    pub fn semantic(reason: impl Into<String>) -> Self {
        TranslateError::Semantic {
            reason: reason.into(),
        }
    }

    pub fn lowering(reason: impl Into<String>) -> Self {
        TranslateError::Lowering {
            reason: reason.into(),
        }
    }

    pub fn grammar(position: usize, reason: impl Into<String>) -> Self {
        TranslateError::Grammar {
            position,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslateError::Format { .. } => ErrorKind::Format,
            TranslateError::Semantic { .. } | TranslateError::UnsupportedOpcode { .. } => {
                ErrorKind::Semantic
            }
            TranslateError::Lowering { .. } => ErrorKind::Lowering,
            TranslateError::Grammar { .. } => ErrorKind::Grammar,
        }
    }
}

/// Find the typed root cause of an `anyhow` error, skipping context layers.
pub fn root_translate_error(err: &anyhow::Error) -> Option<&TranslateError> {
    err.chain().find_map(|e| e.downcast_ref::<TranslateError>())
}
