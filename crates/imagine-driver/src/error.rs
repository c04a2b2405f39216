//! Error types for IMAGine driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for IMAGine operations
pub type Result<T> = std::result::Result<T, ImagineError>;

/// Errors that can occur while driving the engine
#[derive(Debug, Error)]
pub enum ImagineError {
    /// Transposer window wider than one PE block
    #[error("Window of {len} values exceeds {max} lanes per block")]
    WindowTooWide {
        /// Values passed in
        len: usize,
        /// Lanes per block
        max: usize,
    },

    /// Vector register index has no BRAM image
    #[error("Vector register {register} out of range (engine has {max} registers)")]
    RegisterOutOfRange {
        /// Requested register
        register: usize,
        /// Number of registers
        max: usize,
    },

    /// Vector needs more block columns than a select word can address
    #[error("Vector spans {windows} blocks but only {max} are addressable")]
    VectorTooLong {
        /// Windows required
        windows: usize,
        /// Addressable blocks
        max: usize,
    },

    /// Lane value needs more bits than a vector register holds
    #[error("Value {value} at index {index} does not fit a {reg_width}-bit register")]
    ValueOutOfRange {
        /// Position in the vector
        index: usize,
        /// Offending value
        value: i16,
        /// Register width in bits
        reg_width: usize,
    },

    /// Engine geometry rejected
    #[error("Invalid engine parameters: {reason}")]
    InvalidParams {
        /// Reason for rejection
        reason: String,
    },

    /// Program assembled for a different engine configuration
    #[error("Program incompatible with engine: {reason}")]
    ProgramMismatch {
        /// Reason for mismatch
        reason: String,
    },

    /// Bounded wait expired
    #[error("Timed out waiting for {waiting_for} after {attempts} polls")]
    Timeout {
        /// Status condition being waited on
        waiting_for: &'static str,
        /// Number of status reads performed
        attempts: u64,
    },

    /// Program listing could not be parsed
    #[error("Program listing line {line}: {reason}")]
    ProgramParse {
        /// 1-based line number (0 for binary listings)
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// Register window could not be mapped
    #[error("Cannot map register window at {path}: {reason}")]
    Mapping {
        /// Device node
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl ImagineError {
    /// Create a program mismatch error
    pub fn program_mismatch(reason: impl Into<String>) -> Self {
        Self::ProgramMismatch {
            reason: reason.into(),
        }
    }

    /// Create a listing parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::ProgramParse {
            line,
            reason: reason.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<imagine_chip::ParamsError> for ImagineError {
    fn from(e: imagine_chip::ParamsError) -> Self {
        Self::InvalidParams {
            reason: e.to_string(),
        }
    }
}
