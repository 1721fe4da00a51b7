//! Custom error types for the collector.
//!
//! This module defines `MeterError`, the single error type shared by readers,
//! processors, storage back-ends and the meter loop. It is built with
//! `thiserror`; foreign errors are either wrapped with `#[from]` or mapped into a
//! string-carrying variant at the boundary where they occur.
//!
//! ## Failure kinds
//!
//! Every variant belongs to exactly one [`ErrorKind`]:
//!
//! - **`Exhaustion`**: a reader has no more samples. Always fatal to the meter loop.
//! - **`Transport`**: the serial device is unavailable or an I/O error occurred while
//!   reading from it.
//! - **`Storage`**: a file could not be written or the time-series database rejected
//!   the write or could not be reached.
//! - **`MalformedTelegram`**: the telegram decoder refused its input, or a field the
//!   processor needs is missing from the decoded telegram.
//! - **`Configuration`**: startup errors (bad settings, unknown meter name, a feature
//!   compiled out).
//!
//! Nothing in the crate retries. Errors propagate to the meter loop and from there
//! to the binary, which exits non-zero and leaves restarting to a supervisor.

use thiserror::Error;

/// Convenience alias for results using the collector error type.
pub type AppResult<T> = std::result::Result<T, MeterError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum MeterError {
    #[error("Reader exhausted: no more samples")]
    Exhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed telegram: {0}")]
    MalformedTelegram(String),

    #[error("Telegram checksum mismatch: footer says {expected:04X}, computed {computed:04X}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("Telegram is missing field {0}")]
    MissingField(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Unknown meter '{0}'")]
    UnknownMeter(String),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),

    #[error("'{0}' is not implemented")]
    NotImplemented(&'static str),
}

/// Coarse classification of a [`MeterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The reader has no further samples.
    Exhaustion,
    /// Serial device or stream failure.
    Transport,
    /// Persisting a measurement failed.
    Storage,
    /// The telegram could not be decoded or lacks a required field.
    MalformedTelegram,
    /// Startup / wiring problem.
    Configuration,
}

impl MeterError {
    /// Returns the failure kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeterError::Exhausted => ErrorKind::Exhaustion,
            MeterError::Io(_) | MeterError::Transport(_) => ErrorKind::Transport,
            #[cfg(feature = "instrument_serial")]
            MeterError::Serial(_) => ErrorKind::Transport,
            MeterError::Storage(_) => ErrorKind::Storage,
            MeterError::MalformedTelegram(_)
            | MeterError::ChecksumMismatch { .. }
            | MeterError::MissingField(_) => ErrorKind::MalformedTelegram,
            MeterError::Config(_)
            | MeterError::Configuration(_)
            | MeterError::UnknownMeter(_)
            | MeterError::FeatureNotEnabled(_)
            | MeterError::NotImplemented(_) => ErrorKind::Configuration,
        }
    }

    /// True when the error signals reader exhaustion.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, MeterError::Exhausted)
    }
}
