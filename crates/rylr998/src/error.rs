//! Driver error type.

use rylr998_protocol::ProtocolError;
use thiserror::Error;

/// Errors returned by driver operations.
///
/// Module-reported `+ERR` notifications are not errors of the operation that
/// happened to observe them; they are recorded and exposed through
/// [`RadioDriver::last_error`](crate::RadioDriver::last_error).
#[derive(Debug, Error)]
pub enum DriverError {
    /// No matching reply arrived within the command timeout.
    #[error("timeout waiting for reply to {command}")]
    Timeout {
        /// The command line that went unanswered.
        command: String,
    },

    /// A reply arrived with the expected tag but could not be parsed.
    #[error("unexpected reply to {command}: {source}")]
    PatternMismatch {
        /// The command line that was answered.
        command: String,
        /// What was wrong with the reply.
        #[source]
        source: ProtocolError,
    },

    /// A caller-supplied value was rejected before anything was sent.
    #[error("validation rejected: {0}")]
    Validation(#[from] ProtocolError),

    /// The underlying byte stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The liveness probe went unanswered on every attempt.
    #[error("module not responding after {attempts} attempts")]
    NotAvailable {
        /// Number of probes sent.
        attempts: u32,
    },
}

impl DriverError {
    /// Whether the error came from local validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, DriverError::Validation(_))
    }

    /// Whether the error was a reply timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;
