//! Error types for the AT command protocol.

use thiserror::Error;

/// Errors that can occur when encoding commands or decoding replies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A reply line carried the expected tag but its value did not parse.
    #[error("failed to parse reply: {0}")]
    Parse(String),

    /// A caller-supplied value is outside the range the module accepts.
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        /// Name of the field being validated.
        field: &'static str,
        /// The rejected value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },

    /// Payload exceeds the module's maximum transmission unit.
    #[error("payload too long: max {max} bytes, got {actual}")]
    PayloadTooLong {
        /// Maximum payload length.
        max: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// A frame was received that does not answer the pending command.
    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        /// Description of the expected reply.
        expected: String,
        /// The line that was received.
        got: String,
    },
}

impl ProtocolError {
    /// Build a range check failure.
    pub fn out_of_range(field: &'static str, value: i64, min: i64, max: i64) -> Self {
        ProtocolError::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// Build a parse failure.
    pub fn parse(msg: impl Into<String>) -> Self {
        ProtocolError::Parse(msg.into())
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Check that `value` lies in `min..=max`, reporting `field` on failure.
pub(crate) fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> ProtocolResult<()> {
    if value < min || value > max {
        return Err(ProtocolError::out_of_range(field, value, min, max));
    }
    Ok(())
}
