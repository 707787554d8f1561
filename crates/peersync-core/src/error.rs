use std::fmt;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidHeaderLength,
    BufferTooSmall,
    UnknownMessageType,
    ConfigParseError,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidHeaderLength => "E1001",
            Self::BufferTooSmall => "E1002",
            Self::UnknownMessageType => "E1003",
            Self::ConfigParseError => "E2001",
        }
    }

    /// Short human-facing summary for logs.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidHeaderLength => "Message header has the wrong length",
            Self::BufferTooSmall => "Output buffer too small for header",
            Self::UnknownMessageType => "Unknown message type",
            Self::ConfigParseError => "Config file parse error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidHeaderLength => {
                Some("Read exactly four bytes before decoding a message header.")
            }
            Self::BufferTooSmall => Some("Reserve at least four bytes for the header."),
            Self::UnknownMessageType => {
                Some("The peer may speak a newer protocol version; close the connection.")
            }
            Self::ConfigParseError => Some("Fix syntax in .peersync/config.toml and retry."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the framing layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("header must be {expected} bytes, got {actual}")]
    InvalidHeaderLength { expected: usize, actual: usize },

    #[error("need {needed} bytes to write header, buffer has {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("unknown message type {0}")]
    UnknownMessageType(u32),
}

impl ProtocolError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidHeaderLength { .. } => ErrorCode::InvalidHeaderLength,
            Self::BufferTooSmall { .. } => ErrorCode::BufferTooSmall,
            Self::UnknownMessageType(_) => ErrorCode::UnknownMessageType,
        }
    }
}
