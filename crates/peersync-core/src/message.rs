//! Message type codes, id allocation, and the compression policy that sets
//! the header's compression bit.
//!
//! Body encodings for each message type live with the transport; this
//! module only knows the codes that select them.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::header::Header;

/// Header version spoken by this implementation.
pub const PROTOCOL_VERSION: u32 = 0;

/// Magic number that opens the hello exchange before any framed message.
pub const HELLO_MESSAGE_MAGIC: u32 = 0x9F79_BC40;

/// Bodies shorter than this are never compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 128;

/// Message type codes carried in the header's type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    ClusterConfig,
    Index,
    Request,
    Response,
    Ping,
    IndexUpdate,
    Close,
    DownloadProgress,
}

impl MessageType {
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::ClusterConfig => 0,
            Self::Index => 1,
            Self::Request => 2,
            Self::Response => 3,
            Self::Ping => 4,
            Self::IndexUpdate => 6,
            Self::Close => 7,
            Self::DownloadProgress => 8,
        }
    }

    /// True for messages that carry file metadata rather than file data.
    #[must_use]
    pub const fn is_metadata(self) -> bool {
        !matches!(self, Self::Response)
    }
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::ClusterConfig),
            1 => Ok(Self::Index),
            2 => Ok(Self::Request),
            3 => Ok(Self::Response),
            4 => Ok(Self::Ping),
            6 => Ok(Self::IndexUpdate),
            7 => Ok(Self::Close),
            8 => Ok(Self::DownloadProgress),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl Header {
    /// Resolve the header's type field to a known [`MessageType`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMessageType`] for unassigned codes.
    pub fn message_type(&self) -> Result<MessageType, ProtocolError> {
        MessageType::try_from(self.msg_type)
    }
}

// ---------------------------------------------------------------------------
// Message ids
// ---------------------------------------------------------------------------

/// Per-connection message id allocator.
///
/// Ids fit the header's 12-bit field and wrap from 4095 back to 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageIds {
    next: u32,
}

impl MessageIds {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Hand out the next id.
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = (self.next + 1) & 0xfff;
        id
    }

    /// Build a header for a new message of `msg_type`.
    pub fn header(&mut self, msg_type: MessageType, compression: bool) -> Header {
        Header::new(PROTOCOL_VERSION, self.next_id(), msg_type.code(), compression)
    }
}

// ---------------------------------------------------------------------------
// Compression policy
// ---------------------------------------------------------------------------

/// Which messages get their bodies compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Never,
    /// Everything except file data responses.
    #[default]
    Metadata,
    Always,
}

impl Compression {
    /// Decide the compression bit for a body of `body_len` bytes.
    #[must_use]
    pub const fn should_compress(self, msg_type: MessageType, body_len: usize, threshold: usize) -> bool {
        if body_len < threshold {
            return false;
        }
        match self {
            Self::Never => false,
            Self::Metadata => msg_type.is_metadata(),
            Self::Always => true,
        }
    }
}
