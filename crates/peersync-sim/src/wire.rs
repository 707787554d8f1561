//! Framing of index messages exchanged between simulated replicas.
//!
//! A frame is the 4-byte header, a big-endian `u32` body length, then the
//! body. Bodies are JSON lists of [`FileInfo`] records. The header's
//! compression bit follows the configured policy; the simulated transport
//! carries the bit but leaves bodies uncompressed.

use anyhow::{Context, Result, bail};
use peersync_core::config::ProtocolConfig;
use peersync_core::{FileInfo, HEADER_LEN, Header, MessageIds, MessageType};

const LENGTH_LEN: usize = 4;

/// A decoded index message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMessage {
    pub header: Header,
    pub kind: MessageType,
    pub records: Vec<FileInfo>,
}

/// Encode `records` as an `Index` or `IndexUpdate` frame, returning the
/// header that leads it alongside the frame bytes.
///
/// # Errors
///
/// Returns an error if `kind` does not carry file records or the body cannot
/// be serialized.
pub fn encode_index(
    ids: &mut MessageIds,
    config: &ProtocolConfig,
    kind: MessageType,
    records: &[FileInfo],
) -> Result<(Header, Vec<u8>)> {
    if !matches!(kind, MessageType::Index | MessageType::IndexUpdate) {
        bail!("{kind:?} does not carry file records");
    }

    let body = serde_json::to_vec(records).context("serialize index body")?;
    let body_len = u32::try_from(body.len()).context("index body exceeds u32 length")?;
    let header = ids.header(kind, config.should_compress(kind, body.len()));

    let mut frame = vec![0u8; HEADER_LEN];
    header.marshal_to(&mut frame)?;
    frame.extend_from_slice(&body_len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok((header, frame))
}

/// Decode a frame produced by [`encode_index`].
///
/// # Errors
///
/// Returns an error on truncated frames, unknown or unexpected message
/// types, length mismatches, and malformed bodies.
pub fn decode_index(frame: &[u8]) -> Result<IndexMessage> {
    let Some((head, rest)) = frame.split_at_checked(HEADER_LEN) else {
        bail!("frame of {} bytes is shorter than a header", frame.len());
    };
    let header = Header::unmarshal(head)?;
    let kind = header.message_type()?;
    if !matches!(kind, MessageType::Index | MessageType::IndexUpdate) {
        bail!("unexpected {kind:?} message (id {})", header.msg_id);
    }

    let Some((len_bytes, body)) = rest.split_at_checked(LENGTH_LEN) else {
        bail!("frame is missing its body length");
    };
    let mut len_word = [0u8; LENGTH_LEN];
    len_word.copy_from_slice(len_bytes);
    let declared = usize::try_from(u32::from_be_bytes(len_word))?;
    if declared != body.len() {
        bail!("body length {declared} does not match {} remaining bytes", body.len());
    }

    let records = serde_json::from_slice(body).context("parse index body")?;
    Ok(IndexMessage {
        header,
        kind,
        records,
    })
}
