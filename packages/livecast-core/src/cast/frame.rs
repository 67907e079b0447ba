//! Cast v2 wire framing.
//!
//! Every message on the control connection is a 4-byte big-endian length
//! followed by a protobuf-encoded `CastMessage`. We only ever produce the
//! string payload variant; binary payloads and unknown fields are skipped on
//! decode.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol_constants::{MAX_FRAME_SIZE, PAYLOAD_TYPE_STRING, PROTOCOL_VERSION_CASTV2_1_0};

const LENGTH_PREFIX_LEN: usize = 4;

const FIELD_PROTOCOL_VERSION: u64 = 1;
const FIELD_SOURCE_ID: u64 = 2;
const FIELD_DESTINATION_ID: u64 = 3;
const FIELD_NAMESPACE: u64 = 4;
const FIELD_PAYLOAD_TYPE: u64 = 5;
const FIELD_PAYLOAD_UTF8: u64 = 6;

const WIRE_VARINT: u8 = 0;
const WIRE_FIXED64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_FIXED32: u8 = 5;

/// Errors raised while framing or unframing Cast messages.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame length exceeds [`MAX_FRAME_SIZE`].
    #[error("frame of {0} bytes exceeds limit of {MAX_FRAME_SIZE}")]
    TooLarge(usize),

    /// A field ran past the end of the frame.
    #[error("truncated protobuf field")]
    Truncated,

    /// Wire type we cannot skip (groups are deprecated and never sent by receivers).
    #[error("unsupported protobuf wire type {0}")]
    UnsupportedWireType(u8),

    /// A string field was not valid UTF-8.
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(u64),
}

pub type FrameResult<T> = Result<T, FrameError>;

/// A decoded `CastMessage` carrying a string payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMessage {
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload: String,
}

impl CastMessage {
    pub fn new(
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
        namespace: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            namespace: namespace.into(),
            payload: payload.into(),
        }
    }

    /// Serializes the protobuf body (without the length prefix).
    pub fn encode_body(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            16 + self.source_id.len()
                + self.destination_id.len()
                + self.namespace.len()
                + self.payload.len(),
        );
        write_varint_field(&mut out, FIELD_PROTOCOL_VERSION, PROTOCOL_VERSION_CASTV2_1_0);
        write_string_field(&mut out, FIELD_SOURCE_ID, &self.source_id);
        write_string_field(&mut out, FIELD_DESTINATION_ID, &self.destination_id);
        write_string_field(&mut out, FIELD_NAMESPACE, &self.namespace);
        write_varint_field(&mut out, FIELD_PAYLOAD_TYPE, PAYLOAD_TYPE_STRING);
        write_string_field(&mut out, FIELD_PAYLOAD_UTF8, &self.payload);
        out
    }

    /// Parses a protobuf body (without the length prefix).
    pub fn decode_body(bytes: &[u8]) -> FrameResult<Self> {
        let mut message = Self::new("", "", "", "");
        let mut cursor = 0usize;

        while cursor < bytes.len() {
            let key = read_varint(bytes, &mut cursor)?;
            let field = key >> 3;
            let wire_type = (key & 0x07) as u8;

            match wire_type {
                WIRE_VARINT => {
                    read_varint(bytes, &mut cursor)?;
                }
                WIRE_FIXED64 => skip(bytes, &mut cursor, 8)?,
                WIRE_FIXED32 => skip(bytes, &mut cursor, 4)?,
                WIRE_LEN => {
                    let len = usize::try_from(read_varint(bytes, &mut cursor)?)
                        .map_err(|_| FrameError::Truncated)?;
                    let end = cursor.checked_add(len).ok_or(FrameError::Truncated)?;
                    let raw = bytes.get(cursor..end).ok_or(FrameError::Truncated)?;
                    cursor = end;

                    let slot = match field {
                        FIELD_SOURCE_ID => &mut message.source_id,
                        FIELD_DESTINATION_ID => &mut message.destination_id,
                        FIELD_NAMESPACE => &mut message.namespace,
                        FIELD_PAYLOAD_UTF8 => &mut message.payload,
                        // payload_binary and anything newer
                        _ => continue,
                    };
                    *slot = std::str::from_utf8(raw)
                        .map_err(|_| FrameError::InvalidUtf8(field))?
                        .to_string();
                }
                other => return Err(FrameError::UnsupportedWireType(other)),
            }
        }

        Ok(message)
    }
}

/// Length-prefixed codec for use with `Framed`/`FramedRead`/`FramedWrite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CastCodec;

impl Decoder for CastCodec {
    type Item = CastMessage;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge(len));
        }

        let total = LENGTH_PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let body = src.split_to(len);
        CastMessage::decode_body(&body).map(Some)
    }
}

impl Encoder<CastMessage> for CastCodec {
    type Error = FrameError;

    fn encode(&mut self, item: CastMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.encode_body();
        if body.len() > MAX_FRAME_SIZE {
            return Err(FrameError::TooLarge(body.len()));
        }

        dst.reserve(LENGTH_PREFIX_LEN + body.len());
        // Bounded by MAX_FRAME_SIZE above, so the cast cannot truncate.
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protobuf primitives
// ─────────────────────────────────────────────────────────────────────────────

fn write_varint_field(out: &mut Vec<u8>, field: u64, value: u64) {
    write_varint(out, field << 3);
    write_varint(out, value);
}

fn write_string_field(out: &mut Vec<u8>, field: u64, value: &str) {
    write_varint(out, (field << 3) | u64::from(WIRE_LEN));
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> FrameResult<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;

    while shift < 64 {
        let byte = *bytes.get(*cursor).ok_or(FrameError::Truncated)?;
        *cursor += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }

    Err(FrameError::Truncated)
}

fn skip(bytes: &[u8], cursor: &mut usize, n: usize) -> FrameResult<()> {
    let end = cursor.checked_add(n).ok_or(FrameError::Truncated)?;
    if end > bytes.len() {
        return Err(FrameError::Truncated);
    }
    *cursor = end;
    Ok(())
}
