//! Reply definitions
//!
//! Every server → client message is a frame whose first payload byte is a
//! [`Status`]; the rest is the body (text, or file content for GET).
//!
//! ```text
//! ┌────────────────────┬───────────┬───────────────────────┐
//! │ Len (8, u64 BE)    │ Status(1) │   Body (Len-1 bytes)  │
//! └────────────────────┴───────────┴───────────────────────┘
//! ```
//!
//! Failure bodies also start with `Error` so they read sensibly when printed.

use std::borrow::Cow;
use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, RfsError};

use super::frame::{copy_exact, read_frame_header, write_frame_header, MAX_MESSAGE_SIZE};

/// Reply status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Busy = 0x02,
    Error = 0x03,
}

impl TryFrom<u8> for Status {
    type Error = RfsError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Status::Ok),
            0x01 => Ok(Status::NotFound),
            0x02 => Ok(Status::Busy),
            0x03 => Ok(Status::Error),
            _ => Err(RfsError::Protocol(format!(
                "Unknown reply status: 0x{:02x}",
                byte
            ))),
        }
    }
}

/// A reply sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code
    pub status: Status,

    /// Message text (or content)
    pub body: Bytes,
}

/// Prefix carried by every failure body
pub const ERROR_PREFIX: &str = "Error";

impl Reply {
    /// Create an OK reply
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: Status::Ok,
            body: body.into(),
        }
    }

    /// Create a NOT_FOUND reply
    pub fn not_found(message: &str) -> Self {
        Self::failure(Status::NotFound, message)
    }

    /// Create a BUSY reply
    pub fn busy(message: &str) -> Self {
        Self::failure(Status::Busy, message)
    }

    /// Create an ERROR reply
    pub fn error(message: &str) -> Self {
        Self::failure(Status::Error, message)
    }

    fn failure(status: Status, message: &str) -> Self {
        let body = if message.starts_with(ERROR_PREFIX) {
            message.to_string()
        } else {
            format!("{}: {}", ERROR_PREFIX, message)
        };
        Self {
            status,
            body: Bytes::from(body),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Body as text (lossy)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Turn a non-OK reply into [`RfsError::Remote`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(RfsError::Remote(self.status, self.text().into_owned()))
        }
    }
}

impl From<&RfsError> for Reply {
    /// Map a handler failure onto the reply the client sees
    fn from(err: &RfsError) -> Self {
        match err {
            RfsError::NotFound(_) => Reply::not_found(&err.to_string()),
            RfsError::LockBusy(_) => Reply::busy(&err.to_string()),
            _ => Reply::error(&err.to_string()),
        }
    }
}

// =============================================================================
// Encoding/Decoding
// =============================================================================

/// Encode a reply as a complete frame
pub fn encode_reply(reply: &Reply) -> Bytes {
    let len = 1 + reply.body.len();
    let mut buf = BytesMut::with_capacity(8 + len);
    buf.put_u64(len as u64);
    buf.put_u8(reply.status as u8);
    buf.put_slice(&reply.body);
    buf.freeze()
}

/// Decode a reply from a frame payload (status byte + body)
pub fn decode_reply(payload: &[u8]) -> Result<Reply> {
    let (&status, body) = payload
        .split_first()
        .ok_or_else(|| RfsError::Protocol("Empty reply: missing status byte".to_string()))?;

    Ok(Reply {
        status: Status::try_from(status)?,
        body: Bytes::copy_from_slice(body),
    })
}

/// Write a reply and flush
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    writer.write_all(&encode_reply(reply))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete reply into memory
pub fn read_reply<R: Read>(reader: &mut R) -> Result<Reply> {
    let (status, body_len) = read_reply_header(reader)?;
    if body_len > MAX_MESSAGE_SIZE {
        return Err(RfsError::Protocol(format!(
            "Reply too large: {} bytes (max {})",
            body_len, MAX_MESSAGE_SIZE
        )));
    }

    let mut body = BytesMut::zeroed(body_len as usize);
    if body_len > 0 {
        reader.read_exact(&mut body)?;
    }
    Ok(Reply {
        status,
        body: body.freeze(),
    })
}

/// Stream a reply whose body is `len` bytes read from `src`
pub fn write_reply_from<W: Write, R: Read>(
    writer: &mut W,
    status: Status,
    src: &mut R,
    len: u64,
) -> Result<u64> {
    write_frame_header(writer, len + 1)?;
    writer.write_all(&[status as u8])?;
    let sent = copy_exact(src, writer, len)?;
    writer.flush()?;
    Ok(sent)
}

/// Read a reply's length prefix and status byte, leaving the body unread
///
/// Returns the status and the number of body bytes that follow.
pub fn read_reply_header<R: Read>(reader: &mut R) -> Result<(Status, u64)> {
    let len = read_frame_header(reader)?;
    if len == 0 {
        return Err(RfsError::Protocol("Empty reply: missing status byte".to_string()));
    }

    let mut status = [0u8; 1];
    reader.read_exact(&mut status)?;
    Ok((Status::try_from(status[0])?, len - 1))
}
