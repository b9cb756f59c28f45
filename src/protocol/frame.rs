//! Message framer
//!
//! Every value on the wire is one framed message:
//!
//! ```text
//! ┌────────────────────┬───────────────────────────────┐
//! │ Len (8, u64 BE)    │        Payload (Len bytes)    │
//! └────────────────────┴───────────────────────────────┘
//! ```
//!
//! Small messages (tokens, paths, status text) are read into memory and
//! capped at [`MAX_MESSAGE_SIZE`]. File content is streamed through a fixed
//! [`CHUNK_SIZE`] buffer and is bounded only by its declared length.

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, RfsError};

/// Width of the length prefix
pub const LEN_PREFIX_SIZE: usize = 8;

/// Largest message accepted into memory (16 MB)
pub const MAX_MESSAGE_SIZE: u64 = 16 * 1024 * 1024;

/// Buffer size used when streaming file content
pub const CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// In-memory encoding/decoding
// =============================================================================

/// Encode a payload as a complete frame
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(LEN_PREFIX_SIZE + payload.len());
    buf.put_u64(payload.len() as u64);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode one frame from the front of `bytes`
///
/// Returns the payload and the number of bytes consumed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Bytes, usize)> {
    if bytes.len() < LEN_PREFIX_SIZE {
        return Err(RfsError::Protocol(format!(
            "Incomplete length prefix: expected {} bytes, got {}",
            LEN_PREFIX_SIZE,
            bytes.len()
        )));
    }

    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    prefix.copy_from_slice(&bytes[..LEN_PREFIX_SIZE]);
    let len = checked_len(u64::from_be_bytes(prefix))?;

    let total = LEN_PREFIX_SIZE + len;
    if bytes.len() < total {
        return Err(RfsError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            len,
            bytes.len() - LEN_PREFIX_SIZE
        )));
    }

    Ok((Bytes::copy_from_slice(&bytes[LEN_PREFIX_SIZE..total]), total))
}

fn checked_len(len: u64) -> Result<usize> {
    if len > MAX_MESSAGE_SIZE {
        return Err(RfsError::Protocol(format!(
            "Message too large: {} bytes (max {})",
            len, MAX_MESSAGE_SIZE
        )));
    }
    Ok(len as usize)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a complete frame and flush
///
/// Returns the number of payload bytes sent.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<usize> {
    write_frame_header(writer, payload.len() as u64)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(payload.len())
}

/// Read a complete frame into memory
///
/// Blocks until the declared length is fully received. A peer that closes
/// early yields an `UnexpectedEof` I/O error.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Bytes> {
    let len = checked_len(read_frame_header(reader)?)?;

    let mut payload = BytesMut::zeroed(len);
    if len > 0 {
        reader.read_exact(&mut payload)?;
    }
    Ok(payload.freeze())
}

/// Write only the length prefix of a frame
pub fn write_frame_header<W: Write>(writer: &mut W, len: u64) -> Result<()> {
    writer.write_all(&len.to_be_bytes())?;
    Ok(())
}

/// Read only the length prefix of a frame
pub fn read_frame_header<R: Read>(reader: &mut R) -> Result<u64> {
    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    reader.read_exact(&mut prefix)?;
    Ok(u64::from_be_bytes(prefix))
}

/// Send `len` bytes from `src` as one frame, streaming in chunks
pub fn write_frame_from<W: Write, R: Read>(writer: &mut W, src: &mut R, len: u64) -> Result<u64> {
    write_frame_header(writer, len)?;
    let sent = copy_exact(src, writer, len)?;
    writer.flush()?;
    Ok(sent)
}

/// Receive one frame straight into `sink`, streaming in chunks
pub fn read_frame_into<R: Read, W: Write>(reader: &mut R, sink: &mut W) -> Result<u64> {
    let len = read_frame_header(reader)?;
    copy_exact(reader, sink, len)
}

/// Copy exactly `len` bytes from `src` to `dst`
///
/// Fails with `UnexpectedEof` if `src` runs dry first.
pub fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(
    src: &mut R,
    dst: &mut W,
    len: u64,
) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE.min(len as usize).max(1)];
    let mut remaining = len;

    while remaining > 0 {
        let want = buf.len().min(remaining as usize);
        let n = match src.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended with {} of {} bytes outstanding", remaining, len),
                )
                .into())
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        dst.write_all(&buf[..n])?;
        remaining -= n as u64;
    }

    Ok(len)
}
