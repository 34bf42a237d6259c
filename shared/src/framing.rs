//! Length-prefixed wire framing
//!
//! Every message on the monitor socket is a 4-byte big-endian length followed
//! by exactly that many bytes of text. A length of zero or less marks the end
//! of the stream.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Upper bound on a single frame, guards against a corrupt length prefix.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Errors while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame length {0} exceeds the maximum of {MAX_FRAME_LEN} bytes")]
    TooLarge(usize),

    #[error("frame i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Read one frame.
///
/// Returns `Ok(None)` on an end-of-stream marker (length `<= 0`). Invalid
/// UTF-8 is replaced rather than rejected; the text is protocol ASCII.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<String>, FrameError> {
    let len = reader.read_i32::<BigEndian>()?;
    if len <= 0 {
        return Ok(None);
    }
    let len = len as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(match String::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }))
}

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, message: &str) -> Result<(), FrameError> {
    let bytes = message.as_bytes();
    if bytes.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(bytes.len()));
    }
    writer.write_u32::<BigEndian>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
