//! Wire-level framing for the publish channel.
//!
//! Every frame on the wire is `tag, ack, length, ack, payload, ack` — a
//! three-phase handshake per message. Tags are short ASCII strings instead
//! of a binary opcode byte, matching the original instance protocol; this
//! module only knows how to read/write those tags and length-prefixed
//! payloads over anything that implements `Read`/`Write`. It does not know
//! what a tuple or a status message is — see `network::publish` for that.

use std::io::{Read, Write};

use crate::error::{Result, WorkerError};

/// Fixed-size buffer every ack is padded/truncated to on the wire, matching
/// the original's `ACK_MESSAGE_SIZE` framing.
pub const ACK_MESSAGE_SIZE: usize = 64;

pub const GRAPH_STREAM_START: &str = "GRAPH_STREAM_START";
pub const GRAPH_STREAM_START_ACK: &str = "GRAPH_STREAM_START_ACK";
pub const GRAPH_STREAM_C_LENGTH_ACK: &str = "GRAPH_STREAM_C_length_ACK";
pub const GRAPH_DATA_SUCCESS: &str = "GRAPH_DATA_SUCCESS";
pub const QUERY_START: &str = "QUERY_START";
pub const QUERY_START_ACK: &str = "QUERY_START_ACK";
pub const QUERY_DATA_START: &str = "QUERY_DATA_START";
pub const QUERY_DATA_ACK: &str = "QUERY_DATA_ACK";
pub const CLOSE: &str = "CLOSE";

/// Writes an ASCII tag as a fixed-width, NUL-padded frame.
pub fn write_tag<W: Write>(stream: &mut W, tag: &str) -> Result<()> {
    let mut buf = [0u8; ACK_MESSAGE_SIZE];
    let bytes = tag.as_bytes();
    if bytes.len() > ACK_MESSAGE_SIZE {
        return Err(WorkerError::PlanMalformed(format!("tag too long: {tag}")));
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    stream
        .write_all(&buf)
        .map_err(|_| WorkerError::TransportShortWrite { expected: ACK_MESSAGE_SIZE, wrote: 0 })?;
    Ok(())
}

/// Reads a fixed-width tag frame and trims trailing NUL padding.
pub fn read_tag<R: Read>(stream: &mut R) -> Result<String> {
    let mut buf = [0u8; ACK_MESSAGE_SIZE];
    let got = stream.read(&mut buf).map_err(WorkerError::Io)?;
    if got < 1 {
        return Err(WorkerError::TransportShortRead { expected: ACK_MESSAGE_SIZE, got });
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Reads a tag and returns whether it matched `expected`; an unexpected tag
/// is a soft error the caller logs and continues past, not a hard failure.
pub fn read_tag_expect<R: Read>(stream: &mut R, expected: &str) -> Result<bool> {
    let got = read_tag(stream)?;
    Ok(got == expected)
}

/// Writes a 32-bit big-endian length prefix.
pub fn write_length<W: Write>(stream: &mut W, length: u32) -> Result<()> {
    let bytes = length.to_be_bytes();
    stream
        .write_all(&bytes)
        .map_err(|_| WorkerError::TransportShortWrite { expected: 4, wrote: 0 })?;
    Ok(())
}

/// Reads a 32-bit big-endian length prefix.
pub fn read_length<R: Read>(stream: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    let got = stream.read(&mut bytes).map_err(WorkerError::Io)?;
    if got < 4 {
        return Err(WorkerError::TransportShortRead { expected: 4, got });
    }
    Ok(u32::from_be_bytes(bytes))
}

/// Writes a payload of exactly `payload.len()` bytes.
pub fn write_payload<W: Write>(stream: &mut W, payload: &[u8]) -> Result<()> {
    stream
        .write_all(payload)
        .map_err(|_| WorkerError::TransportShortWrite { expected: payload.len(), wrote: 0 })?;
    Ok(())
}

/// Reads exactly `length` bytes of payload.
pub fn read_payload<R: Read>(stream: &mut R, length: u32) -> Result<Vec<u8>> {
    let mut payload = vec![0u8; length as usize];
    stream.read_exact(&mut payload).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            WorkerError::TransportShortRead { expected: length as usize, got: 0 }
        } else {
            WorkerError::Io(e)
        }
    })?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn tag_round_trips_through_fixed_width_frame() {
        let mut buf = Vec::new();
        write_tag(&mut buf, QUERY_START).unwrap();
        assert_eq!(buf.len(), ACK_MESSAGE_SIZE);

        let mut cursor = Cursor::new(buf);
        let tag = read_tag(&mut cursor).unwrap();
        assert_eq!(tag, QUERY_START);
    }

    #[test]
    fn length_round_trips_as_big_endian() {
        let mut buf = Vec::new();
        write_length(&mut buf, 1234).unwrap();
        assert_eq!(buf, 1234u32.to_be_bytes());

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_length(&mut cursor).unwrap(), 1234);
    }

    #[test]
    fn short_payload_read_is_a_transport_error() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        let err = read_payload(&mut cursor, 10).unwrap_err();
        assert!(matches!(err, WorkerError::TransportShortRead { .. }));
    }
}
