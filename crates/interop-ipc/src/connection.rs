//! Frame I/O over any async byte stream.
//!
//! A frame is read in two steps: the fixed 16-byte header, then exactly
//! `payload_len` more bytes. The declared length is checked against the
//! frame limit before anything is allocated for the payload.

use std::io;

use interop_core::protocol::codec::{decode_header, encode_frame};
use interop_core::protocol::messages::{Frame, HEADER_SIZE};
use interop_core::ProtocolError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Failure while reading or writing a frame.
#[derive(Debug, Error)]
pub enum FrameIoError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Reads the next frame.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
/// A stream that ends in the middle of a frame is an
/// [`io::ErrorKind::UnexpectedEof`] error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameIoError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_SIZE];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[first..]).await?;

    let header = decode_header(&header)?;
    let mut payload = vec![0u8; header.payload_len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame::new(header.kind, header.call_id, payload)))
}

/// Encodes and writes `frame`, then flushes the stream.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameIoError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use interop_core::FrameKind;
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn test_frames_written_back_to_back_are_read_in_order() {
        // Arrange
        let (mut a, mut b) = duplex(1024);
        let first = Frame::new(FrameKind::Call, 1, vec![1, 2, 3]);
        let second = Frame::new(FrameKind::Call, 2, Vec::new());

        // Act
        write_frame(&mut a, &first).await.expect("write first");
        write_frame(&mut a, &second).await.expect("write second");
        drop(a);

        // Assert
        assert_eq!(read_frame(&mut b).await.expect("read").as_ref(), Some(&first));
        assert_eq!(read_frame(&mut b).await.expect("read").as_ref(), Some(&second));
        assert!(read_frame(&mut b).await.expect("clean eof").is_none());
    }

    #[tokio::test]
    async fn test_payload_larger_than_buffer_is_reassembled() {
        let (mut a, mut b) = duplex(64);
        let frame = Frame::new(FrameKind::Reply, 5, vec![0xAB; 10_000]);

        let writer = tokio::spawn(async move {
            write_frame(&mut a, &frame).await.expect("write");
            frame
        });
        let read = read_frame(&mut b).await.expect("read").expect("frame");
        let written = writer.await.expect("join");

        assert_eq!(read, written);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_io_error() {
        let (mut a, mut b) = duplex(1024);
        let bytes = encode_frame(&Frame::new(FrameKind::Call, 1, vec![0; 32])).expect("encode");
        a.write_all(&bytes[..HEADER_SIZE + 4]).await.expect("write");
        drop(a);

        let result = read_frame(&mut b).await;

        assert!(
            matches!(result, Err(FrameIoError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof)
        );
    }

    #[tokio::test]
    async fn test_garbage_header_is_a_protocol_error() {
        let (mut a, mut b) = duplex(1024);
        a.write_all(&[0xEE; HEADER_SIZE]).await.expect("write");

        let result = read_frame(&mut b).await;

        assert!(matches!(
            result,
            Err(FrameIoError::Protocol(ProtocolError::UnsupportedVersion(0xEE)))
        ));
    }
}
