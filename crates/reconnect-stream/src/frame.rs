//! Length-prefixed framing.
//!
//! Every message is written as a 4-byte big-endian body length followed by
//! the body. Frames from consecutive messages are batched into one buffer
//! before hitting the transport.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, StreamError};
use crate::message::WireMessage;

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound on a single frame body (64 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Encode `message` as one frame at the end of `dst`.
pub fn encode_frame<M: WireMessage>(dst: &mut BytesMut, message: &M) {
    let start = dst.len();
    dst.put_u32(0);
    message.encode(dst);
    let body_len = (dst.len() - start - FRAME_HEADER_LEN) as u32;
    dst[start..start + FRAME_HEADER_LEN].copy_from_slice(&body_len.to_be_bytes());
}

/// Read one frame body from `reader`, rejecting frames above `max_size`.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let size = reader.read_u32().await? as usize;
    if size > max_size {
        return Err(StreamError::FrameTooLarge {
            size,
            limit: max_size,
        });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Bytes::from(body))
}
