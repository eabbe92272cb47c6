//! The encoding contract for messages carried by a stream.

use bytes::{Bytes, BytesMut};

use crate::error::Result;

/// A message that can be written to and read from a framed stream.
///
/// Frame boundaries are handled by the stream, so `decode` always receives
/// exactly the bytes produced by one `encode` call.
pub trait WireMessage: Sized + Send + 'static {
    /// Append the encoded message to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Decode a message from a complete frame body.
    fn decode(src: Bytes) -> Result<Self>;
}
