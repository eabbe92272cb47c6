//! Lessons and query responses: the protocol's wire vocabulary.
//!
//! Lessons flow from teacher to learner, query responses flow back. Neither
//! carries an identifier. An `InternalData` lesson with N child hashes is
//! answered by exactly N responses, in the order the hashes were listed.
//!
//! Lesson layout: 1-byte tag, then
//! - `0` UpToDate: nothing
//! - `1` LeafData: leaf payload (rest of frame)
//! - `2` InternalData: u32 payload length, payload, u32 hash count, hashes
//! - `3` CustomViewRoot: u64 class id
//!
//! All integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use reconnect_stream::{StreamError, WireMessage};

use crate::hash::{ClassId, Hash, HASH_LEN};

const TAG_UP_TO_DATE: u8 = 0;
const TAG_LEAF_DATA: u8 = 1;
const TAG_INTERNAL_DATA: u8 = 2;
const TAG_CUSTOM_VIEW_ROOT: u8 = 3;

/// One unit of teaching, describing the node at the learner's next
/// expected position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lesson {
    /// The learner already has this node.
    UpToDate,
    /// Serialized leaf content.
    LeafData(Bytes),
    /// Serialized internal node content plus one query per child.
    InternalData { data: Bytes, queries: Vec<Hash> },
    /// The subtree here is synchronized by a nested session of this class.
    CustomViewRoot(ClassId),
}

impl Lesson {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Lesson::UpToDate => "up-to-date",
            Lesson::LeafData(_) => "leaf",
            Lesson::InternalData { .. } => "internal",
            Lesson::CustomViewRoot(_) => "custom-view-root",
        }
    }

    /// Child hashes this lesson asks about.
    pub fn queries(&self) -> &[Hash] {
        match self {
            Lesson::InternalData { queries, .. } => queries,
            _ => &[],
        }
    }
}

impl WireMessage for Lesson {
    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Lesson::UpToDate => dst.put_u8(TAG_UP_TO_DATE),
            Lesson::LeafData(data) => {
                dst.reserve(1 + data.len());
                dst.put_u8(TAG_LEAF_DATA);
                dst.put_slice(data);
            }
            Lesson::InternalData { data, queries } => {
                dst.reserve(9 + data.len() + queries.len() * HASH_LEN);
                dst.put_u8(TAG_INTERNAL_DATA);
                dst.put_u32(data.len() as u32);
                dst.put_slice(data);
                dst.put_u32(queries.len() as u32);
                for hash in queries {
                    dst.put_slice(hash.as_bytes());
                }
            }
            Lesson::CustomViewRoot(class) => {
                dst.put_u8(TAG_CUSTOM_VIEW_ROOT);
                dst.put_u64(class.0);
            }
        }
    }

    fn decode(mut src: Bytes) -> reconnect_stream::Result<Self> {
        if !src.has_remaining() {
            return Err(StreamError::malformed("empty lesson"));
        }

        let lesson = match src.get_u8() {
            TAG_UP_TO_DATE => Lesson::UpToDate,
            TAG_LEAF_DATA => Lesson::LeafData(src.split_off(0)),
            TAG_INTERNAL_DATA => {
                let data_len = take_u32(&mut src, "payload length")? as usize;
                if src.remaining() < data_len {
                    return Err(StreamError::malformed("truncated internal payload"));
                }
                let data = src.split_to(data_len);

                let count = take_u32(&mut src, "query count")? as usize;
                if src.remaining() != count * HASH_LEN {
                    return Err(StreamError::malformed(format!(
                        "expected {} query hashes, found {} bytes",
                        count,
                        src.remaining()
                    )));
                }
                let mut queries = Vec::with_capacity(count);
                for _ in 0..count {
                    let mut hash = [0u8; HASH_LEN];
                    src.copy_to_slice(&mut hash);
                    queries.push(Hash(hash));
                }
                Lesson::InternalData { data, queries }
            }
            TAG_CUSTOM_VIEW_ROOT => {
                if src.remaining() != 8 {
                    return Err(StreamError::malformed("custom view root needs 8-byte class id"));
                }
                Lesson::CustomViewRoot(ClassId(src.get_u64()))
            }
            tag => return Err(StreamError::malformed(format!("unknown lesson tag {tag}"))),
        };

        if !matches!(lesson, Lesson::LeafData(_)) && src.has_remaining() {
            return Err(StreamError::malformed("trailing bytes after lesson"));
        }
        Ok(lesson)
    }
}

fn take_u32(src: &mut Bytes, what: &str) -> reconnect_stream::Result<u32> {
    if src.remaining() < 4 {
        return Err(StreamError::malformed(format!("truncated {what}")));
    }
    Ok(src.get_u32())
}

/// The learner's answer to one query: whether it already has the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResponse(pub bool);

impl QueryResponse {
    pub fn has_node(self) -> bool {
        self.0
    }
}

impl WireMessage for QueryResponse {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(self.0));
    }

    fn decode(mut src: Bytes) -> reconnect_stream::Result<Self> {
        if src.remaining() != 1 {
            return Err(StreamError::malformed("query response must be one byte"));
        }
        match src.get_u8() {
            0 => Ok(QueryResponse(false)),
            1 => Ok(QueryResponse(true)),
            other => Err(StreamError::malformed(format!(
                "invalid query response byte {other}"
            ))),
        }
    }
}
