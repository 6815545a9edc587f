//! The per-chunk payload: a compressed NBT blob plus lazily-read field
//! accessors.

use mcatrim_nbt::{fast_get_property, Strategy};

use crate::error::{Error, Result};
use crate::primitives::{self, Compression};

/// Shared contract between [`Chunk`] and [`crate::entity::Entity`] so the
/// generic sector-file codec in [`crate::region`] can be written once for
/// both payload kinds.
pub trait Payload: Sized {
    /// Parse a payload from the raw sector bytes backing one location
    /// entry (header + compressed body, possibly with trailing sector
    /// padding). Returns `Ok(None)` for an on-disk-empty payload.
    fn from_bytes(bytes: &[u8]) -> Result<Option<Self>>;

    /// The original header+body bytes, verbatim, for byte-identical
    /// re-emission. Empty iff the payload is empty.
    fn compressed_bytes(&self) -> &[u8];

    /// Number of bytes this payload occupies on disk (header + body).
    fn size_on_disk(&self) -> usize {
        self.compressed_bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.compressed_bytes().is_empty()
    }

    /// Produce the "nothing here" sentinel used when the other side of a
    /// [`crate::aggregate::Region`] join is missing an index.
    fn empty() -> Self;

    /// Blank out this payload's bytes, turning it into an empty sentinel.
    fn clear(&mut self);
}

/// One chunk's worth of NBT-encoded world data.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    compression: Option<Compression>,
    /// Header + compressed body, exactly as read from disk. Empty means
    /// no chunk is present at this index.
    compressed: Vec<u8>,
    /// Decompressed payload with the outer root-tag opener (3 bytes:
    /// `TAG_Compound` + zero-length name) already stripped.
    decompressed: Vec<u8>,
}

impl Chunk {
    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    pub fn inhabited_time(&self) -> Result<i64> {
        let v = fast_get_property(&self.decompressed, b"InhabitedTime", Strategy::Int64Be)?;
        if v < 0 {
            return Err(Error::NegativeInhabitedTime(v));
        }
        Ok(v)
    }

    pub fn x_pos(&self) -> Result<i32> {
        Ok(fast_get_property(&self.decompressed, b"xPos", Strategy::Int32Be).map(|v| v as i32)?)
    }

    pub fn y_pos(&self) -> Result<i32> {
        Ok(fast_get_property(&self.decompressed, b"yPos", Strategy::Int32Be).map(|v| v as i32)?)
    }

    pub fn z_pos(&self) -> Result<i32> {
        Ok(fast_get_property(&self.decompressed, b"zPos", Strategy::Int32Be).map(|v| v as i32)?)
    }

    /// If this chunk is present and `pred` holds for it, blank it out and
    /// return true. Otherwise leave it untouched and return false.
    pub fn conditional_reset(&mut self, pred: impl FnOnce(&Chunk) -> bool) -> bool {
        if !self.is_empty() && pred(self) {
            self.clear();
            true
        } else {
            false
        }
    }
}

impl Payload for Chunk {
    fn from_bytes(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.len() < primitives::CHUNK_HEADER {
            return Ok(None);
        }
        let (body_len, compression) = primitives::parse_chunk_header(bytes)?;
        if body_len == 0 {
            return Ok(None);
        }
        let total = primitives::CHUNK_HEADER + body_len;
        if bytes.len() < total {
            // Truncated tail: tolerate, treat as absent rather than fatal.
            return Ok(None);
        }
        let body = &bytes[primitives::CHUNK_HEADER..total];
        let decompressed = primitives::decompress(body, compression)?;
        let stripped = if decompressed.len() >= 3 {
            decompressed[3..].to_vec()
        } else {
            Vec::new()
        };
        Ok(Some(Chunk {
            compression: Some(compression),
            compressed: bytes[..total].to_vec(),
            decompressed: stripped,
        }))
    }

    fn compressed_bytes(&self) -> &[u8] {
        &self.compressed
    }

    fn empty() -> Self {
        Chunk::default()
    }

    fn clear(&mut self) {
        self.compression = None;
        self.compressed.clear();
        self.decompressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression as FlateLevel;
    use std::io::Write;

    fn zlib_chunk(nbt_body: &[u8]) -> Vec<u8> {
        let mut opener = vec![0x0a, 0x00, 0x00];
        opener.extend_from_slice(nbt_body);

        let mut encoder = ZlibEncoder::new(Vec::new(), FlateLevel::default());
        encoder.write_all(&opener).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = Vec::new();
        let length = (compressed.len() + 1) as u32;
        out.extend_from_slice(&length.to_be_bytes());
        out.push(2); // zlib
        out.extend_from_slice(&compressed);
        out
    }

    fn int_field(name: &str, value: i32) -> Vec<u8> {
        let mut buf = vec![0x03];
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
        buf
    }

    fn long_field(name: &str, value: i64) -> Vec<u8> {
        let mut buf = vec![0x04];
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
        buf
    }

    #[test]
    fn reads_fields_through_decompression() {
        let mut body = long_field("InhabitedTime", 2400);
        body.extend(int_field("xPos", 10));
        body.extend(int_field("yPos", 4));
        body.extend(int_field("zPos", -3));

        let bytes = zlib_chunk(&body);
        let chunk = Chunk::from_bytes(&bytes).unwrap().unwrap();

        assert_eq!(chunk.inhabited_time().unwrap(), 2400);
        assert_eq!(chunk.x_pos().unwrap(), 10);
        assert_eq!(chunk.y_pos().unwrap(), 4);
        assert_eq!(chunk.z_pos().unwrap(), -3);
        assert_eq!(chunk.compressed_bytes(), &bytes[..]);
    }

    #[test]
    fn zero_length_header_is_empty() {
        let bytes = [0u8, 0, 0, 0, 0];
        assert!(Chunk::from_bytes(&bytes).unwrap().is_none());
    }

    #[test]
    fn negative_inhabited_time_is_rejected() {
        let body = long_field("InhabitedTime", -1);
        let bytes = zlib_chunk(&body);
        let chunk = Chunk::from_bytes(&bytes).unwrap().unwrap();
        assert!(matches!(
            chunk.inhabited_time(),
            Err(Error::NegativeInhabitedTime(-1))
        ));
    }

    #[test]
    fn conditional_reset_blanks_matching_chunk() {
        let body = long_field("InhabitedTime", 100);
        let bytes = zlib_chunk(&body);
        let mut chunk = Chunk::from_bytes(&bytes).unwrap().unwrap();

        let reset = chunk.conditional_reset(|c| c.inhabited_time().unwrap() < 1200);
        assert!(reset);
        assert!(chunk.is_empty());
    }

    #[test]
    fn conditional_reset_leaves_non_matching_chunk() {
        let body = long_field("InhabitedTime", 5000);
        let bytes = zlib_chunk(&body);
        let mut chunk = Chunk::from_bytes(&bytes).unwrap().unwrap();

        let reset = chunk.conditional_reset(|c| c.inhabited_time().unwrap() < 1200);
        assert!(!reset);
        assert!(!chunk.is_empty());
    }
}
