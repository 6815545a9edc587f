//! The entities-file payload: same wire shape as [`crate::chunk::Chunk`],
//! queried by a literal substring probe instead of field accessors.

use crate::chunk::Payload;
use crate::error::Result;
use crate::primitives::{self, Compression};

#[derive(Debug, Clone, Default)]
pub struct Entity {
    compression: Option<Compression>,
    compressed: Vec<u8>,
    decompressed: Vec<u8>,
}

impl Entity {
    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    /// Scan the decompressed payload for the literal NBT byte sequence
    /// encoding a string tag named `id` with value `id`:
    /// `0x08 0x00 0x02 'i' 'd' [len_be16] [id_bytes]`.
    pub fn contains_id(&self, id: &str) -> bool {
        let id_bytes = id.as_bytes();
        let mut needle = vec![0x08, 0x00, 0x02, b'i', b'd'];
        needle.extend_from_slice(&(id_bytes.len() as u16).to_be_bytes());
        needle.extend_from_slice(id_bytes);

        self.decompressed
            .windows(needle.len())
            .any(|window| window == needle.as_slice())
    }
}

impl Payload for Entity {
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
            return Ok(None);
        }
        let body = &bytes[primitives::CHUNK_HEADER..total];
        let decompressed = primitives::decompress(body, compression)?;
        let stripped = if decompressed.len() >= 3 {
            decompressed[3..].to_vec()
        } else {
            Vec::new()
        };
        Ok(Some(Entity {
            compression: Some(compression),
            compressed: bytes[..total].to_vec(),
            decompressed: stripped,
        }))
    }

    fn compressed_bytes(&self) -> &[u8] {
        &self.compressed
    }

    fn empty() -> Self {
        Entity::default()
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

    fn zlib_entity(nbt_body: &[u8]) -> Vec<u8> {
        let mut opener = vec![0x0a, 0x00, 0x00];
        opener.extend_from_slice(nbt_body);

        let mut encoder = ZlibEncoder::new(Vec::new(), FlateLevel::default());
        encoder.write_all(&opener).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut out = Vec::new();
        let length = (compressed.len() + 1) as u32;
        out.extend_from_slice(&length.to_be_bytes());
        out.push(2);
        out.extend_from_slice(&compressed);
        out
    }

    fn id_string_tag(id: &str) -> Vec<u8> {
        let mut buf = vec![0x08, 0x00, 0x02, b'i', b'd'];
        buf.extend_from_slice(&(id.len() as u16).to_be_bytes());
        buf.extend_from_slice(id.as_bytes());
        buf
    }

    #[test]
    fn finds_matching_id() {
        let bytes = zlib_entity(&id_string_tag("minecraft:cow"));
        let entity = Entity::from_bytes(&bytes).unwrap().unwrap();
        assert!(entity.contains_id("minecraft:cow"));
        assert!(!entity.contains_id("minecraft:pig"));
    }

    #[test]
    fn empty_entity_has_no_ids() {
        let entity = Entity::empty();
        assert!(!entity.contains_id("minecraft:cow"));
    }
}
