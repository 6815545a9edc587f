//! Fixed-size wire primitives shared by the region and entities codecs:
//! sector sizing, the location/timestamp table entries, and compression.

use std::convert::TryFrom;
use std::io::Read;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::{GzDecoder, ZlibDecoder};
use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};

/// Number of chunk slots in a region or entities file.
pub const ENTRIES: usize = 1024;

/// Size in bytes of a single sector, Minecraft's on-disk alignment unit.
pub const SECTOR: usize = 4096;

/// Size in bytes of the location table (1024 entries of 5 bytes, padded to
/// a whole sector).
pub const LOCATION_TABLE: usize = SECTOR;

/// Size in bytes of the timestamp table.
pub const TIMESTAMP_TABLE: usize = SECTOR;

/// Size in bytes of a chunk payload header: a 4-byte length plus a 1-byte
/// compression tag.
pub const CHUNK_HEADER: usize = 5;

/// Size in bytes of one location table entry (3-byte offset, 1-byte size).
pub const LOCATION_ENTRY: usize = 4;

/// Size in bytes of one timestamp table entry.
pub const TIMESTAMP_ENTRY: usize = 4;

/// Sector index where payload data begins; the first two sectors are the
/// location and timestamp tables.
pub const FIRST_PAYLOAD_SECTOR: usize = 2;

/// Compression scheme recorded in a chunk payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Compression {
    Gzip = 1,
    Zlib = 2,
    Uncompressed = 3,
}

impl Compression {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// A location table entry: a sector offset and a sector count. `(0, _)` or
/// `(_, 0)` both mean "empty" per the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub offset: u32,
    pub sectors: u8,
}

impl Location {
    pub const EMPTY: Location = Location {
        offset: 0,
        sectors: 0,
    };

    pub fn is_empty(self) -> bool {
        self.sectors == 0 || self.offset < FIRST_PAYLOAD_SECTOR as u32
    }

    pub fn from_bytes(bytes: &[u8; 4]) -> Location {
        let offset = (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32;
        Location {
            offset,
            sectors: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let o = self.offset;
        [(o >> 16) as u8, (o >> 8) as u8, o as u8, self.sectors]
    }
}

/// A timestamp table entry: an opaque big-endian integer, carried through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub fn from_bytes(bytes: &[u8; 4]) -> Timestamp {
        Timestamp(BigEndian::read_u32(bytes))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, self.0);
        buf
    }
}

/// Decompress `body` (the bytes following the chunk header) according to
/// `scheme`. `UNCOMPRESSED` is returned unchanged.
pub fn decompress(body: &[u8], scheme: Compression) -> Result<Vec<u8>> {
    match scheme {
        Compression::Uncompressed => Ok(body.to_vec()),
        Compression::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(body).read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Zlib => {
            let mut out = Vec::new();
            ZlibDecoder::new(body).read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// Parse the 5-byte chunk payload header: returns `(body_len, compression)`.
/// `body_len` is the number of bytes following the header (i.e. `length -
/// 1`, the compression byte already excluded).
pub fn parse_chunk_header(header: &[u8]) -> Result<(usize, Compression)> {
    debug_assert!(header.len() >= CHUNK_HEADER);
    let length = BigEndian::read_u32(&header[0..4]) as usize;
    let scheme_byte = header[4];
    let scheme = Compression::try_from(scheme_byte).map_err(|_| Error::UnknownCompression(scheme_byte))?;
    Ok((length.saturating_sub(1), scheme))
}

/// Chunk-local index from 0..1024, per `x + 32 * z` within the region.
pub fn local_index(x: u8, z: u8) -> usize {
    (x as usize % 32) + 32 * (z as usize % 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_round_trips_offset_and_sectors() {
        let loc = Location {
            offset: 0x0203_04,
            sectors: 7,
        };
        let bytes = loc.to_bytes();
        let parsed = Location::from_bytes(&bytes);
        assert_eq!(parsed.offset, loc.offset);
        assert_eq!(parsed.sectors, loc.sectors);
    }

    #[test]
    fn location_below_first_payload_sector_is_empty() {
        assert!(Location {
            offset: 0,
            sectors: 1
        }
        .is_empty());
        assert!(Location {
            offset: 1,
            sectors: 1
        }
        .is_empty());
        assert!(!Location {
            offset: 2,
            sectors: 1
        }
        .is_empty());
    }

    #[test]
    fn zero_sectors_is_empty_regardless_of_offset() {
        assert!(Location {
            offset: 5,
            sectors: 0
        }
        .is_empty());
    }

    #[test]
    fn decompress_uncompressed_is_identity() {
        let body = b"hello".to_vec();
        assert_eq!(decompress(&body, Compression::Uncompressed).unwrap(), body);
    }

    #[test]
    fn parse_header_rejects_unknown_compression() {
        let header = [0, 0, 0, 5, 9];
        assert!(matches!(
            parse_chunk_header(&header),
            Err(Error::UnknownCompression(9))
        ));
    }
}
