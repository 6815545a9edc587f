//! Generic sector-file codec: load/save the packed location + timestamp +
//! payload layout shared by region and entities files, parameterized over
//! the payload type.

use crate::chunk::{Chunk, Payload};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::primitives::{
    self, Location, Timestamp, ENTRIES, LOCATION_ENTRY, LOCATION_TABLE, SECTOR, TIMESTAMP_ENTRY,
    TIMESTAMP_TABLE,
};

/// A loaded `.mca`-style file: an ordered mapping `index -> payload`, plus
/// the on-disk timestamp table kept separately so evicting a payload via
/// [`SectorFile::reset_chunk`] never disturbs its slot's timestamp — per
/// §9, timestamps are preserved as written, not reset alongside their
/// chunk.
pub struct SectorFile<P: Payload> {
    entries: Vec<Option<P>>,
    timestamps: Vec<Timestamp>,
    dirty: bool,
}

pub type RegionFile = SectorFile<Chunk>;
pub type EntitiesFile = SectorFile<Entity>;

impl<P: Payload> SectorFile<P> {
    /// An empty file with no chunks at all, as produced by loading a
    /// zero-length or absent input.
    pub fn empty() -> Self {
        let mut entries = Vec::with_capacity(ENTRIES);
        entries.resize_with(ENTRIES, || None);
        SectorFile {
            entries,
            timestamps: vec![Timestamp::default(); ENTRIES],
            dirty: false,
        }
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn get(&self, index: usize) -> Option<&P> {
        self.entries[index].as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut P> {
        self.entries[index].as_mut()
    }

    /// Remove the payload at `index`, if present, and mark the file dirty.
    /// The slot's on-disk timestamp is left untouched.
    pub fn reset_chunk(&mut self, index: usize) {
        if self.entries[index].take().is_some() {
            self.dirty = true;
        }
    }

    /// Parse a whole file's bytes. A file shorter than the two header
    /// tables loads as empty, per §4.D.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LOCATION_TABLE + TIMESTAMP_TABLE {
            return Ok(Self::empty());
        }

        let mut locations = Vec::with_capacity(ENTRIES);
        for i in 0..ENTRIES {
            let start = i * LOCATION_ENTRY;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[start..start + LOCATION_ENTRY]);
            locations.push(Location::from_bytes(&buf));
        }

        let mut timestamps = Vec::with_capacity(ENTRIES);
        let ts_base = LOCATION_TABLE;
        for i in 0..ENTRIES {
            let start = ts_base + i * TIMESTAMP_ENTRY;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[start..start + TIMESTAMP_ENTRY]);
            timestamps.push(Timestamp::from_bytes(&buf));
        }

        let mut entries = Vec::with_capacity(ENTRIES);
        for i in 0..ENTRIES {
            let loc = locations[i];
            if loc.is_empty() {
                entries.push(None);
                continue;
            }
            let start = loc.offset as usize * SECTOR;
            let end = start + loc.sectors as usize * SECTOR;
            if end > bytes.len() {
                // Truncated tail: tolerate silently.
                entries.push(None);
                continue;
            }
            let slice = &bytes[start..end];
            match P::from_bytes(slice) {
                Ok(Some(payload)) => entries.push(Some(payload)),
                Ok(None) => entries.push(None),
                Err(_) => entries.push(None),
            }
        }

        Ok(SectorFile {
            entries,
            timestamps,
            dirty: false,
        })
    }

    /// Rebuild the on-disk layout from scratch: location/timestamp tables
    /// followed by each non-empty payload's bytes, sector-padded. Every
    /// slot's timestamp is re-emitted as stored, whether or not that slot
    /// still holds a payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let present: Vec<(usize, &P)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().filter(|p| !p.is_empty()).map(|p| (i, p)))
            .collect();

        let mut new_locations = vec![Location::EMPTY; ENTRIES];

        let mut payload_bytes = Vec::new();
        let mut cursor = primitives::FIRST_PAYLOAD_SECTOR as u32;

        for (i, payload) in present {
            let size = payload.size_on_disk();
            let sectors_needed = (size + SECTOR - 1) / SECTOR;
            if sectors_needed > u8::MAX as usize {
                return Err(Error::SectorCountOverflow {
                    index: i,
                    sectors: sectors_needed,
                });
            }
            new_locations[i] = Location {
                offset: cursor,
                sectors: sectors_needed as u8,
            };

            payload_bytes.extend_from_slice(payload.compressed_bytes());
            let padding = sectors_needed * SECTOR - size;
            payload_bytes.extend(std::iter::repeat(0u8).take(padding));

            cursor += sectors_needed as u32;
        }

        let mut out = Vec::with_capacity(LOCATION_TABLE + TIMESTAMP_TABLE + payload_bytes.len());
        for loc in &new_locations {
            out.extend_from_slice(&loc.to_bytes());
        }
        for ts in &self.timestamps {
            out.extend_from_slice(&ts.to_bytes());
        }
        out.extend_from_slice(&payload_bytes);

        Ok(out)
    }

    /// Union of indices present in `self` and `other`, with missing sides
    /// filled in with empty sentinels — used by
    /// [`crate::aggregate::Region::iterate`] to join a region file with
    /// its entities file.
    pub fn indices_union(&self, other: &SectorFile<impl Payload>) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..ENTRIES)
            .filter(|&i| self.entries[i].is_some() || other.entries[i].is_some())
            .collect();
        idx.sort_unstable();
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_load_to_empty_file() {
        let file = RegionFile::load(&[]).unwrap();
        assert!((0..ENTRIES).all(|i| file.get(i).is_none()));
    }

    #[test]
    fn zeroed_tables_round_trip_to_header_only_file() {
        let zeros = vec![0u8; LOCATION_TABLE + TIMESTAMP_TABLE];
        let file = RegionFile::load(&zeros).unwrap();
        let bytes = file.to_bytes().unwrap();
        assert_eq!(bytes, zeros);
    }

    #[test]
    fn reset_chunk_marks_dirty_only_when_something_was_removed() {
        let mut file = RegionFile::load(&vec![0u8; LOCATION_TABLE + TIMESTAMP_TABLE]).unwrap();
        assert!(!file.dirty());
        file.reset_chunk(5);
        assert!(!file.dirty()); // nothing was there to remove
    }

    fn long_field(name: &str, value: i64) -> Vec<u8> {
        let mut buf = vec![0x04];
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&value.to_be_bytes());
        buf
    }

    fn zlib_chunk_bytes(nbt_body: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression as FlateLevel;
        use std::io::Write;

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

    /// A slot's timestamp must survive `reset_chunk` evicting its payload:
    /// the location entry goes empty, but the timestamp byte range is
    /// re-emitted unchanged on the next `to_bytes`.
    #[test]
    fn reset_chunk_preserves_on_disk_timestamp() {
        let chunk_bytes = zlib_chunk_bytes(&long_field("InhabitedTime", 100));
        assert!(chunk_bytes.len() <= SECTOR);

        let mut file = vec![0u8; LOCATION_TABLE + TIMESTAMP_TABLE];
        file[0..4].copy_from_slice(&[0, 0, 2, 1]); // offset 2, 1 sector

        let ts_offset = LOCATION_TABLE;
        file[ts_offset..ts_offset + 4].copy_from_slice(&555u32.to_be_bytes());

        file.extend_from_slice(&chunk_bytes);
        file.extend(std::iter::repeat(0u8).take(SECTOR - chunk_bytes.len()));

        let mut loaded = RegionFile::load(&file).unwrap();
        assert!(loaded.get(0).is_some());

        loaded.reset_chunk(0);
        assert!(loaded.get(0).is_none());

        let out = loaded.to_bytes().unwrap();
        assert_eq!(&out[0..4], &[0, 0, 0, 0], "location entry goes empty");
        assert_eq!(
            &out[ts_offset..ts_offset + 4],
            &555u32.to_be_bytes(),
            "timestamp survives the payload's eviction"
        );
    }

    /// A slot that never held a payload keeps its on-disk timestamp too —
    /// `to_bytes` always re-emits the stored timestamp table verbatim.
    #[test]
    fn never_present_slot_keeps_its_timestamp() {
        let mut file = vec![0u8; LOCATION_TABLE + TIMESTAMP_TABLE];
        let ts_offset = LOCATION_TABLE + 5 * TIMESTAMP_ENTRY;
        file[ts_offset..ts_offset + 4].copy_from_slice(&9999u32.to_be_bytes());

        let loaded = RegionFile::load(&file).unwrap();
        let out = loaded.to_bytes().unwrap();

        assert_eq!(&out[ts_offset..ts_offset + 4], &9999u32.to_be_bytes());
    }
}
