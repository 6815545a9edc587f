//! Pairs a region's chunk file with its entities file for joint iteration
//! and eviction.

use crate::chunk::{Chunk, Payload};
use crate::entity::Entity;
use crate::error::Result;
use crate::region::{EntitiesFile, RegionFile};

/// One region: its chunk data and its sibling entity data, loaded
/// together and saved together.
pub struct Region {
    pub file_name: String,
    pub region: RegionFile,
    pub entities: EntitiesFile,
}

impl Region {
    pub fn new(file_name: String, region: RegionFile, entities: EntitiesFile) -> Self {
        Region {
            file_name,
            region,
            entities,
        }
    }

    /// Evict index `i` from both the chunk file and the entities file, so
    /// a chunk's world data and its entities vanish together.
    pub fn reset_chunk(&mut self, i: usize) {
        self.region.reset_chunk(i);
        self.entities.reset_chunk(i);
    }

    /// Apply `pred` to every present chunk and evict it (from both
    /// sides) if `pred` holds. Returns the number of chunks evicted.
    pub fn trim(&mut self, mut pred: impl FnMut(&Chunk) -> bool) -> usize {
        let mut evicted = 0;
        for i in 0..crate::primitives::ENTRIES {
            let should_evict = match self.region.get(i) {
                Some(chunk) if !chunk.is_empty() => pred(chunk),
                _ => false,
            };
            if should_evict {
                self.reset_chunk(i);
                evicted += 1;
            }
        }
        evicted
    }

    /// Yield `(index, chunk, entity)` across the union of indices present
    /// in either side; missing sides are filled with empty sentinels.
    pub fn iterate(&self) -> impl Iterator<Item = (usize, &Chunk, &Entity)> + '_ {
        static EMPTY_CHUNK: once_empty::Lazy<Chunk> = once_empty::Lazy::new(Chunk::empty);
        static EMPTY_ENTITY: once_empty::Lazy<Entity> = once_empty::Lazy::new(Entity::empty);

        let indices = self.region.indices_union(&self.entities);
        indices.into_iter().map(move |i| {
            let chunk = self.region.get(i).unwrap_or(&EMPTY_CHUNK);
            let entity = self.entities.get(i).unwrap_or(&EMPTY_ENTITY);
            (i, chunk, entity)
        })
    }
}

/// Tiny `OnceLock`-backed lazy static, avoiding an extra
/// `once_cell`/`lazy_static` dependency.
mod once_empty {
    use std::sync::OnceLock;

    pub struct Lazy<T> {
        cell: OnceLock<T>,
        init: fn() -> T,
    }

    impl<T> Lazy<T> {
        pub const fn new(init: fn() -> T) -> Self {
            Lazy {
                cell: OnceLock::new(),
                init,
            }
        }
    }

    impl<T> std::ops::Deref for Lazy<T> {
        type Target = T;
        fn deref(&self) -> &T {
            self.cell.get_or_init(self.init)
        }
    }
}

/// Load a region's paired files from their on-disk bytes. An absent
/// entities side is substituted with an empty file.
pub fn load(file_name: &str, region_bytes: &[u8], entities_bytes: Option<&[u8]>) -> Result<Region> {
    let region = RegionFile::load(region_bytes)?;
    let entities = match entities_bytes {
        Some(bytes) => EntitiesFile::load(bytes)?,
        None => EntitiesFile::empty(),
    };
    Ok(Region::new(file_name.to_string(), region, entities))
}
