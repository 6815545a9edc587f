//! Interprets a [`super::model::Pipeline`]'s `command_chain` over a set of
//! `ChunkMetadata`, driving region I/O through
//! [`crate::pool::process_world`]. No direct Python executor for this
//! model was available to copy; built from the set-algebra rules spelled
//! out alongside the pipeline model itself, in the style
//! `commands.py::Trim.run` composes `RegionManager`/`process_world`.

use std::collections::HashSet;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::info;
use mcatrim_anvil::manager::{Paths, RegionManager};
use mcatrim_anvil::ChunkMetadata;
use mcatrim_anvil::Payload;
use rayon::prelude::*;

use crate::pipeline::model::{Backup, Condition, Pipeline, Start, Step};
use crate::pool::{process_world, CommandError, PoolResult, RegionCommand};

/// `K(r) = { (dx, dy) : dx^2 + dy^2 <= r^2, (dx, dy) != (0, 0) }`.
fn kernel(radius: i64) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            if (dx, dy) != (0, 0) && dx * dx + dy * dy <= radius * radius {
                out.push((dx, dy));
            }
        }
    }
    out
}

struct GatherMetadata;

impl RegionCommand<Vec<ChunkMetadata>> for GatherMetadata {
    fn run(&self, manager: &RegionManager, name: &str) -> PoolResult<Vec<ChunkMetadata>> {
        let region = manager.open_file(name).map_err(|e| CommandError {
            region_name: name.to_string(),
            message: e.to_string(),
        })?;

        let mut out = Vec::new();
        for (_, chunk, _entity) in region.iterate() {
            if chunk.is_empty() {
                continue;
            }
            let (x, z, inhabited) = match (chunk.x_pos(), chunk.z_pos(), chunk.inhabited_time()) {
                (Ok(x), Ok(z), Ok(it)) => (x, z, it),
                _ => continue,
            };
            out.push(ChunkMetadata::new(x, z, inhabited));
        }
        Ok(out)
    }
}

/// Selection state plus enough context (the world's manager and thread
/// count) to run every step of a pipeline.
pub struct Executor {
    manager: RegionManager,
    threads: Option<usize>,
    available: HashSet<ChunkMetadata>,
    selected: HashSet<ChunkMetadata>,
}

impl Executor {
    /// Enumerate region filenames under `input_folder/region`, gather
    /// `ChunkMetadata` for every decodable chunk, and seed `selected`
    /// per `start_with`.
    pub fn start(input_folder: &Path, start_with: Start, threads: usize) -> std::io::Result<Executor> {
        let manager = RegionManager::new(Paths::new(input_folder, None, None));
        let names = manager.region_names().map_err(to_io_error)?;

        let results: Vec<_> = process_world(&manager, Some(threads), names, GatherMetadata).collect();
        let mut available = HashSet::new();
        for result in results {
            match result {
                Ok(metas) => available.extend(metas),
                Err(e) => info!("skipping region during metadata gathering: {e}"),
            }
        }

        let selected = match start_with {
            Start::AllChunksSelected => available.clone(),
            Start::NoChunksSelected => HashSet::new(),
        };

        Ok(Executor {
            manager,
            threads: Some(threads),
            available,
            selected,
        })
    }

    pub fn selected_len(&self) -> usize {
        self.selected.len()
    }

    /// Run a whole pipeline's `command_chain`, logging the signed
    /// selection-size delta after every step.
    pub fn run_pipeline(&mut self, pipeline: &Pipeline) -> std::io::Result<()> {
        for step in &pipeline.command_chain {
            let before = self.selected.len() as i64;
            self.run_step(step)?;
            let after = self.selected.len() as i64;
            info!("{:?}: selection delta {:+}", step, after - before);
            debug_assert!(self.selected.is_subset(&self.available));
        }
        Ok(())
    }

    fn run_step(&mut self, step: &Step) -> std::io::Result<()> {
        match step {
            Step::FilterSelection { condition } => self.filter_selection(condition),
            Step::ExtendSelection { condition } => self.extend_selection(condition),
            Step::RadiallyExpandSelection { radius } => self.radially_expand_selection(*radius as i64),
            Step::SaveSelection { mcaselector_csv_file } => self.save_selection(mcaselector_csv_file)?,
            Step::DeleteSelectedChunks { backup } => self.delete_selected_chunks(backup)?,
            Step::SelectAffectedRegions => self.select_affected_regions(),
            Step::InvertSelection => self.invert_selection(),
            Step::MoveSelected {
                entire_region,
                destination,
            } => self.move_selected(destination, *entire_region)?,
        }
        Ok(())
    }

    fn filter_selection(&mut self, condition: &Condition) {
        self.selected.retain(|c| condition.matches(c.inhabited_time));
    }

    fn extend_selection(&mut self, condition: &Condition) {
        let additions: Vec<ChunkMetadata> = self
            .available
            .iter()
            .filter(|c| condition.matches(c.inhabited_time))
            .cloned()
            .collect();
        self.selected.extend(additions);
    }

    fn invert_selection(&mut self) {
        self.selected = self.available.difference(&self.selected).cloned().collect();
    }

    fn select_affected_regions(&mut self) {
        let affected_regions: HashSet<(i32, i32)> =
            self.selected.iter().map(ChunkMetadata::region_coord).collect();
        let additions: Vec<ChunkMetadata> = self
            .available
            .iter()
            .filter(|c| affected_regions.contains(&c.region_coord()))
            .cloned()
            .collect();
        self.selected.extend(additions);
    }

    /// §4.J's batched radial expansion: batches of 500 selected
    /// coordinates compute their neighbour sets in parallel and
    /// intersect with the unselected complement, before the union is
    /// mapped back onto `ChunkMetadata`.
    fn radially_expand_selection(&mut self, radius: i64) {
        if radius <= 0 {
            return;
        }
        let kernel = kernel(radius);
        let unselected: HashSet<(i32, i32)> = self
            .available
            .difference(&self.selected)
            .map(|c| (c.x, c.y))
            .collect();
        let selected_coords: Vec<(i32, i32)> = self.selected.iter().map(|c| (c.x, c.y)).collect();

        let newly_selected: HashSet<(i32, i32)> = selected_coords
            .par_chunks(500)
            .map(|batch| {
                let mut found = HashSet::new();
                for &(x, y) in batch {
                    for &(dx, dy) in &kernel {
                        let neighbour = (x + dx as i32, y + dy as i32);
                        if unselected.contains(&neighbour) {
                            found.insert(neighbour);
                        }
                    }
                }
                found
            })
            .reduce(HashSet::new, |mut acc, batch| {
                acc.extend(batch);
                acc
            });

        let additions: Vec<ChunkMetadata> = self
            .available
            .iter()
            .filter(|c| newly_selected.contains(&(c.x, c.y)))
            .cloned()
            .collect();
        self.selected.extend(additions);
    }

    /// Header-less, `;`-delimited, LF-terminated CSV: `region_x; region_y;
    /// chunk_x; chunk_y`, compatible with MCASelector's selection format.
    /// No `csv` crate is in the teacher stack, so this is hand-rolled
    /// with plain `write!`.
    fn save_selection(&self, path: &Path) -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        for chunk in &self.selected {
            let (rx, ry) = chunk.region_coord();
            writeln!(file, "{};{};{};{}", rx, ry, chunk.x, chunk.y)?;
        }
        Ok(())
    }

    fn affected_region_names(&self) -> Vec<String> {
        let mut names: Vec<(i32, i32)> = self
            .selected
            .iter()
            .map(ChunkMetadata::region_coord)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort_unstable();
        names
            .into_iter()
            .map(|(rx, ry)| format!("r.{rx}.{ry}.mca"))
            .collect()
    }

    fn delete_selected_chunks(&mut self, backup: &Backup) -> std::io::Result<()> {
        fs::create_dir_all(backup.destination.join("region"))?;
        fs::create_dir_all(backup.destination.join("entities"))?;

        let names = self.affected_region_names();
        let command = DeleteChunks {
            selected: self.selected.clone(),
            backup: backup.clone(),
        };
        for result in process_world(&self.manager, self.threads, names, command) {
            if let Err(e) = result {
                info!("failed to delete chunks in '{}': {}", e.region_name, e.message);
            }
        }

        self.selected.clear();
        Ok(())
    }

    fn move_selected(&mut self, destination: &Path, entire_region: bool) -> std::io::Result<()> {
        let names = self.affected_region_names();
        let command = MoveChunks {
            selected: self.selected.clone(),
            destination: destination.to_path_buf(),
            entire_region,
        };
        for result in process_world(&self.manager, self.threads, names, command) {
            if let Err(e) = result {
                info!("failed to move chunks in '{}': {}", e.region_name, e.message);
            }
        }

        self.selected.clear();
        Ok(())
    }
}

/// `only_affected_chunks` vs `entire_region` both back up the whole file
/// verbatim: the on-disk original is the only copy available before this
/// worker evicts chunks from its in-memory copy, and a subset-only backup
/// would still need a full region rebuild to stay a valid region file.
struct DeleteChunks {
    selected: HashSet<ChunkMetadata>,
    backup: Backup,
}

impl RegionCommand<()> for DeleteChunks {
    fn run(&self, manager: &RegionManager, name: &str) -> PoolResult<()> {
        let err = |message: String| CommandError {
            region_name: name.to_string(),
            message,
        };
        let mut region = manager.open_file(name).map_err(|e| err(e.to_string()))?;

        let _ = self.backup.mode; // both variants take the same whole-file path, see struct docs
        let region_path = manager.paths().inp_region.join(name);
        if region_path.exists() {
            let dest = self.backup.destination.join("region").join(name);
            let _ = fs::copy(&region_path, &dest);
        }
        let entities_path = manager.paths().inp_entities.join(name);
        if entities_path.exists() {
            let dest = self.backup.destination.join("entities").join(name);
            let _ = fs::copy(&entities_path, &dest);
        }

        for i in 0..mcatrim_anvil::primitives::ENTRIES {
            let (x, z) = index_to_coord(name, i);
            if self.selected.contains(&ChunkMetadata::new(x, z, 0)) {
                region.reset_chunk(i);
            }
        }

        let errors = manager.save_to_file(&region, name);
        if let Some(first) = errors.into_iter().next() {
            return Err(err(first.to_string()));
        }
        Ok(())
    }
}

struct MoveChunks {
    selected: HashSet<ChunkMetadata>,
    destination: PathBuf,
    entire_region: bool,
}

impl RegionCommand<()> for MoveChunks {
    fn run(&self, manager: &RegionManager, name: &str) -> PoolResult<()> {
        let err = |message: String| CommandError {
            region_name: name.to_string(),
            message,
        };
        let dest_manager = RegionManager::new(Paths::new(
            manager.paths().inp_region.parent().unwrap_or(Path::new(".")),
            Some(&self.destination),
            None,
        ));

        let mut region = manager.open_file(name).map_err(|e| err(e.to_string()))?;

        if let Some(first) = dest_manager.save_to_file(&region, name).into_iter().next() {
            return Err(err(first.to_string()));
        }

        if !self.entire_region {
            // Only the selected chunks were meant to move: evict everything
            // else from the copy just written by re-saving a trimmed
            // version at the destination.
            for i in 0..mcatrim_anvil::primitives::ENTRIES {
                let (x, z) = index_to_coord(name, i);
                if !self.selected.contains(&ChunkMetadata::new(x, z, 0)) {
                    region.reset_chunk(i);
                }
            }
            if let Some(first) = dest_manager.save_to_file(&region, name).into_iter().next() {
                return Err(err(first.to_string()));
            }
        }

        // The chunks have moved: remove them from the source.
        let mut source_region = manager.open_file(name).map_err(|e| err(e.to_string()))?;
        for i in 0..mcatrim_anvil::primitives::ENTRIES {
            let (x, z) = index_to_coord(name, i);
            if self.selected.contains(&ChunkMetadata::new(x, z, 0)) {
                source_region.reset_chunk(i);
            }
        }
        if let Some(first) = manager.save_to_file(&source_region, name).into_iter().next() {
            return Err(err(first.to_string()));
        }
        Ok(())
    }
}

/// Recover a chunk's absolute `(x, z)` from its region filename and
/// local index, the inverse of `local_index`/region-coord derivation.
fn index_to_coord(region_name: &str, index: usize) -> (i32, i32) {
    let parts: Vec<&str> = region_name.split('.').collect();
    let rx: i32 = parts[1].parse().unwrap_or(0);
    let rz: i32 = parts[2].parse().unwrap_or(0);
    let local_x = (index % 32) as i32;
    let local_z = (index / 32) as i32;
    (rx * 32 + local_x, rz * 32 + local_z)
}

fn to_io_error(e: mcatrim_anvil::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}
