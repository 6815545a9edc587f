//! The `trim` subcommand: evict chunks below an `InhabitedTime` threshold
//! across a whole world tree, driven by [`crate::pool::process_world`].

use log::info;
use mcatrim_anvil::manager::RegionManager;

use crate::pool::{CommandError, PoolResult, RegionCommand};

/// Built-in criteria keys and their tick thresholds, matching
/// `commands.py::Trim`'s `CRITERIA_MAPPING` verbatim.
pub const CRITERIA_MAPPING: &[(&str, i64)] = &[
    ("inhabited_time<15s", 300),
    ("inhabited_time<30s", 600),
    ("inhabited_time<1m", 1200),
    ("inhabited_time<2m", 2400),
    ("inhabited_time<3m", 3600),
    ("inhabited_time<5m", 6000),
    ("inhabited_time<10m", 12000),
];

pub fn threshold_for_criteria(key: &str) -> Option<i64> {
    CRITERIA_MAPPING
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, ticks)| *ticks)
}

/// Evicts every chunk whose `InhabitedTime` is at or below `threshold_ticks`.
pub struct Trim {
    pub threshold_ticks: i64,
}

impl RegionCommand<usize> for Trim {
    fn run(&self, manager: &RegionManager, name: &str) -> PoolResult<usize> {
        let mut region = manager.open_file(name).map_err(|e| CommandError {
            region_name: name.to_string(),
            message: e.to_string(),
        })?;

        let evicted = region.trim(|chunk| match chunk.inhabited_time() {
            Ok(ticks) => ticks <= self.threshold_ticks,
            Err(_) => false,
        });

        let errors = manager.save_to_file(&region, name);
        if let Some(first) = errors.into_iter().next() {
            return Err(CommandError {
                region_name: name.to_string(),
                message: first.to_string(),
            });
        }

        if evicted > 0 {
            info!("{name}: evicted {evicted} chunk(s)");
        }
        Ok(evicted)
    }
}
