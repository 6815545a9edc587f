//! Maps region filenames to loaded regions and applies the
//! backup-then-write save policy.

use std::fs;
use std::path::{Path, PathBuf};

use crate::aggregate::{self, Region};
use crate::error::{PathError, Result};

/// The directory bundle a [`RegionManager`] reads from and writes to,
/// derived from a single input root plus optional output/backup
/// overrides. When `outp` is unset, output paths equal input paths (an
/// in-place edit).
#[derive(Debug, Clone)]
pub struct Paths {
    pub inp_region: PathBuf,
    pub inp_entities: PathBuf,
    pub outp_region: PathBuf,
    pub outp_entities: PathBuf,
    pub backup_region: Option<PathBuf>,
    pub backup_entities: Option<PathBuf>,
}

impl Paths {
    pub fn new(inp: &Path, outp: Option<&Path>, backup: Option<&Path>) -> Paths {
        let outp = outp.unwrap_or(inp);
        Paths {
            inp_region: inp.join("region"),
            inp_entities: inp.join("entities"),
            outp_region: outp.join("region"),
            outp_entities: outp.join("entities"),
            backup_region: backup.map(|b| b.join("region")),
            backup_entities: backup.map(|b| b.join("entities")),
        }
    }
}

/// Owns the directory bundle and the open/save lifecycle for regions.
#[derive(Clone)]
pub struct RegionManager {
    paths: Paths,
}

impl RegionManager {
    pub fn new(paths: Paths) -> Self {
        RegionManager { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn region_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.paths.inp_region.is_dir() {
            return Ok(names);
        }
        for entry in fs::read_dir(&self.paths.inp_region)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if is_region_filename(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn open_file(&self, name: &str) -> Result<Region> {
        let region_path = self.paths.inp_region.join(name);
        let region_bytes = fs::read(&region_path)?;

        let entities_path = self.paths.inp_entities.join(name);
        let entities_bytes = fs::read(&entities_path).ok();

        aggregate::load(name, &region_bytes, entities_bytes.as_deref())
    }

    /// Apply §4.G's save policy: back up dirty originals before
    /// overwriting, and mirror clean files unchanged when input and
    /// output trees differ. Returns any path-level failures without
    /// aborting the rest of the region's save.
    pub fn save_to_file(&self, region: &Region, name: &str) -> Vec<PathError> {
        let mut errors = Vec::new();

        if let Err(e) = self.save_side(
            &self.paths.inp_region,
            &self.paths.outp_region,
            self.paths.backup_region.as_deref(),
            name,
            region.region.dirty(),
            || region.region.to_bytes().map_err(|e: crate::error::Error| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        ) {
            errors.push(e);
        }

        if let Err(e) = self.save_side(
            &self.paths.inp_entities,
            &self.paths.outp_entities,
            self.paths.backup_entities.as_deref(),
            name,
            region.entities.dirty(),
            || region.entities.to_bytes().map_err(|e: crate::error::Error| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        ) {
            errors.push(e);
        }

        errors
    }

    #[allow(clippy::too_many_arguments)]
    fn save_side(
        &self,
        inp_dir: &Path,
        outp_dir: &Path,
        backup_dir: Option<&Path>,
        name: &str,
        dirty: bool,
        rebuild: impl FnOnce() -> std::io::Result<Vec<u8>>,
    ) -> std::result::Result<(), PathError> {
        let inp_path = inp_dir.join(name);
        if !inp_path.exists() {
            return Ok(());
        }
        let outp_path = outp_dir.join(name);

        if dirty {
            if let Some(backup_dir) = backup_dir {
                fs::create_dir_all(backup_dir).map_err(|source| PathError {
                    path: backup_dir.to_path_buf(),
                    source,
                })?;
                let backup_path = backup_dir.join(name);
                fs::copy(&inp_path, &backup_path).map_err(|source| PathError {
                    path: backup_path,
                    source,
                })?;
            }
            let bytes = rebuild().map_err(|source| PathError {
                path: outp_path.clone(),
                source,
            })?;
            if let Some(parent) = outp_path.parent() {
                fs::create_dir_all(parent).map_err(|source| PathError {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&outp_path, bytes).map_err(|source| PathError {
                path: outp_path,
                source,
            })
        } else if inp_path != outp_path {
            if let Some(parent) = outp_path.parent() {
                fs::create_dir_all(parent).map_err(|source| PathError {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::copy(&inp_path, &outp_path)
                .map(|_| ())
                .map_err(|source| PathError {
                    path: outp_path,
                    source,
                })
        } else {
            Ok(())
        }
    }
}

/// Matches `r.<int>.<int>.mca`.
fn is_region_filename(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts[0] == "r"
        && parts[1].parse::<i32>().is_ok()
        && parts[2].parse::<i32>().is_ok()
        && parts[3] == "mca"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_filename_pattern() {
        assert!(is_region_filename("r.0.0.mca"));
        assert!(is_region_filename("r.-1.32.mca"));
        assert!(!is_region_filename("r.0.mca"));
        assert!(!is_region_filename("region.0.0.mca"));
        assert!(!is_region_filename("r.0.0.dat"));
    }

    #[test]
    fn paths_default_output_to_input_when_unset() {
        let paths = Paths::new(Path::new("/world"), None, None);
        assert_eq!(paths.outp_region, paths.inp_region);
        assert_eq!(paths.outp_entities, paths.inp_entities);
    }
}
