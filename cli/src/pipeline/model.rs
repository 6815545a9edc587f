//! The JSON-serializable pipeline configuration: a tagged union of steps
//! plus the surrounding pipeline/config shape, grounded on
//! `pipeline.py`'s `pydantic` models with the same field names and
//! `command` discriminator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Condition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_inhabited_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_inhabited_minutes: Option<f64>,
}

impl Condition {
    /// `minimum_inhabited_minutes * 1200`, floored; `None` imposes no
    /// lower bound.
    pub fn minimum_ticks(&self) -> Option<i64> {
        self.minimum_inhabited_minutes.map(|m| (m * 1200.0).floor() as i64)
    }

    /// `maximum_inhabited_minutes * 1200`, ceiled; `None` imposes no
    /// upper bound.
    pub fn maximum_ticks(&self) -> Option<i64> {
        self.maximum_inhabited_minutes.map(|m| (m * 1200.0).ceil() as i64)
    }

    pub fn matches(&self, inhabited_time: i64) -> bool {
        let above_minimum = match self.minimum_ticks() {
            Some(min) => inhabited_time >= min,
            None => true,
        };
        let below_maximum = match self.maximum_ticks() {
            Some(max) => inhabited_time <= max,
            None => true,
        };
        above_minimum && below_maximum
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupVariant {
    EntireRegion,
    OnlyAffectedChunks,
}

impl Default for BackupVariant {
    fn default() -> Self {
        BackupVariant::EntireRegion
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Backup {
    pub destination: PathBuf,
    #[serde(default)]
    pub mode: BackupVariant,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Start {
    AllChunksSelected,
    NoChunksSelected,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "command")]
pub enum Step {
    #[serde(rename = "filter_selection")]
    FilterSelection { condition: Condition },
    #[serde(rename = "extend_selection")]
    ExtendSelection { condition: Condition },
    #[serde(rename = "radially_expand_selection")]
    RadiallyExpandSelection { radius: u32 },
    #[serde(rename = "save_selection")]
    SaveSelection {
        #[serde(rename = "MCASelector_csv_file")]
        mcaselector_csv_file: PathBuf,
    },
    #[serde(rename = "delete_selected_chunks")]
    DeleteSelectedChunks { backup: Backup },
    #[serde(rename = "select_affected_regions")]
    SelectAffectedRegions,
    #[serde(rename = "invert_selection")]
    InvertSelection,
    #[serde(rename = "move_selected")]
    MoveSelected {
        #[serde(default)]
        entire_region: bool,
        destination: PathBuf,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Pipeline {
    pub input_folder: PathBuf,
    pub start_with: Start,
    #[serde(default = "default_threads")]
    pub threads: usize,
    pub command_chain: Vec<Step>,
}

fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// The whole configuration file: a JSON array of pipelines.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Config {
    pub pipelines: Vec<Pipeline>,
}

impl Config {
    pub fn parse(json: &str) -> serde_json::Result<Config> {
        serde_json::from_str(json)
    }

    /// Checks invariants the JSON shape alone can't express, e.g. a
    /// `radially_expand_selection` radius must be positive (spec §7). Shared
    /// by `--validate` and `--run` so both reject the same configs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for pipeline in &self.pipelines {
            for step in &pipeline.command_chain {
                if let Step::RadiallyExpandSelection { radius } = step {
                    if *radius == 0 {
                        return Err(ValidationError(
                            "radially_expand_selection radius must be greater than 0".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filter_step_with_tag() {
        let json = r#"{"command": "filter_selection", "condition": {"minimum_inhabited_minutes": 1.0}}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(
            step,
            Step::FilterSelection {
                condition: Condition {
                    minimum_inhabited_minutes: Some(1.0),
                    maximum_inhabited_minutes: None,
                }
            }
        );
    }

    #[test]
    fn condition_tick_conversion_floors_min_ceils_max() {
        let c = Condition {
            minimum_inhabited_minutes: Some(0.5),
            maximum_inhabited_minutes: Some(0.5),
        };
        assert_eq!(c.minimum_ticks(), Some(600));
        assert_eq!(c.maximum_ticks(), Some(600));

        let c2 = Condition {
            minimum_inhabited_minutes: Some(0.4999),
            maximum_inhabited_minutes: Some(0.0001),
        };
        assert_eq!(c2.minimum_ticks(), Some(599));
        assert_eq!(c2.maximum_ticks(), Some(1));
    }

    #[test]
    fn parses_a_whole_pipeline_config() {
        let json = r#"[{
            "input_folder": "world",
            "start_with": "all_chunks_selected",
            "command_chain": [
                {"command": "invert_selection"},
                {"command": "select_affected_regions"}
            ]
        }]"#;
        let config = Config::parse(json).unwrap();
        assert_eq!(config.pipelines.len(), 1);
        assert_eq!(config.pipelines[0].command_chain.len(), 2);
        assert_eq!(config.pipelines[0].start_with, Start::AllChunksSelected);
    }

    #[test]
    fn validate_rejects_zero_radius() {
        let json = r#"[{
            "input_folder": "world",
            "start_with": "all_chunks_selected",
            "command_chain": [
                {"command": "radially_expand_selection", "radius": 0}
            ]
        }]"#;
        let config = Config::parse(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_positive_radius() {
        let json = r#"[{
            "input_folder": "world",
            "start_with": "all_chunks_selected",
            "command_chain": [
                {"command": "radially_expand_selection", "radius": 2}
            ]
        }]"#;
        let config = Config::parse(json).unwrap();
        assert!(config.validate().is_ok());
    }
}
