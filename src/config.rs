//! The immutable run configuration shared read-only by every partition.
//!
//! The coordinator constructs one [`SimConfig`], validates it, and hands it
//! to partitions behind an `Arc`. Partitions never mutate it; anything a
//! partition needs to route a message (entity counts, partition counts, grid
//! dimensions) is derived from this record, so no global mutable state
//! exists anywhere in the simulation.

use crate::delivery::DeliveryMode;
use crate::error::NososError;
use crate::grid::LocationGrid;
use crate::index::PartitionMap;
use crate::Id;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default mean of the Poisson hop budget for synthetic visit destinations.
pub const DEFAULT_VISIT_DISTANCE_LAMBDA: f64 = 1.0;

fn default_num_visit_days() -> u32 {
    1
}

fn default_visit_distance_lambda() -> f64 {
    DEFAULT_VISIT_DISTANCE_LAMBDA
}

/// Parameters of a synthetic (file-less) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub location_grid_width: i64,
    pub location_grid_height: i64,
    /// Location partitions per grid row.
    pub partition_grid_cols: i64,
    /// Location partitions per grid column.
    pub partition_grid_rows: i64,
    /// Mean of the Poisson draw for visits per person per day.
    pub average_degree: f64,
    #[serde(default = "default_visit_distance_lambda")]
    pub visit_distance_lambda: f64,
}

/// Where the population comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    Synthetic(SyntheticConfig),
    /// Directory holding `people.csv`, `locations.csv`, `visits.csv`, the
    /// schema and model definitions, and the offset caches.
    Real { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub num_people: u64,
    pub num_locations: u64,
    pub num_people_partitions: usize,
    pub num_location_partitions: usize,
    pub num_days: u32,
    /// Days with distinct visit schedules; replay wraps modulo this count.
    #[serde(default = "default_num_visit_days")]
    pub num_visit_days: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub initial_infections: u64,
    #[serde(default)]
    pub first_person_id: Id,
    #[serde(default)]
    pub first_location_id: Id,
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub use_interventions: bool,
    pub scenario: Scenario,
}

impl SimConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_json(path: &Path) -> Result<SimConfig, NososError> {
        let contents = fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Checks internal consistency. Every constructor of simulation state
    /// assumes a validated configuration.
    pub fn validate(&self) -> Result<(), NososError> {
        if self.num_people == 0 || self.num_locations == 0 {
            return Err(NososError::Config(
                "population and location counts must be positive".to_string(),
            ));
        }
        if self.num_people_partitions == 0
            || self.num_people_partitions as u64 > self.num_people
        {
            return Err(NososError::Config(format!(
                "{} people cannot fill {} partitions",
                self.num_people, self.num_people_partitions
            )));
        }
        if self.num_location_partitions == 0
            || self.num_location_partitions as u64 > self.num_locations
        {
            return Err(NososError::Config(format!(
                "{} locations cannot fill {} partitions",
                self.num_locations, self.num_location_partitions
            )));
        }
        if self.num_days == 0 || self.num_visit_days == 0 {
            return Err(NososError::Config(
                "day counts must be positive".to_string(),
            ));
        }
        if self.initial_infections > self.num_people {
            return Err(NososError::Config(format!(
                "cannot seed {} infections into {} people",
                self.initial_infections, self.num_people
            )));
        }
        if let DeliveryMode::Aggregated { capacity } = self.delivery {
            if capacity == 0 {
                return Err(NososError::Config(
                    "aggregated delivery needs a positive batch capacity".to_string(),
                ));
            }
        }
        if let Scenario::Synthetic(synthetic) = &self.scenario {
            let grid = self.location_grid()?.ok_or_else(|| {
                NososError::Config("synthetic scenario without a grid".to_string())
            })?;
            if grid.num_locations() != self.num_locations {
                return Err(NososError::Config(format!(
                    "location grid holds {} locations, configuration says {}",
                    grid.num_locations(),
                    self.num_locations
                )));
            }
            if (grid.partition_cols * grid.partition_rows) as usize
                != self.num_location_partitions
            {
                return Err(NososError::Config(format!(
                    "partition grid holds {} partitions, configuration says {}",
                    grid.partition_cols * grid.partition_rows,
                    self.num_location_partitions
                )));
            }
            if synthetic.average_degree <= 0.0 {
                return Err(NososError::Config(format!(
                    "average visit degree {} must be positive",
                    synthetic.average_degree
                )));
            }
            if synthetic.visit_distance_lambda <= 0.0 {
                return Err(NososError::Config(format!(
                    "visit distance lambda {} must be positive",
                    synthetic.visit_distance_lambda
                )));
            }
        }
        Ok(())
    }

    /// Deterministic tag for cache files: runs sharing a partitioning reuse
    /// each other's preprocessing.
    #[must_use]
    pub fn scenario_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.num_people,
            self.num_people_partitions,
            self.num_locations,
            self.num_location_partitions
        )
    }

    #[must_use]
    pub fn people_map(&self) -> PartitionMap {
        PartitionMap::new(
            self.num_people,
            self.num_people_partitions,
            self.first_person_id,
        )
    }

    #[must_use]
    pub fn location_map(&self) -> PartitionMap {
        PartitionMap::new(
            self.num_locations,
            self.num_location_partitions,
            self.first_location_id,
        )
    }

    /// The synthetic location grid, if this is a synthetic run.
    pub fn location_grid(&self) -> Result<Option<LocationGrid>, NososError> {
        match &self.scenario {
            Scenario::Synthetic(synthetic) => Ok(Some(LocationGrid::new(
                synthetic.location_grid_width,
                synthetic.location_grid_height,
                synthetic.partition_grid_cols,
                synthetic.partition_grid_rows,
            )?)),
            Scenario::Real { .. } => Ok(None),
        }
    }

    /// The scenario directory for a real-data run.
    pub fn scenario_path(&self) -> Result<&Path, NososError> {
        match &self.scenario {
            Scenario::Real { path } => Ok(path),
            Scenario::Synthetic(_) => Err(NososError::Config(
                "synthetic run has no scenario directory".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn synthetic_config() -> SimConfig {
        SimConfig {
            num_people: 60,
            num_locations: 16,
            num_people_partitions: 2,
            num_location_partitions: 4,
            num_days: 5,
            num_visit_days: 1,
            seed: 42,
            initial_infections: 3,
            first_person_id: 0,
            first_location_id: 0,
            delivery: DeliveryMode::Direct,
            use_interventions: false,
            scenario: Scenario::Synthetic(SyntheticConfig {
                location_grid_width: 4,
                location_grid_height: 4,
                partition_grid_cols: 2,
                partition_grid_rows: 2,
                average_degree: 3.0,
                visit_distance_lambda: 1.0,
            }),
        }
    }

    #[test]
    fn valid_synthetic_config_passes() {
        assert!(synthetic_config().validate().is_ok());
    }

    #[test]
    fn grid_mismatch_is_rejected() {
        let mut config = synthetic_config();
        config.num_locations = 20;
        assert!(matches!(config.validate(), Err(NososError::Config(_))));
    }

    #[test]
    fn partition_grid_mismatch_is_rejected() {
        let mut config = synthetic_config();
        config.num_location_partitions = 2;
        assert!(matches!(config.validate(), Err(NososError::Config(_))));
    }

    #[test]
    fn more_partitions_than_entities_is_rejected() {
        let mut config = synthetic_config();
        config.num_people_partitions = 61;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_aggregation_capacity_is_rejected() {
        let mut config = synthetic_config();
        config.delivery = DeliveryMode::Aggregated { capacity: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn scenario_id_is_deterministic() {
        assert_eq!(synthetic_config().scenario_id(), "60_2_16_4");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = synthetic_config();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<SimConfig>(&json).unwrap(), config);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let json = r#"{
            "num_people": 10,
            "num_locations": 4,
            "num_people_partitions": 1,
            "num_location_partitions": 1,
            "num_days": 2,
            "scenario": {
                "type": "synthetic",
                "location_grid_width": 2,
                "location_grid_height": 2,
                "partition_grid_cols": 1,
                "partition_grid_rows": 1,
                "average_degree": 1.0
            }
        }"#;
        let config: SimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.num_visit_days, 1);
        assert_eq!(config.delivery, DeliveryMode::Direct);
        assert_eq!(config.seed, 0);
        assert!(config.validate().is_ok());
    }
}
