//! A shard of the location population.
//!
//! Each partition owns a contiguous block of locations and a generator
//! shared by its contact model calls. Visit messages accumulate as paired
//! events on their target locations; once the day's visits are all in, the
//! partition sweeps every location, groups the resulting interactions by
//! target person, and dispatches them to the owning people partitions.

use crate::config::SimConfig;
use crate::contact::ContactModel;
use crate::delivery::Delivery;
use crate::disease::DiseaseModel;
use crate::error::NososError;
use crate::location::Location;
use crate::messages::{Interaction, InteractionMessage, VisitMessage};
use crate::rng::{partition_rng, SimRng};
use crate::{Counter, Id};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationPartition {
    index: usize,
    day: u32,
    locations: Vec<Location>,
    rng: SimRng,
}

impl LocationPartition {
    /// Wraps an already-loaded block of locations.
    #[must_use]
    pub fn from_parts(
        index: usize,
        locations: Vec<Location>,
        config: &SimConfig,
    ) -> LocationPartition {
        LocationPartition {
            index,
            day: 0,
            locations,
            rng: partition_rng(config.seed, "locations", index),
        }
    }

    /// Creates this partition's block of synthetic locations (no file
    /// attributes) and lets the contact model derive its per-location
    /// values.
    pub fn synthetic(
        index: usize,
        config: &SimConfig,
        disease: &DiseaseModel,
        contact: &ContactModel,
    ) -> Result<LocationPartition, NososError> {
        let map = config.location_map();
        let first = map.first_global_id_of(index);
        let count = map.local_count(index);
        let mut locations = Vec::with_capacity(count);
        for i in 0..count {
            let mut location =
                Location::new(first + i as u64, disease.location_def.default_cells());
            contact.compute_location_values(disease, &mut location);
            locations.push(location);
        }
        debug!("location partition {index}: created {count} synthetic locations from id {first}");
        Ok(LocationPartition::from_parts(index, locations, config))
    }

    /// Queues one visit's arrival/departure pair on its target location.
    /// A visit addressed to a location this partition does not own means a
    /// routing bug somewhere upstream and aborts the run.
    pub fn receive_visit(
        &mut self,
        config: &SimConfig,
        visit: VisitMessage,
    ) -> Result<(), NososError> {
        let (owner, local) = config.location_map().locate(visit.location)?;
        if owner != self.index {
            return Err(NososError::Index(format!(
                "location partition {}: visit by person {} to location {} belongs to \
                 partition {owner}",
                self.index, visit.person, visit.location
            )));
        }
        let location = &mut self.locations[local];
        if location.unique_id != visit.location {
            return Err(NososError::Index(format!(
                "location partition {}: visit to location {} delivered to location {}",
                self.index, visit.location, location.unique_id
            )));
        }
        location.add_visit(&visit)
    }

    /// Sweeps every location's events into interactions and dispatches them,
    /// one message per exposed person per location, to the partitions owning
    /// the targets. Returns the interaction count, this partition's
    /// contribution to the day's reduction, and advances the day.
    pub fn compute_interactions(
        &mut self,
        config: &SimConfig,
        disease: &DiseaseModel,
        contact: &ContactModel,
        delivery: &mut dyn Delivery<InteractionMessage>,
    ) -> Result<Counter, NososError> {
        let people_map = config.people_map();
        let mut num_visits: Counter = 0;
        let mut emitted: Counter = 0;
        for location in &mut self.locations {
            num_visits += location.num_events() as Counter / 2;
            // Group by target so each person gets one message per location;
            // the ordered map keeps dispatch deterministic.
            let mut per_person: BTreeMap<Id, Vec<Interaction>> = BTreeMap::new();
            emitted += location.process_events(
                disease,
                contact,
                &mut self.rng,
                &mut |target, interaction| {
                    per_person.entry(target).or_default().push(interaction);
                },
            );
            for (target, interactions) in per_person {
                let owner = people_map.partition_of(target)?;
                delivery.send(owner, InteractionMessage { target, interactions });
            }
        }
        debug!(
            "location partition {}: day {} processed {num_visits} visits into {emitted} \
             interactions",
            self.index, self.day
        );
        self.day += 1;
        Ok(emitted)
    }

    /// Serializes the full partition state for migration.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NososError> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Rebuilds a migrated partition. The contact model is reconstructed by
    /// the coordinator and re-wired to this partition's generator on the
    /// next sweep; only owned state travels.
    pub fn from_bytes(bytes: &[u8]) -> Result<LocationPartition, NososError> {
        let (partition, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(partition)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.day
    }

    #[must_use]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    #[must_use]
    pub fn locations_mut(&mut self) -> &mut Vec<Location> {
        &mut self.locations
    }
}
