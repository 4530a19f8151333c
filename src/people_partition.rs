//! A shard of the person population.
//!
//! Each partition owns a contiguous block of people, its own random number
//! generator, and a per-day state summary matrix. During a day it dispatches
//! visit messages (replayed from loaded schedules or generated
//! synthetically), absorbs the interactions that come back, and finally runs
//! every person's exposure roll and state machine before contributing to the
//! day's reductions.

use crate::attributes::AttributeValue;
use crate::config::{Scenario, SimConfig, SyntheticConfig};
use crate::delivery::Delivery;
use crate::disease::DiseaseModel;
use crate::error::NososError;
use crate::interventions::Intervention;
use crate::messages::{InteractionMessage, VisitMessage};
use crate::person::Person;
use crate::rng::{partition_rng, SimRng};
use crate::{Counter, DAY_LENGTH};
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PeoplePartition {
    index: usize,
    day: u32,
    people: Vec<Person>,
    rng: SimRng,
    total_visits_for_day: Counter,
    /// Dense (day × slot) counters: slot 0 holds visits, slot 1 exposures,
    /// slots 2.. the per-state population counts.
    state_summary: Vec<Counter>,
}

impl PeoplePartition {
    /// Wraps an already-loaded block of people. The state summary is sized
    /// for the configured horizon; the generator is derived from the run
    /// seed and the partition index.
    #[must_use]
    pub fn from_parts(
        index: usize,
        people: Vec<Person>,
        config: &SimConfig,
        disease: &DiseaseModel,
    ) -> PeoplePartition {
        let slots = disease.num_states() + 2;
        PeoplePartition {
            index,
            day: 0,
            people,
            rng: partition_rng(config.seed, "people", index),
            total_visits_for_day: 0,
            state_summary: vec![0; slots * config.num_days as usize],
        }
    }

    /// Creates this partition's block of synthetic people: everyone starts
    /// healthy with a random age, then compliance is sampled and the initial
    /// infections are seeded.
    pub fn synthetic(
        index: usize,
        config: &SimConfig,
        disease: &DiseaseModel,
    ) -> Result<PeoplePartition, NososError> {
        let map = config.people_map();
        let first = map.first_global_id_of(index);
        let count = map.local_count(index);
        let age_slot = disease.person_table.index_of("age");
        let susceptibility_slot = disease.person_table.index_of("susceptibility");

        let mut partition = PeoplePartition::from_parts(index, Vec::new(), config, disease);
        partition.people.reserve(count);
        for i in 0..count {
            let mut attributes = disease.person_def.default_cells();
            if let Some(slot) = age_slot {
                attributes[slot] = AttributeValue::Int(partition.rng.random_range(0..=100));
            }
            if let Some(slot) = susceptibility_slot {
                attributes[slot] = AttributeValue::Double(1.0);
            }
            partition
                .people
                .push(Person::new(first + i as u64, disease.healthy_state(), attributes));
        }
        partition.sample_compliance(disease);
        partition.seed_infections(config, disease)?;
        debug!(
            "people partition {index}: created {count} synthetic people from id {first}"
        );
        Ok(partition)
    }

    /// Samples each person's isolation compliance against the model's
    /// self-isolation intervention. Done once at load.
    pub fn sample_compliance(&mut self, disease: &DiseaseModel) {
        let compliance = disease.isolation_compliance();
        for person in &mut self.people {
            person.will_comply = self.rng.random::<f64>() < compliance;
        }
    }

    /// Starts the disease progression for the configured initial infections
    /// (the lowest global person ids).
    pub fn seed_infections(
        &mut self,
        config: &SimConfig,
        disease: &DiseaseModel,
    ) -> Result<(), NososError> {
        let cutoff = config.first_person_id + config.initial_infections;
        for person in &mut self.people {
            if person.unique_id < cutoff {
                person.begin_progression(disease, &mut self.rng)?;
            }
        }
        Ok(())
    }

    /// Emits today's visit messages for every non-isolating person and
    /// returns the count, this partition's contribution to the visit
    /// reduction.
    pub fn send_visit_messages(
        &mut self,
        config: &SimConfig,
        disease: &DiseaseModel,
        delivery: &mut dyn Delivery<VisitMessage>,
    ) -> Result<Counter, NososError> {
        self.total_visits_for_day = 0;
        match &config.scenario {
            Scenario::Synthetic(synthetic) => {
                self.synthetic_visits(config, synthetic, disease, delivery)?;
            }
            Scenario::Real { .. } => self.replay_visits(config, disease, delivery)?,
        }
        Ok(self.total_visits_for_day)
    }

    /// Generates one day of random visits per person: a Poisson visit count,
    /// uniform start/end times, and destinations a Poisson number of grid
    /// hops from the person's home location.
    fn synthetic_visits(
        &mut self,
        config: &SimConfig,
        synthetic: &SyntheticConfig,
        disease: &DiseaseModel,
        delivery: &mut dyn Delivery<VisitMessage>,
    ) -> Result<(), NososError> {
        let grid = config.location_grid()?.ok_or_else(|| {
            NososError::Config("synthetic visit generation without a grid".to_string())
        })?;
        let location_map = config.location_map();
        let visit_count = Poisson::new(synthetic.average_degree)
            .map_err(|error| NososError::Config(format!("bad average degree: {error}")))?;
        let hop_count = Poisson::new(synthetic.visit_distance_lambda)
            .map_err(|error| NososError::Config(format!("bad visit distance: {error}")))?;

        // Every person in this partition shares one home tile.
        let home_partition = self.index % config.num_location_partitions;
        let (home_start_x, home_start_y) = grid.tile_origin(home_partition);
        let home_locations = location_map.local_count(home_partition) as u64;

        for person in &self.people {
            if person.is_isolating && disease.is_infectious(person.state) {
                continue;
            }
            // TODO: the home slot is offset by the location id base rather
            // than the person id base; revisit if the two bases ever differ.
            let local_slot =
                person.unique_id.wrapping_sub(config.first_location_id) % home_locations;
            let home_x = home_start_x + (local_slot as i64) % grid.tile_width;
            let home_y = home_start_y + (local_slot as i64) / grid.tile_width;

            let num_visits = visit_count.sample(&mut self.rng) as usize;
            let mut times: Vec<crate::Time> = (0..2 * num_visits)
                .map(|_| self.rng.random_range(0..=DAY_LENGTH))
                .collect();
            times.sort_unstable();

            for pair in times.chunks_exact(2) {
                let (start, end) = (pair[0], pair[1]);
                if start == end {
                    continue;
                }
                let hops =
                    (hop_count.sample(&mut self.rng) as i64).min(grid.manhattan_radius());
                let (dx, dy) = grid.random_offsets(home_x, home_y, hops, &mut self.rng);
                let destination =
                    grid.index_of(home_x + dx, home_y + dy) + config.first_location_id;
                let target = location_map.partition_of(destination)?;
                delivery.send(
                    target,
                    VisitMessage {
                        location: destination,
                        person: person.unique_id,
                        person_state: person.state,
                        start_time: start,
                        end_time: end,
                    },
                );
                self.total_visits_for_day += 1;
            }
        }
        Ok(())
    }

    /// Replays the loaded visit schedule for today, stamping each message
    /// with the person's current state.
    fn replay_visits(
        &mut self,
        config: &SimConfig,
        disease: &DiseaseModel,
        delivery: &mut dyn Delivery<VisitMessage>,
    ) -> Result<(), NososError> {
        let location_map = config.location_map();
        let day_index = (self.day % config.num_visit_days) as usize;
        for person in &self.people {
            if person.is_isolating && disease.is_infectious(person.state) {
                continue;
            }
            let Some(day_visits) = person.visits_by_day.get(day_index) else {
                continue;
            };
            for visit in day_visits {
                let mut message = visit.clone();
                message.person_state = person.state;
                let target = location_map.partition_of(message.location)?;
                delivery.send(target, message);
                self.total_visits_for_day += 1;
            }
        }
        Ok(())
    }

    /// Buffers a batch of interactions for one of this partition's people.
    pub fn receive_interactions(
        &mut self,
        config: &SimConfig,
        message: InteractionMessage,
    ) -> Result<(), NososError> {
        let (owner, local) = config.people_map().locate(message.target)?;
        if owner != self.index {
            return Err(NososError::Index(format!(
                "people partition {}: interactions for person {} belong to partition {owner}",
                self.index, message.target
            )));
        }
        let person = &mut self.people[local];
        if person.unique_id != message.target {
            return Err(NososError::Index(format!(
                "people partition {}: interactions for person {} delivered to person {}",
                self.index, message.target, person.unique_id
            )));
        }
        person.interactions.extend(message.interactions);
        Ok(())
    }

    /// Tests the intervention's predicate against every person and applies
    /// its effect to those selected.
    pub fn receive_intervention(&mut self, disease: &DiseaseModel, intervention: &Intervention) {
        for person in &mut self.people {
            if intervention.test(person, disease, &mut self.rng) {
                intervention.apply(person);
            }
        }
    }

    /// Resolves pending interactions and advances every person's state
    /// machine, records today's summary row, and returns the infectious
    /// count, this partition's contribution to the day-gating reduction.
    pub fn end_of_day_state_update(
        &mut self,
        disease: &DiseaseModel,
    ) -> Result<Counter, NososError> {
        let slots = disease.num_states() + 2;
        let row = self.day as usize * slots;
        if row + slots > self.state_summary.len() {
            return Err(NososError::Data(format!(
                "people partition {}: day {} beyond the configured horizon",
                self.index, self.day
            )));
        }
        self.state_summary[row] = self.total_visits_for_day;

        let mut exposures: Counter = 0;
        let mut infectious: Counter = 0;
        for person in &mut self.people {
            exposures += person.interactions.len() as Counter;
            person.process_interactions(disease, &mut self.rng);
            person.advance_state(disease, &mut self.rng)?;
            self.state_summary[row + 2 + person.state] += 1;
            if disease.is_infectious(person.state) {
                infectious += 1;
            }
        }
        self.state_summary[row + 1] = exposures;
        self.day += 1;
        Ok(infectious)
    }

    /// This partition's contribution to the final stats reduction.
    #[must_use]
    pub fn send_stats(&self) -> &[Counter] {
        &self.state_summary
    }

    /// Serializes the full partition state for migration.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NososError> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Rebuilds a migrated partition. The disease model and configuration
    /// are re-resolved locally by the coordinator; only owned state travels.
    pub fn from_bytes(bytes: &[u8]) -> Result<PeoplePartition, NososError> {
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
    pub fn people(&self) -> &[Person] {
        &self.people
    }

    #[must_use]
    pub fn people_mut(&mut self) -> &mut Vec<Person> {
        &mut self.people
    }

    /// Infectious persons right now, used to re-derive the coordinator's
    /// trigger state after a restore.
    #[must_use]
    pub fn count_infectious(&self, disease: &DiseaseModel) -> Counter {
        self.people
            .iter()
            .filter(|person| disease.is_infectious(person.state))
            .count() as Counter
    }
}
