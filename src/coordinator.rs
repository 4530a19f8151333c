//! The coordinator: owns every partition and drives the day loop.
//!
//! Each simulated day runs three phases (visit dispatch, interaction
//! computation, end-of-day state update) separated by reductions over the
//! partitions' contributions. The reductions double as barriers: a phase's
//! messages are flushed and delivered before its reduction resolves, and the
//! infectious-count reduction gates advancement to the next day. Partitions
//! are independent within a phase and run in parallel; reduction and
//! delivery order is always ascending partition index, which keeps a run
//! bit-for-bit reproducible for a fixed seed.

use crate::config::{Scenario, SimConfig};
use crate::contact::ContactModel;
use crate::delivery::Delivery;
use crate::disease::DiseaseModel;
use crate::error::NososError;
use crate::location_partition::LocationPartition;
use crate::messages::{InteractionMessage, VisitMessage};
use crate::people_partition::PeoplePartition;
use crate::readers::scenario;
use crate::Counter;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// The three per-day reduction results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCounts {
    pub day: u32,
    pub visits: Counter,
    pub interactions: Counter,
    pub infectious: Counter,
}

/// Serialized state of every partition, sufficient to resume the run under
/// a different partition-to-node assignment.
#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub people: Vec<Vec<u8>>,
    pub locations: Vec<Vec<u8>>,
}

pub struct Coordinator {
    config: Arc<SimConfig>,
    disease: Arc<DiseaseModel>,
    contact: ContactModel,
    people: Vec<PeoplePartition>,
    locations: Vec<LocationPartition>,
    visit_deliveries: Vec<Box<dyn Delivery<VisitMessage>>>,
    interaction_deliveries: Vec<Box<dyn Delivery<InteractionMessage>>>,
    day: u32,
    last_infectious: Counter,
}

impl Coordinator {
    /// Builds the full simulation from configuration: synthetic populations
    /// for a synthetic scenario, file-loaded partitions otherwise.
    pub fn new(
        config: SimConfig,
        disease: DiseaseModel,
        contact: ContactModel,
    ) -> Result<Coordinator, NososError> {
        config.validate()?;
        let (people, locations) = match &config.scenario {
            Scenario::Synthetic(_) => {
                let people = (0..config.num_people_partitions)
                    .map(|index| PeoplePartition::synthetic(index, &config, &disease))
                    .collect::<Result<Vec<_>, _>>()?;
                let locations = (0..config.num_location_partitions)
                    .map(|index| {
                        LocationPartition::synthetic(index, &config, &disease, &contact)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (people, locations)
            }
            Scenario::Real { .. } => scenario::load_partitions(&config, &disease, &contact)?,
        };
        Coordinator::from_parts(config, disease, contact, people, locations)
    }

    /// Wires already-built partitions to a coordinator, constructing each
    /// producer's delivery strategy from configuration.
    pub fn from_parts(
        config: SimConfig,
        disease: DiseaseModel,
        contact: ContactModel,
        people: Vec<PeoplePartition>,
        locations: Vec<LocationPartition>,
    ) -> Result<Coordinator, NososError> {
        config.validate()?;
        if people.len() != config.num_people_partitions
            || locations.len() != config.num_location_partitions
        {
            return Err(NososError::Config(format!(
                "expected {}+{} partitions, got {}+{}",
                config.num_people_partitions,
                config.num_location_partitions,
                people.len(),
                locations.len()
            )));
        }
        let day = people.first().map_or(0, PeoplePartition::day);
        if people.iter().any(|p| p.day() != day)
            || locations.iter().any(|l| l.day() != day)
        {
            return Err(NososError::Data(
                "partitions disagree on the current day".to_string(),
            ));
        }

        let visit_deliveries = (0..config.num_people_partitions)
            .map(|_| config.delivery.build(config.num_location_partitions))
            .collect();
        let interaction_deliveries = (0..config.num_location_partitions)
            .map(|_| config.delivery.build(config.num_people_partitions))
            .collect();
        let disease = Arc::new(disease);
        let last_infectious = people
            .iter()
            .map(|partition| partition.count_infectious(&disease))
            .sum();
        Ok(Coordinator {
            config: Arc::new(config),
            disease,
            contact,
            people,
            locations,
            visit_deliveries,
            interaction_deliveries,
            day,
            last_infectious,
        })
    }

    /// Runs the remaining days and returns the per-day reduction results.
    pub fn run(&mut self) -> Result<Vec<DayCounts>, NososError> {
        let mut counts = Vec::new();
        while self.day < self.config.num_days {
            counts.push(self.run_day()?);
        }
        Ok(counts)
    }

    /// Runs one complete day cycle.
    pub fn run_day(&mut self) -> Result<DayCounts, NososError> {
        let day = self.day;
        let config = Arc::clone(&self.config);
        let disease = Arc::clone(&self.disease);

        self.apply_interventions(day);

        // Phase 1: visit dispatch, then the visit-count reduction.
        let visit_counts: Vec<Counter> = self
            .people
            .par_iter_mut()
            .zip(self.visit_deliveries.par_iter_mut())
            .map(|(partition, delivery)| {
                partition.send_visit_messages(&config, &disease, delivery.as_mut())
            })
            .collect::<Result<Vec<_>, _>>()?;
        for delivery in &mut self.visit_deliveries {
            delivery.flush();
        }
        let visits: Counter = visit_counts.iter().sum();
        for delivery in &mut self.visit_deliveries {
            for envelope in delivery.drain() {
                let target = &mut self.locations[envelope.target];
                for message in envelope.messages {
                    target.receive_visit(&config, message)?;
                }
            }
        }

        // Phase 2: event processing, then the interaction-count reduction.
        let contact = &self.contact;
        let interaction_counts: Vec<Counter> = self
            .locations
            .par_iter_mut()
            .zip(self.interaction_deliveries.par_iter_mut())
            .map(|(partition, delivery)| {
                partition.compute_interactions(&config, &disease, contact, delivery.as_mut())
            })
            .collect::<Result<Vec<_>, _>>()?;
        for delivery in &mut self.interaction_deliveries {
            delivery.flush();
        }
        let interactions: Counter = interaction_counts.iter().sum();
        for delivery in &mut self.interaction_deliveries {
            for envelope in delivery.drain() {
                let target = &mut self.people[envelope.target];
                for message in envelope.messages {
                    target.receive_interactions(&config, message)?;
                }
            }
        }

        // Phase 3: end-of-day update. The infectious reduction gates the
        // next day.
        let infectious_counts: Vec<Counter> = self
            .people
            .par_iter_mut()
            .map(|partition| partition.end_of_day_state_update(&disease))
            .collect::<Result<Vec<_>, _>>()?;
        let infectious: Counter = infectious_counts.iter().sum();
        self.last_infectious = infectious;
        self.day += 1;

        info!("day {day}: {visits} visits, {interactions} interactions, {infectious} infectious");
        Ok(DayCounts {
            day,
            visits,
            interactions,
            infectious,
        })
    }

    /// Broadcasts every intervention whose trigger holds today to all people
    /// partitions.
    fn apply_interventions(&mut self, day: u32) {
        if !self.config.use_interventions {
            return;
        }
        let disease = Arc::clone(&self.disease);
        for intervention in &disease.interventions {
            if intervention
                .trigger
                .holds(day, self.last_infectious, self.config.num_people)
            {
                for partition in &mut self.people {
                    partition.receive_intervention(&disease, intervention);
                }
            }
        }
    }

    /// The final stats reduction: the elementwise sum of every partition's
    /// (day × slot) summary matrix, in ascending partition order.
    #[must_use]
    pub fn collect_stats(&self) -> Vec<Counter> {
        let slots = (self.disease.num_states() + 2) * self.config.num_days as usize;
        let mut matrix = vec![0; slots];
        for partition in &self.people {
            for (total, contribution) in matrix.iter_mut().zip(partition.send_stats()) {
                *total += contribution;
            }
        }
        matrix
    }

    /// Writes the summary matrix as CSV: one row per day, one column per
    /// slot.
    pub fn write_stats(&self, path: &Path) -> Result<(), NososError> {
        let matrix = self.collect_stats();
        let slots = self.disease.num_states() + 2;
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["day".to_string(), "visits".to_string(), "exposures".to_string()];
        header.extend((0..self.disease.num_states()).map(|s| self.disease.label(s).to_string()));
        writer.write_record(&header)?;
        for day in 0..self.config.num_days as usize {
            let row = &matrix[day * slots..(day + 1) * slots];
            let mut record = vec![day.to_string()];
            record.extend(row.iter().map(Counter::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Serializes every partition for migration.
    pub fn checkpoint(&self) -> Result<Checkpoint, NososError> {
        Ok(Checkpoint {
            people: self
                .people
                .iter()
                .map(PeoplePartition::to_bytes)
                .collect::<Result<_, _>>()?,
            locations: self
                .locations
                .iter()
                .map(LocationPartition::to_bytes)
                .collect::<Result<_, _>>()?,
        })
    }

    /// Rebuilds a coordinator from a checkpoint. Partition payloads may
    /// arrive in any order; they are re-seated by their own indices, and the
    /// disease model, contact model, and delivery strategies are
    /// reconstructed locally.
    pub fn restore(
        config: SimConfig,
        disease: DiseaseModel,
        contact: ContactModel,
        checkpoint: &Checkpoint,
    ) -> Result<Coordinator, NososError> {
        let mut people = checkpoint
            .people
            .iter()
            .map(|bytes| PeoplePartition::from_bytes(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        people.sort_by_key(PeoplePartition::index);
        let mut locations = checkpoint
            .locations
            .iter()
            .map(|bytes| LocationPartition::from_bytes(bytes))
            .collect::<Result<Vec<_>, _>>()?;
        locations.sort_by_key(LocationPartition::index);

        if people.iter().enumerate().any(|(i, p)| p.index() != i)
            || locations.iter().enumerate().any(|(i, l)| l.index() != i)
        {
            return Err(NososError::Data(
                "checkpoint does not cover every partition exactly once".to_string(),
            ));
        }
        Coordinator::from_parts(config, disease, contact, people, locations)
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.day
    }

    #[must_use]
    pub fn last_infectious(&self) -> Counter {
        self.last_infectious
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[must_use]
    pub fn disease(&self) -> &DiseaseModel {
        &self.disease
    }

    #[must_use]
    pub fn people_partitions(&self) -> &[PeoplePartition] {
        &self.people
    }
}
