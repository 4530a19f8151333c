//! Scenario loading: assembles the disease model and every partition from a
//! scenario directory.
//!
//! A directory holds `people.csv`, `locations.csv`, and `visits.csv`, the
//! JSON definitions (`disease.json`, the three schema files, optionally
//! `interventions.json`), and the offset caches produced by preprocessing,
//! namespaced by the scenario id.

use crate::attributes::CsvDefinition;
use crate::config::SimConfig;
use crate::contact::ContactModel;
use crate::disease::{DiseaseDefinition, DiseaseModel};
use crate::error::NososError;
use crate::interventions::InterventionSpec;
use crate::location::Location;
use crate::location_partition::LocationPartition;
use crate::people_partition::PeoplePartition;
use crate::person::Person;
use crate::readers::cache::{OffsetCache, EMPTY_VISIT_SCHEDULE};
use crate::readers::data::{read_entities, VisitStream};
use crate::{Time, DAY_LENGTH};
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, NososError> {
    let file = File::open(path).map_err(|error| {
        NososError::Config(format!("could not open {}: {error}", path.display()))
    })?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Loads the disease model, schemas, and interventions from the scenario
/// directory.
pub fn load_disease_model(config: &SimConfig) -> Result<DiseaseModel, NososError> {
    let dir = config.scenario_path()?;
    let definition: DiseaseDefinition = read_json(&dir.join("disease.json"))?;
    let person_def: CsvDefinition = read_json(&dir.join("people_schema.json"))?;
    let location_def: CsvDefinition = read_json(&dir.join("locations_schema.json"))?;
    let activity_def: CsvDefinition = read_json(&dir.join("activities_schema.json"))?;
    let interventions_path = dir.join("interventions.json");
    let specs: Vec<InterventionSpec> = if interventions_path.exists() {
        read_json(&interventions_path)?
    } else {
        Vec::new()
    };
    DiseaseModel::new(definition, person_def, location_def, activity_def, &specs)
}

fn cache_path(dir: &Path, scenario_id: &str, kind: &str) -> PathBuf {
    dir.join(format!("{scenario_id}_{kind}.cache"))
}

/// Loads every people and location partition from the scenario directory.
pub fn load_partitions(
    config: &SimConfig,
    disease: &DiseaseModel,
    contact: &ContactModel,
) -> Result<(Vec<PeoplePartition>, Vec<LocationPartition>), NososError> {
    let dir = config.scenario_path()?;
    let scenario_id = config.scenario_id();
    info!("loading scenario {scenario_id} from {}", dir.display());

    let people = load_people(config, disease, dir, &scenario_id)?;
    let locations = load_locations(config, disease, contact, dir, &scenario_id)?;
    Ok((people, locations))
}

fn load_people(
    config: &SimConfig,
    disease: &DiseaseModel,
    dir: &Path,
    scenario_id: &str,
) -> Result<Vec<PeoplePartition>, NososError> {
    let people_map = config.people_map();
    let mut people_cache = OffsetCache::open(&cache_path(dir, scenario_id, "people"))?;
    let mut visit_cache = OffsetCache::open(&cache_path(dir, scenario_id, "interactions"))?;
    let mut visit_stream = VisitStream::open(&dir.join("visits.csv"), &disease.activity_def)?;
    let people_path = dir.join("people.csv");
    let num_visit_days = config.num_visit_days as usize;

    let mut partitions = Vec::with_capacity(config.num_people_partitions);
    for index in 0..config.num_people_partitions {
        let offset = people_cache.read_at(index as u64)?;
        let mut file = File::open(&people_path).map_err(|error| {
            NososError::Config(format!("could not open {}: {error}", people_path.display()))
        })?;
        file.seek(SeekFrom::Start(offset))?;
        let rows = read_entities(
            BufReader::new(file),
            &disease.person_def,
            people_map.local_count(index),
        )?;

        let mut people = Vec::with_capacity(rows.len());
        for (unique_id, attributes) in rows {
            let owner = people_map.partition_of(unique_id)?;
            if owner != index {
                return Err(NososError::Data(format!(
                    "people partition {index}: person {unique_id} found in partition \
                     {owner}'s rows"
                )));
            }
            let mut person = Person::new(unique_id, disease.healthy_state(), attributes);
            let base =
                (unique_id - config.first_person_id) * config.num_visit_days as u64;
            person.visit_offset_by_day = visit_cache.read_run(base, num_visit_days)?;
            for day in 0..num_visit_days {
                let day_offset = person.visit_offset_by_day[day];
                let visits = if day_offset == EMPTY_VISIT_SCHEDULE {
                    Vec::new()
                } else {
                    let day_start = day as Time * DAY_LENGTH;
                    visit_stream.read_run(day_offset, unique_id, day_start, day_start + DAY_LENGTH)?
                };
                person.visits_by_day.push(visits);
            }
            people.push(person);
        }

        let mut partition = PeoplePartition::from_parts(index, people, config, disease);
        partition.sample_compliance(disease);
        partition.seed_infections(config, disease)?;
        debug!(
            "people partition {index}: loaded {} people from offset {offset}",
            partition.people().len()
        );
        partitions.push(partition);
    }
    Ok(partitions)
}

fn load_locations(
    config: &SimConfig,
    disease: &DiseaseModel,
    contact: &ContactModel,
    dir: &Path,
    scenario_id: &str,
) -> Result<Vec<LocationPartition>, NososError> {
    let location_map = config.location_map();
    let mut location_cache = OffsetCache::open(&cache_path(dir, scenario_id, "locations"))?;
    let locations_path = dir.join("locations.csv");

    let mut partitions = Vec::with_capacity(config.num_location_partitions);
    for index in 0..config.num_location_partitions {
        let offset = location_cache.read_at(index as u64)?;
        let mut file = File::open(&locations_path).map_err(|error| {
            NososError::Config(format!(
                "could not open {}: {error}",
                locations_path.display()
            ))
        })?;
        file.seek(SeekFrom::Start(offset))?;
        let rows = read_entities(
            BufReader::new(file),
            &disease.location_def,
            location_map.local_count(index),
        )?;

        let mut locations = Vec::with_capacity(rows.len());
        for (unique_id, attributes) in rows {
            let owner = location_map.partition_of(unique_id)?;
            if owner != index {
                return Err(NososError::Data(format!(
                    "location partition {index}: location {unique_id} found in partition \
                     {owner}'s rows"
                )));
            }
            let mut location = Location::new(unique_id, attributes);
            contact.compute_location_values(disease, &mut location);
            locations.push(location);
        }
        debug!(
            "location partition {index}: loaded {} locations from offset {offset}",
            locations.len()
        );
        partitions.push(LocationPartition::from_parts(index, locations, config));
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::FieldSpec;
    use crate::config::Scenario;
    use crate::delivery::DeliveryMode;
    use std::io::Write;

    /// Writes a two-person, two-location scenario with one visit day.
    fn write_scenario(dir: &Path, config: &SimConfig) {
        let scenario_id = config.scenario_id();

        std::fs::write(
            dir.join("disease.json"),
            r#"{
                "states": [
                    {"label": "susceptible", "susceptible": true},
                    {"label": "infectious", "infectious": true}
                ],
                "transitions": [
                    {"from": 0, "edges": [
                        {"next": 1, "probability": 1.0,
                         "dwell": {"type": "fixed", "seconds": 0}}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("people_schema.json"),
            serde_json::to_string(&CsvDefinition::new(vec![
                FieldSpec::UniqueId,
                FieldSpec::IntB10 { name: "age".into() },
            ]))
            .unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.join("locations_schema.json"),
            serde_json::to_string(&CsvDefinition::new(vec![
                FieldSpec::UniqueId,
                FieldSpec::DoubleB10 { name: "capacity".into() },
            ]))
            .unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.join("activities_schema.json"),
            serde_json::to_string(&CsvDefinition::new(vec![
                FieldSpec::UniqueId,
                FieldSpec::ForeignId,
                FieldSpec::StartTime,
                FieldSpec::Duration,
            ]))
            .unwrap(),
        )
        .unwrap();

        let people_header = "id,age\n";
        std::fs::write(dir.join("people.csv"), format!("{people_header}0,31\n1,64\n")).unwrap();
        let mut people_cache =
            std::fs::File::create(cache_path(dir, &scenario_id, "people")).unwrap();
        people_cache
            .write_all(&(people_header.len() as u64).to_le_bytes())
            .unwrap();

        let locations_header = "id,capacity\n";
        std::fs::write(
            dir.join("locations.csv"),
            format!("{locations_header}0,10\n1,250\n"),
        )
        .unwrap();
        let mut location_cache =
            std::fs::File::create(cache_path(dir, &scenario_id, "locations")).unwrap();
        location_cache
            .write_all(&(locations_header.len() as u64).to_le_bytes())
            .unwrap();

        // Person 0 visits location 1; person 1 stays home.
        let visits_header = "person,location,start,duration\n";
        std::fs::write(
            dir.join("visits.csv"),
            format!("{visits_header}0,1,3600,1800\n"),
        )
        .unwrap();
        let mut visit_cache =
            std::fs::File::create(cache_path(dir, &scenario_id, "interactions")).unwrap();
        visit_cache
            .write_all(&(visits_header.len() as u64).to_le_bytes())
            .unwrap();
        visit_cache
            .write_all(&EMPTY_VISIT_SCHEDULE.to_le_bytes())
            .unwrap();
    }

    fn scenario_config(dir: &Path) -> SimConfig {
        SimConfig {
            num_people: 2,
            num_locations: 2,
            num_people_partitions: 1,
            num_location_partitions: 1,
            num_days: 1,
            num_visit_days: 1,
            seed: 5,
            initial_infections: 0,
            first_person_id: 0,
            first_location_id: 0,
            delivery: DeliveryMode::Direct,
            use_interventions: false,
            scenario: Scenario::Real {
                path: dir.to_path_buf(),
            },
        }
    }

    #[test]
    fn scenario_loads_people_locations_and_visits() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario_config(dir.path());
        write_scenario(dir.path(), &config);

        let disease = load_disease_model(&config).unwrap();
        assert_eq!(disease.num_states(), 2);

        let contact = ContactModel::Saturated {
            transmissibility: 1.0,
            reference_occupancy: 100.0,
        };
        let (people, locations) = load_partitions(&config, &disease, &contact).unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(locations.len(), 1);

        let loaded = people[0].people();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].unique_id, 0);
        assert_eq!(loaded[0].visits_by_day.len(), 1);
        assert_eq!(loaded[0].visits_by_day[0].len(), 1);
        assert_eq!(loaded[0].visits_by_day[0][0].location, 1);
        assert_eq!(loaded[0].visits_by_day[0][0].start_time, 3600);
        assert_eq!(loaded[0].visits_by_day[0][0].end_time, 5400);
        // The sentinel day stays empty.
        assert!(loaded[1].visits_by_day[0].is_empty());

        // The contact model derived its per-location values at load.
        let locs = locations[0].locations();
        assert!((locs[0].contact_scale - 1.0).abs() < f64::EPSILON);
        assert!((locs[1].contact_scale - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_inputs_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario_config(dir.path());
        assert!(matches!(
            load_disease_model(&config),
            Err(NososError::Config(_))
        ));
        let disease = DiseaseModel::synthetic_default(false).unwrap();
        assert!(matches!(
            load_partitions(&config, &disease, &ContactModel::default()),
            Err(NososError::Config(_))
        ));
    }
}
