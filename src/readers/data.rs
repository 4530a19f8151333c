//! Schema-driven CSV parsing for entity tables and the activity stream.

use crate::attributes::{AttributeValue, CsvDefinition, FieldSpec};
use crate::error::NososError;
use crate::messages::VisitMessage;
use crate::{Id, Time};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

fn parse_bool(text: &str) -> Result<bool, NososError> {
    match text {
        "1" => Ok(true),
        "0" => Ok(false),
        other => other
            .parse::<bool>()
            .map_err(|_| NososError::Data(format!("'{other}' is not a boolean"))),
    }
}

fn parse_i64(text: &str) -> Result<i64, NososError> {
    text.parse::<i64>()
        .map_err(|_| NososError::Data(format!("'{text}' is not an integer")))
}

fn parse_f64(text: &str) -> Result<f64, NososError> {
    text.parse::<f64>()
        .map_err(|_| NososError::Data(format!("'{text}' is not a number")))
}

/// Parses one entity row into its id and attribute cells, in schema order.
fn parse_entity(
    record: &csv::StringRecord,
    definition: &CsvDefinition,
) -> Result<(Id, Vec<AttributeValue>), NososError> {
    if record.len() != definition.fields.len() {
        return Err(NososError::Data(format!(
            "row has {} columns, schema describes {}",
            record.len(),
            definition.fields.len()
        )));
    }
    let mut unique_id = None;
    let mut attributes = Vec::new();
    for (field, value) in definition.fields.iter().zip(record.iter()) {
        let value = value.trim();
        match field {
            FieldSpec::UniqueId => {
                unique_id = Some(parse_i64(value)? as Id);
            }
            FieldSpec::Bool { .. } => attributes.push(AttributeValue::Bool(parse_bool(value)?)),
            FieldSpec::IntB10 { .. } => attributes.push(AttributeValue::Int(parse_i64(value)?)),
            FieldSpec::DoubleB10 { .. } => {
                attributes.push(AttributeValue::Double(parse_f64(value)?));
            }
            FieldSpec::Text { .. } => attributes.push(AttributeValue::Text(value.to_string())),
            FieldSpec::ForeignId | FieldSpec::StartTime | FieldSpec::Duration | FieldSpec::Ignore => {}
        }
    }
    let unique_id = unique_id
        .ok_or_else(|| NososError::Data("schema has no unique_id column".to_string()))?;
    Ok((unique_id, attributes))
}

/// Reads exactly `count` entity rows from `input`, which must already be
/// positioned at this partition's first row.
pub fn read_entities<R: Read>(
    input: R,
    definition: &CsvDefinition,
    count: usize,
) -> Result<Vec<(Id, Vec<AttributeValue>)>, NososError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input);
    let mut entities = Vec::with_capacity(count);
    for result in reader.records().take(count) {
        let record = result?;
        entities.push(parse_entity(&record, definition)?);
    }
    if entities.len() < count {
        return Err(NososError::Data(format!(
            "input ended after {} of {count} rows",
            entities.len()
        )));
    }
    Ok(entities)
}

/// Column positions of the four activity markers within a visit schema.
#[derive(Debug, Clone, Copy)]
pub struct ActivityLayout {
    person_column: usize,
    location_column: usize,
    start_column: usize,
    duration_column: usize,
    num_columns: usize,
}

impl ActivityLayout {
    pub fn from_def(definition: &CsvDefinition) -> Result<ActivityLayout, NososError> {
        let position = |wanted: &FieldSpec| {
            definition
                .fields
                .iter()
                .position(|field| field == wanted)
                .ok_or_else(|| {
                    NososError::Data(format!("activity schema lacks a {wanted:?} column"))
                })
        };
        Ok(ActivityLayout {
            person_column: position(&FieldSpec::UniqueId)?,
            location_column: position(&FieldSpec::ForeignId)?,
            start_column: position(&FieldSpec::StartTime)?,
            duration_column: position(&FieldSpec::Duration)?,
            num_columns: definition.fields.len(),
        })
    }

    fn parse_row(&self, record: &csv::StringRecord) -> Result<(Id, Id, Time, Time), NososError> {
        if record.len() != self.num_columns {
            return Err(NososError::Data(format!(
                "visit row has {} columns, schema describes {}",
                record.len(),
                self.num_columns
            )));
        }
        let field = |column: usize| record.get(column).unwrap_or("").trim();
        Ok((
            parse_i64(field(self.person_column))? as Id,
            parse_i64(field(self.location_column))? as Id,
            parse_i64(field(self.start_column))?,
            parse_i64(field(self.duration_column))?,
        ))
    }
}

/// The visits file, read as runs of rows addressed by cache offsets.
pub struct VisitStream {
    file: BufReader<File>,
    layout: ActivityLayout,
}

impl VisitStream {
    pub fn open(path: &Path, definition: &CsvDefinition) -> Result<VisitStream, NososError> {
        let file = File::open(path).map_err(|error| {
            NososError::Config(format!("could not open {}: {error}", path.display()))
        })?;
        Ok(VisitStream {
            file: BufReader::new(file),
            layout: ActivityLayout::from_def(definition)?,
        })
    }

    /// Reads one person-day run starting at `offset`: rows for `person`
    /// whose absolute start time falls within `[day_start, day_end)`. Times
    /// are normalized to within-day seconds. The person-state field of each
    /// visit is a placeholder until dispatch stamps the current state.
    pub fn read_run(
        &mut self,
        offset: u64,
        person: Id,
        day_start: Time,
        day_end: Time,
    ) -> Result<Vec<VisitMessage>, NososError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&mut self.file);
        let mut visits = Vec::new();
        for result in reader.records() {
            let record = result?;
            let (row_person, location, start, duration) = self.layout.parse_row(&record)?;
            if row_person != person || start >= day_end {
                break;
            }
            if start < day_start || duration < 0 {
                return Err(NososError::Data(format!(
                    "visit by person {person} at offset {offset} has start {start} and \
                     duration {duration} outside day [{day_start}, {day_end})"
                )));
            }
            visits.push(VisitMessage {
                location,
                person,
                person_state: 0,
                start_time: start - day_start,
                end_time: start - day_start + duration,
            });
        }
        Ok(visits)
    }
}
