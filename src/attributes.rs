//! Typed attribute cells and the ordered field schemas that describe them.
//!
//! Input CSV rows are described by a [`CsvDefinition`]: an ordered list of
//! field specifications. Marker fields (`unique_id`, `foreign_id`,
//! `start_time`, `duration`) are consumed by the readers; data fields
//! (`bool`, `int_b10`, `double_b10`, `string`) become attribute cells on the
//! loaded entity, in schema order; `ignore` fields are skipped.

use crate::error::NososError;
use serde::{Deserialize, Serialize};

/// One schema-defined value on a person or location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl AttributeValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view of the cell; integers widen to doubles.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(value) => Some(*value as f64),
            AttributeValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// One column of an input CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSpec {
    /// The entity's own global id.
    UniqueId,
    /// A reference to another entity (the visited location in a visit row).
    ForeignId,
    StartTime,
    Duration,
    Bool { name: String },
    IntB10 { name: String },
    DoubleB10 { name: String },
    #[serde(rename = "string")]
    Text { name: String },
    Ignore,
}

impl FieldSpec {
    /// The attribute name, for data-carrying fields.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            FieldSpec::Bool { name }
            | FieldSpec::IntB10 { name }
            | FieldSpec::DoubleB10 { name }
            | FieldSpec::Text { name } => Some(name),
            _ => None,
        }
    }
}

/// Ordered column schema for one CSV input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvDefinition {
    pub fields: Vec<FieldSpec>,
}

impl CsvDefinition {
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> CsvDefinition {
        CsvDefinition { fields }
    }

    /// The name→slot table over this schema's data fields.
    #[must_use]
    pub fn attribute_table(&self) -> AttributeTable {
        AttributeTable {
            names: self
                .fields
                .iter()
                .filter_map(|field| field.name().map(str::to_string))
                .collect(),
        }
    }

    /// Default cells for an entity created without file data, one per data
    /// field in schema order.
    #[must_use]
    pub fn default_cells(&self) -> Vec<AttributeValue> {
        self.fields
            .iter()
            .filter_map(|field| match field {
                FieldSpec::Bool { .. } => Some(AttributeValue::Bool(false)),
                FieldSpec::IntB10 { .. } => Some(AttributeValue::Int(0)),
                FieldSpec::DoubleB10 { .. } => Some(AttributeValue::Double(0.0)),
                FieldSpec::Text { .. } => Some(AttributeValue::Text(String::new())),
                _ => None,
            })
            .collect()
    }
}

/// Maps attribute names to their cell slots for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeTable {
    names: Vec<String>,
}

impl AttributeTable {
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Like [`index_of`](Self::index_of), but a missing attribute is a model
    /// error naming the attribute.
    pub fn require(&self, name: &str) -> Result<usize, NososError> {
        self.index_of(name).ok_or_else(|| {
            NososError::Model(format!("schema defines no attribute named '{name}'"))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_def() -> CsvDefinition {
        CsvDefinition::new(vec![
            FieldSpec::UniqueId,
            FieldSpec::IntB10 { name: "age".into() },
            FieldSpec::Ignore,
            FieldSpec::Bool { name: "vaccinated".into() },
            FieldSpec::DoubleB10 { name: "susceptibility".into() },
        ])
    }

    #[test]
    fn table_skips_markers_and_ignored_columns() {
        let table = person_def().attribute_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of("age"), Some(0));
        assert_eq!(table.index_of("vaccinated"), Some(1));
        assert_eq!(table.index_of("susceptibility"), Some(2));
        assert_eq!(table.index_of("height"), None);
    }

    #[test]
    fn require_reports_missing_attribute() {
        let table = person_def().attribute_table();
        assert!(matches!(table.require("height"), Err(NososError::Model(_))));
    }

    #[test]
    fn default_cells_match_schema_order() {
        let cells = person_def().default_cells();
        assert_eq!(
            cells,
            vec![
                AttributeValue::Int(0),
                AttributeValue::Bool(false),
                AttributeValue::Double(0.0),
            ]
        );
    }

    #[test]
    fn schema_round_trips_through_json() {
        let def = person_def();
        let json = serde_json::to_string(&def).unwrap();
        assert_eq!(serde_json::from_str::<CsvDefinition>(&json).unwrap(), def);
    }
}
