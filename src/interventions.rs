//! Intervention definitions and their runtime forms.
//!
//! Interventions arrive as serialized specifications ([`InterventionSpec`])
//! and are resolved against the person attribute schema into
//! [`Intervention`]s with attribute slots baked in. The coordinator
//! broadcasts an intervention to every people partition on each day its
//! trigger holds; the partition then tests the per-person predicate and
//! applies the effect to matching persons.

use crate::attributes::{AttributeTable, AttributeValue};
use crate::disease::DiseaseModel;
use crate::error::NososError;
use crate::person::Person;
use crate::rng::SimRng;
use crate::Counter;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// When an intervention becomes active. Both conditions must hold when both
/// are present; an empty trigger is always active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// First day (inclusive) the intervention may fire.
    #[serde(default)]
    pub start_day: Option<u32>,
    /// Minimum fraction of the population that must be infectious.
    #[serde(default)]
    pub infectious_fraction: Option<f64>,
}

impl Trigger {
    #[must_use]
    pub fn holds(&self, day: u32, infectious: Counter, num_people: u64) -> bool {
        if let Some(start) = self.start_day {
            if day < start {
                return false;
            }
        }
        if let Some(threshold) = self.infectious_fraction {
            if (infectious as f64) < threshold * num_people as f64 {
                return false;
            }
        }
        true
    }
}

/// Serialized intervention description, as found in `interventions.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterventionSpec {
    Vaccination {
        #[serde(default)]
        trigger: Trigger,
        probability: f64,
        vaccinated_susceptibility: f64,
    },
    SelfIsolation {
        #[serde(default)]
        trigger: Trigger,
        compliance: f64,
    },
}

/// A resolved intervention, ready to test and apply to persons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub trigger: Trigger,
    pub kind: InterventionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterventionKind {
    Vaccination {
        probability: f64,
        vaccinated_susceptibility: f64,
        vaccinated_slot: usize,
        susceptibility_slot: usize,
    },
    SelfIsolation {
        compliance: f64,
    },
}

impl Intervention {
    /// Resolves a specification against the person attribute schema.
    /// A vaccination intervention over a schema lacking the `vaccinated` or
    /// `susceptibility` attribute is malformed.
    pub fn build(
        spec: &InterventionSpec,
        person_table: &AttributeTable,
    ) -> Result<Intervention, NososError> {
        match spec {
            InterventionSpec::Vaccination {
                trigger,
                probability,
                vaccinated_susceptibility,
            } => {
                if !(0.0..=1.0).contains(probability) {
                    return Err(NososError::Model(format!(
                        "vaccination probability {probability} outside [0, 1]"
                    )));
                }
                Ok(Intervention {
                    trigger: trigger.clone(),
                    kind: InterventionKind::Vaccination {
                        probability: *probability,
                        vaccinated_susceptibility: *vaccinated_susceptibility,
                        vaccinated_slot: person_table.require("vaccinated")?,
                        susceptibility_slot: person_table.require("susceptibility")?,
                    },
                })
            }
            InterventionSpec::SelfIsolation { trigger, compliance } => {
                if !(0.0..=1.0).contains(compliance) {
                    return Err(NososError::Model(format!(
                        "isolation compliance {compliance} outside [0, 1]"
                    )));
                }
                Ok(Intervention {
                    trigger: trigger.clone(),
                    kind: InterventionKind::SelfIsolation {
                        compliance: *compliance,
                    },
                })
            }
        }
    }

    /// Whether this intervention selects `person`.
    pub fn test(&self, person: &Person, disease: &DiseaseModel, rng: &mut SimRng) -> bool {
        match &self.kind {
            InterventionKind::Vaccination {
                probability,
                vaccinated_slot,
                ..
            } => {
                let vaccinated = person
                    .attributes
                    .get(*vaccinated_slot)
                    .and_then(AttributeValue::as_bool)
                    .unwrap_or(false);
                !vaccinated && rng.random::<f64>() < *probability
            }
            InterventionKind::SelfIsolation { .. } => {
                person.will_comply
                    && !person.is_isolating
                    && disease.is_infectious(person.state)
            }
        }
    }

    /// Applies the effect to `person`. Only called when [`test`](Self::test)
    /// selected the person.
    pub fn apply(&self, person: &mut Person) {
        match &self.kind {
            InterventionKind::Vaccination {
                vaccinated_susceptibility,
                vaccinated_slot,
                susceptibility_slot,
                ..
            } => {
                if let Some(cell) = person.attributes.get_mut(*vaccinated_slot) {
                    *cell = AttributeValue::Bool(true);
                }
                if let Some(cell) = person.attributes.get_mut(*susceptibility_slot) {
                    *cell = AttributeValue::Double(*vaccinated_susceptibility);
                }
            }
            InterventionKind::SelfIsolation { .. } => {
                person.is_isolating = true;
            }
        }
    }

    /// The isolation compliance parameter, if this is a self-isolation
    /// intervention.
    #[must_use]
    pub fn compliance(&self) -> Option<f64> {
        match &self.kind {
            InterventionKind::SelfIsolation { compliance } => Some(*compliance),
            InterventionKind::Vaccination { .. } => None,
        }
    }
}
