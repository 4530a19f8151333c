//! The immutable disease model shared read-only by every partition.
//!
//! A model is a set of named states, a transition table with per-edge dwell
//! time distributions, the attribute schemas for people, locations, and
//! activity rows, and the resolved intervention list. Partitions receive it
//! by shared reference and never mutate it; after a partition migrates, it
//! re-resolves the local replica instead of carrying the model in its
//! serialized state.

use crate::attributes::{AttributeTable, CsvDefinition, FieldSpec};
use crate::error::NososError;
use crate::interventions::{Intervention, InterventionSpec, Trigger};
use crate::rng::SimRng;
use crate::{Time, DAY_LENGTH};
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

/// Tolerance when checking that exit probabilities sum to one.
const PROBABILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseState {
    pub label: String,
    #[serde(default)]
    pub susceptible: bool,
    #[serde(default)]
    pub infectious: bool,
}

/// Time spent in the state an edge leads to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DwellTime {
    Fixed { seconds: Time },
    Uniform { low: Time, high: Time },
    Exponential { mean_seconds: f64 },
}

impl DwellTime {
    pub fn sample(&self, rng: &mut SimRng) -> Result<Time, NososError> {
        let seconds = match self {
            DwellTime::Fixed { seconds } => *seconds,
            DwellTime::Uniform { low, high } => rng.random_range(*low..=*high),
            DwellTime::Exponential { mean_seconds } => {
                let exp = Exp::new(1.0 / mean_seconds).map_err(|error| {
                    NososError::Model(format!("invalid exponential dwell time: {error}"))
                })?;
                exp.sample(rng).round() as Time
            }
        };
        if seconds < 0 {
            return Err(NososError::Model(format!(
                "drew negative dwell time {seconds}"
            )));
        }
        Ok(seconds)
    }

    fn validate(&self) -> Result<(), NososError> {
        match self {
            DwellTime::Fixed { seconds } if *seconds < 0 => Err(NososError::Model(format!(
                "fixed dwell time {seconds} is negative"
            ))),
            DwellTime::Uniform { low, high } if *low < 0 || low > high => {
                Err(NososError::Model(format!(
                    "uniform dwell time bounds [{low}, {high}] are malformed"
                )))
            }
            DwellTime::Exponential { mean_seconds } if *mean_seconds <= 0.0 => {
                Err(NososError::Model(format!(
                    "exponential dwell time mean {mean_seconds} is not positive"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEdge {
    pub next: usize,
    pub probability: f64,
    pub dwell: DwellTime,
}

/// All exits from one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitions {
    pub from: usize,
    pub edges: Vec<TransitionEdge>,
}

/// The serialized form of a disease model, as found in `disease.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseDefinition {
    pub states: Vec<DiseaseState>,
    #[serde(default)]
    pub healthy_state: usize,
    pub transitions: Vec<StateTransitions>,
}

#[derive(Debug)]
pub struct DiseaseModel {
    states: Vec<DiseaseState>,
    healthy_state: usize,
    /// Outgoing edges per state; an empty list marks a terminal state.
    transitions: Vec<Vec<TransitionEdge>>,
    pub person_def: CsvDefinition,
    pub location_def: CsvDefinition,
    pub activity_def: CsvDefinition,
    pub person_table: AttributeTable,
    pub location_table: AttributeTable,
    pub interventions: Vec<Intervention>,
}

impl DiseaseModel {
    /// Builds and validates a model from its definition, attribute schemas,
    /// and intervention specifications.
    pub fn new(
        definition: DiseaseDefinition,
        person_def: CsvDefinition,
        location_def: CsvDefinition,
        activity_def: CsvDefinition,
        intervention_specs: &[InterventionSpec],
    ) -> Result<DiseaseModel, NososError> {
        let num_states = definition.states.len();
        if num_states == 0 {
            return Err(NososError::Model("disease model has no states".to_string()));
        }
        if definition.healthy_state >= num_states {
            return Err(NososError::Model(format!(
                "healthy state {} outside [0, {num_states})",
                definition.healthy_state
            )));
        }

        let mut transitions: Vec<Vec<TransitionEdge>> = vec![Vec::new(); num_states];
        for group in definition.transitions {
            if group.from >= num_states {
                return Err(NososError::Model(format!(
                    "transition from unknown state {}",
                    group.from
                )));
            }
            if !transitions[group.from].is_empty() {
                return Err(NososError::Model(format!(
                    "duplicate transition set for state {}",
                    group.from
                )));
            }
            let mut total = 0.0;
            for edge in &group.edges {
                if edge.next >= num_states {
                    return Err(NososError::Model(format!(
                        "transition into unknown state {}",
                        edge.next
                    )));
                }
                if edge.probability < 0.0 {
                    return Err(NososError::Model(format!(
                        "transition probability {} is negative",
                        edge.probability
                    )));
                }
                edge.dwell.validate()?;
                total += edge.probability;
            }
            if !group.edges.is_empty() && (total - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(NososError::Model(format!(
                    "exit probabilities for state {} sum to {total}, not 1",
                    group.from
                )));
            }
            transitions[group.from] = group.edges;
        }

        let person_table = person_def.attribute_table();
        let location_table = location_def.attribute_table();
        let interventions = intervention_specs
            .iter()
            .map(|spec| Intervention::build(spec, &person_table))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DiseaseModel {
            states: definition.states,
            healthy_state: definition.healthy_state,
            transitions,
            person_def,
            location_def,
            activity_def,
            person_table,
            location_table,
            interventions,
        })
    }

    /// The built-in SEIR-style model backing synthetic runs, over the default
    /// synthetic attribute schemas.
    pub fn synthetic_default(use_interventions: bool) -> Result<DiseaseModel, NososError> {
        let definition = DiseaseDefinition {
            states: vec![
                DiseaseState {
                    label: "susceptible".to_string(),
                    susceptible: true,
                    infectious: false,
                },
                DiseaseState {
                    label: "exposed".to_string(),
                    susceptible: false,
                    infectious: false,
                },
                DiseaseState {
                    label: "infectious".to_string(),
                    susceptible: false,
                    infectious: true,
                },
                DiseaseState {
                    label: "recovered".to_string(),
                    susceptible: false,
                    infectious: false,
                },
            ],
            healthy_state: 0,
            transitions: vec![
                StateTransitions {
                    from: 0,
                    edges: vec![TransitionEdge {
                        next: 1,
                        probability: 1.0,
                        dwell: DwellTime::Uniform {
                            low: 2 * DAY_LENGTH,
                            high: 5 * DAY_LENGTH,
                        },
                    }],
                },
                StateTransitions {
                    from: 1,
                    edges: vec![TransitionEdge {
                        next: 2,
                        probability: 1.0,
                        dwell: DwellTime::Uniform {
                            low: 3 * DAY_LENGTH,
                            high: 7 * DAY_LENGTH,
                        },
                    }],
                },
                StateTransitions {
                    from: 2,
                    edges: vec![TransitionEdge {
                        next: 3,
                        probability: 1.0,
                        dwell: DwellTime::Fixed { seconds: 0 },
                    }],
                },
            ],
        };
        let person_def = CsvDefinition::new(vec![
            FieldSpec::UniqueId,
            FieldSpec::IntB10 { name: "age".to_string() },
            FieldSpec::Bool { name: "vaccinated".to_string() },
            FieldSpec::DoubleB10 { name: "susceptibility".to_string() },
        ]);
        let location_def = CsvDefinition::new(vec![FieldSpec::UniqueId]);
        let activity_def = CsvDefinition::new(vec![
            FieldSpec::UniqueId,
            FieldSpec::ForeignId,
            FieldSpec::StartTime,
            FieldSpec::Duration,
        ]);
        let specs = if use_interventions {
            vec![
                InterventionSpec::Vaccination {
                    trigger: Trigger {
                        start_day: Some(2),
                        infectious_fraction: None,
                    },
                    probability: 0.5,
                    vaccinated_susceptibility: 0.1,
                },
                InterventionSpec::SelfIsolation {
                    trigger: Trigger {
                        start_day: None,
                        infectious_fraction: Some(0.01),
                    },
                    compliance: 0.8,
                },
            ]
        } else {
            Vec::new()
        };
        DiseaseModel::new(definition, person_def, location_def, activity_def, &specs)
    }

    #[must_use]
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn healthy_state(&self) -> usize {
        self.healthy_state
    }

    #[must_use]
    pub fn label(&self, state: usize) -> &str {
        &self.states[state].label
    }

    #[must_use]
    pub fn is_susceptible(&self, state: usize) -> bool {
        self.states[state].susceptible
    }

    #[must_use]
    pub fn is_infectious(&self, state: usize) -> bool {
        self.states[state].infectious
    }

    /// Whether the state has at least one outgoing edge.
    #[must_use]
    pub fn has_transitions(&self, state: usize) -> bool {
        !self.transitions[state].is_empty()
    }

    /// Draws the next state and its dwell time out of `state`.
    pub fn transition_from(
        &self,
        state: usize,
        rng: &mut SimRng,
    ) -> Result<(usize, Time), NososError> {
        let edges = &self.transitions[state];
        if edges.is_empty() {
            return Err(NososError::Model(format!(
                "transition out of terminal state '{}'",
                self.label(state)
            )));
        }
        let roll: f64 = rng.random();
        let mut cumulative = 0.0;
        let mut chosen = edges.len() - 1;
        for (index, edge) in edges.iter().enumerate() {
            cumulative += edge.probability;
            if roll < cumulative {
                chosen = index;
                break;
            }
        }
        let edge = &edges[chosen];
        let dwell = edge.dwell.sample(rng)?;
        Ok((edge.next, dwell))
    }

    /// Compliance of the configured self-isolation intervention, or zero if
    /// the model has none.
    #[must_use]
    pub fn isolation_compliance(&self) -> f64 {
        self.interventions
            .iter()
            .find_map(Intervention::compliance)
            .unwrap_or(0.0)
    }
}
