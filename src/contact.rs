//! Contact models: pluggable policies deciding whether an overlapping pair
//! of visitors interacts and at what propensity.
//!
//! The set of models is a closed variant type; each variant carries its own
//! parameters, and the configuration selects one by tag. A model never owns
//! randomness: the enclosing location partition passes its generator into
//! every call that needs it, which keeps the draw sequence with the
//! partition across serialization.

use crate::disease::DiseaseModel;
use crate::location::{Location, Presence};
use crate::messages::Interaction;
use crate::rng::SimRng;
use crate::Time;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ContactModel {
    /// Every overlapping pair interacts at a fixed per-second rate.
    ConstantRate { transmissibility: f64 },
    /// Each overlapping pair interacts with a fixed probability.
    RandomPairs {
        transmissibility: f64,
        participation: f64,
    },
    /// Per-pair rate shrinks once a location's capacity exceeds the
    /// reference occupancy, modelling saturated mixing in large venues.
    Saturated {
        transmissibility: f64,
        reference_occupancy: f64,
    },
}

impl Default for ContactModel {
    fn default() -> Self {
        ContactModel::ConstantRate {
            transmissibility: 1e-6,
        }
    }
}

impl ContactModel {
    /// Initializes model-specific derived attributes on a location, once
    /// after load.
    pub fn compute_location_values(&self, disease: &DiseaseModel, location: &mut Location) {
        match self {
            ContactModel::ConstantRate { .. } | ContactModel::RandomPairs { .. } => {
                location.contact_scale = 1.0;
            }
            ContactModel::Saturated {
                reference_occupancy,
                ..
            } => {
                let capacity = disease
                    .location_table
                    .index_of("capacity")
                    .and_then(|slot| location.attributes.get(slot))
                    .and_then(crate::attributes::AttributeValue::as_f64);
                location.contact_scale = match capacity {
                    Some(capacity) if capacity > *reference_occupancy => {
                        reference_occupancy / capacity
                    }
                    _ => 1.0,
                };
            }
        }
    }

    /// Decides whether `source` (infectious) and `target` (susceptible)
    /// interact over `[overlap_start, overlap_end)` and, if so, computes the
    /// interaction's propensity.
    pub fn maybe_interact(
        &self,
        source: &Presence,
        target: &Presence,
        overlap_start: Time,
        overlap_end: Time,
        location: &Location,
        rng: &mut SimRng,
    ) -> Option<Interaction> {
        let propensity = match self {
            ContactModel::ConstantRate { transmissibility } => *transmissibility,
            ContactModel::RandomPairs {
                transmissibility,
                participation,
            } => {
                if rng.random::<f64>() >= *participation {
                    return None;
                }
                *transmissibility
            }
            ContactModel::Saturated { transmissibility, .. } => {
                transmissibility * location.contact_scale
            }
        };
        Some(Interaction {
            source: source.person,
            source_state: source.state,
            location: location.unique_id,
            start_time: overlap_start,
            end_time: overlap_end,
            propensity,
        })
    }
}
