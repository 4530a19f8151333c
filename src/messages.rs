//! Message types exchanged between people and location partitions.
//!
//! Cross-partition references are global ids only; a message never carries a
//! pointer into another partition's state. The person state travels as a
//! snapshot taken at dispatch time, so the receiving location can classify
//! the visitor without a round trip.

use crate::{Id, Time};
use serde::{Deserialize, Serialize};

/// One visit by one person to one location, sent from the person's partition
/// to the partition owning the location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitMessage {
    pub location: Id,
    pub person: Id,
    /// Disease state of the visitor, snapshotted at dispatch.
    pub person_state: usize,
    pub start_time: Time,
    pub end_time: Time,
}

/// A potentially-infecting contact, produced by a location's event sweep and
/// addressed to the susceptible party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// The infectious party.
    pub source: Id,
    pub source_state: usize,
    pub location: Id,
    /// Start of the overlap window.
    pub start_time: Time,
    /// End of the overlap window.
    pub end_time: Time,
    /// Rate at which this contact would produce infection under a Poisson
    /// process. Non-negative.
    pub propensity: f64,
}

/// A batch of interactions for a single person, delivered to the partition
/// owning that person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMessage {
    pub target: Id,
    pub interactions: Vec<Interaction>,
}
