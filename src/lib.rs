//! An agent-based epidemic simulation over partitioned populations.
//!
//! The simulated world is split into two entity populations, people and
//! locations, each sharded into contiguous partitions that communicate only
//! by message. A run advances in whole days, each a three-phase cycle:
//!
//! * every people partition dispatches its persons' visits to the location
//!   partitions owning the visited locations,
//! * every location partition sweeps its locations' arrival/departure events
//!   into pairwise interactions and sends them back to the partitions owning
//!   the exposed persons,
//! * every people partition resolves its persons' pending interactions and
//!   advances their disease state machines.
//!
//! Sum-reductions over per-partition counters separate the phases and act as
//! barriers; the infectious-count reduction gates day advancement. The
//! [`coordinator::Coordinator`] drives the loop, applies interventions, and
//! writes the final (day × state) summary matrix as CSV.
//!
//! Populations come either from a scenario directory of CSV files with
//! precomputed byte-offset caches, or from a synthetic generator that places
//! locations on a grid and samples visit schedules per day. Partitions
//! serialize to opaque byte payloads and can be re-seated on other workers
//! mid-run; the shared disease model and configuration are re-resolved
//! locally after such a migration.

pub mod attributes;
pub mod config;
pub mod contact;
pub mod coordinator;
pub mod delivery;
pub mod disease;
pub mod error;
pub mod grid;
pub mod index;
pub mod interventions;
pub mod location;
pub mod location_partition;
pub mod log;
pub mod messages;
pub mod people_partition;
pub mod person;
pub mod readers;
pub mod rng;

pub use config::{Scenario, SimConfig, SyntheticConfig};
pub use contact::ContactModel;
pub use coordinator::{Checkpoint, Coordinator, DayCounts};
pub use delivery::{Delivery, DeliveryMode};
pub use disease::{DiseaseDefinition, DiseaseModel};
pub use error::NososError;
pub use index::PartitionMap;
pub use location_partition::LocationPartition;
pub use messages::{Interaction, InteractionMessage, VisitMessage};
pub use people_partition::PeoplePartition;
pub use person::Person;

/// Global entity identifier, stable across a run.
pub type Id = u64;
/// Simulated time in seconds.
pub type Time = i64;
/// Reduction counter.
pub type Counter = u64;

/// Seconds in one simulated day.
pub const DAY_LENGTH: Time = 86_400;
