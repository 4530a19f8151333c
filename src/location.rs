//! The location entity: a day's worth of arrival/departure events and the
//! sweep that turns them into pairwise interactions.
//!
//! Events accumulate unordered as visit messages arrive and are ordered once
//! at processing time, so delivery order never affects the outcome. An
//! arrival and its departure are paired by index into the event buffer,
//! which lets the sweep read a visit's end time the moment it starts.

use crate::contact::ContactModel;
use crate::disease::DiseaseModel;
use crate::error::NososError;
use crate::messages::{Interaction, VisitMessage};
use crate::rng::SimRng;
use crate::{Counter, Id, Time};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    // Arrival sorts before Departure at equal times, so a visit never
    // appears to overlap a visit that ends as it starts.
    Arrival,
    Departure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub person: Id,
    pub person_state: usize,
    pub time: Time,
    /// Index of the paired event within the same buffer.
    pub partner: usize,
}

/// A person currently inside the location during the sweep.
#[derive(Debug, Clone, Copy)]
pub struct Presence {
    pub person: Id,
    pub state: usize,
    pub arrival: Time,
    pub departure: Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub unique_id: Id,
    pub attributes: Vec<crate::attributes::AttributeValue>,
    /// Derived by the contact model once after load.
    pub contact_scale: f64,
    events: Vec<Event>,
}

impl Location {
    #[must_use]
    pub fn new(unique_id: Id, attributes: Vec<crate::attributes::AttributeValue>) -> Location {
        Location {
            unique_id,
            attributes,
            contact_scale: 1.0,
            events: Vec::new(),
        }
    }

    /// Queues the arrival/departure pair for one visit. Zero-duration visits
    /// are dropped; a visit that ends before it starts is malformed data.
    pub fn add_visit(&mut self, visit: &VisitMessage) -> Result<(), NososError> {
        if visit.start_time > visit.end_time {
            return Err(NososError::Data(format!(
                "visit by person {} to location {} ends at {} before starting at {}",
                visit.person, visit.location, visit.end_time, visit.start_time
            )));
        }
        if visit.start_time == visit.end_time {
            return Ok(());
        }
        let arrival = self.events.len();
        self.events.push(Event {
            kind: EventKind::Arrival,
            person: visit.person,
            person_state: visit.person_state,
            time: visit.start_time,
            partner: arrival + 1,
        });
        self.events.push(Event {
            kind: EventKind::Departure,
            person: visit.person,
            person_state: visit.person_state,
            time: visit.end_time,
            partner: arrival,
        });
        Ok(())
    }

    #[must_use]
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    /// Event indices in sweep order: by time, arrivals first on ties, stable
    /// beyond that.
    fn sweep_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.events.len()).collect();
        order.sort_by_key(|&index| (self.events[index].time, self.events[index].kind));
        order
    }

    /// Walks the day's events, pairing each arriving person against everyone
    /// already present and asking the contact model whether the pair
    /// interacts. Emitted interactions are addressed to the susceptible
    /// party. Clears the event buffer and returns the number of
    /// interactions.
    pub fn process_events<F>(
        &mut self,
        disease: &DiseaseModel,
        contact: &ContactModel,
        rng: &mut SimRng,
        emit: &mut F,
    ) -> Counter
    where
        F: FnMut(Id, Interaction),
    {
        let mut emitted: Counter = 0;
        let mut present: Vec<(usize, Presence)> = Vec::new();
        for index in self.sweep_order() {
            let event = &self.events[index];
            match event.kind {
                EventKind::Arrival => {
                    let arriving = Presence {
                        person: event.person,
                        state: event.person_state,
                        arrival: event.time,
                        departure: self.events[event.partner].time,
                    };
                    for (_, other) in &present {
                        if other.person == arriving.person {
                            continue;
                        }
                        let (source, target) = if disease.is_infectious(arriving.state)
                            && disease.is_susceptible(other.state)
                        {
                            (&arriving, other)
                        } else if disease.is_susceptible(arriving.state)
                            && disease.is_infectious(other.state)
                        {
                            (other, &arriving)
                        } else {
                            continue;
                        };
                        let overlap_start = arriving.arrival;
                        let overlap_end = arriving.departure.min(other.departure);
                        if let Some(interaction) = contact.maybe_interact(
                            source,
                            target,
                            overlap_start,
                            overlap_end,
                            self,
                            rng,
                        ) {
                            emit(target.person, interaction);
                            emitted += 1;
                        }
                    }
                    present.push((index, arriving));
                }
                EventKind::Departure => {
                    present.retain(|(arrival_index, _)| *arrival_index != event.partner);
                }
            }
        }
        self.events.clear();
        emitted
    }
}
