//! The person entity and its end-of-day disease dynamics.

use crate::disease::DiseaseModel;
use crate::error::NososError;
use crate::messages::{Interaction, VisitMessage};
use crate::rng::SimRng;
use crate::{Id, Time, DAY_LENGTH};
use log::trace;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sentinel for a person who is not progressing through the disease model.
pub const NOT_PROGRESSING: Time = Time::MAX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub unique_id: Id,
    /// Current disease state, an index into the disease model.
    pub state: usize,
    /// State the person will hold after the countdown expires. Equal to
    /// `state` while the person is not in a progression.
    pub next_state: usize,
    /// Seconds remaining in the current state; [`NOT_PROGRESSING`] parks the
    /// countdown, a non-positive value fires a transition at the next
    /// end-of-day update.
    pub seconds_left_in_state: Time,
    pub attributes: Vec<crate::attributes::AttributeValue>,
    /// Replayed visit schedule, one list per distinct-visit day, times within
    /// `[0, DAY_LENGTH)`.
    pub visits_by_day: Vec<Vec<VisitMessage>>,
    /// Byte offset into the activity stream per distinct-visit day.
    pub visit_offset_by_day: Vec<u64>,
    /// Interactions received today; cleared by the end-of-day update.
    pub interactions: Vec<Interaction>,
    /// Sampled once at load: whether this person isolates when infectious.
    pub will_comply: bool,
    pub is_isolating: bool,
}

impl Person {
    #[must_use]
    pub fn new(unique_id: Id, state: usize, attributes: Vec<crate::attributes::AttributeValue>) -> Person {
        Person {
            unique_id,
            state,
            next_state: state,
            seconds_left_in_state: NOT_PROGRESSING,
            attributes,
            visits_by_day: Vec::new(),
            visit_offset_by_day: Vec::new(),
            interactions: Vec::new(),
            will_comply: false,
            is_isolating: false,
        }
    }

    /// Resolves today's pending interactions into at most one exposure.
    ///
    /// The pending propensities are aggregated into a single rate `T` and an
    /// exponential arrival time is drawn against it; an arrival within the
    /// day infects the person, and the responsible interaction is attributed
    /// by a propensity-weighted draw. Always clears the pending buffer.
    pub fn process_interactions(&mut self, disease: &DiseaseModel, rng: &mut SimRng) {
        if self.interactions.is_empty() {
            return;
        }
        let total: f64 = self.interactions.iter().map(|i| i.propensity).sum();
        if total > 0.0 {
            // u is in (0, 1] so the log is finite.
            let u = 1.0 - rng.random::<f64>();
            let roll = -u.ln() / total;
            if roll <= DAY_LENGTH as f64 && disease.is_susceptible(self.state) {
                let pick: f64 = rng.random_range(0.0..total);
                let mut partial = 0.0;
                let mut responsible = self.interactions.len() - 1;
                for (index, interaction) in self.interactions.iter().enumerate() {
                    partial += interaction.propensity;
                    if partial > pick {
                        responsible = index;
                        break;
                    }
                }
                let source = &self.interactions[responsible];
                trace!(
                    "person {} exposed by person {} at location {}",
                    self.unique_id,
                    source.source,
                    source.location
                );
                // Transition at the next state update.
                self.seconds_left_in_state = -1;
            }
        }
        self.interactions.clear();
    }

    /// Advances the disease state machine by one day.
    pub fn advance_state(&mut self, disease: &DiseaseModel, rng: &mut SimRng) -> Result<(), NososError> {
        if self.seconds_left_in_state == NOT_PROGRESSING {
            return Ok(());
        }
        if self.seconds_left_in_state > 0 {
            self.seconds_left_in_state -= DAY_LENGTH;
            return Ok(());
        }
        let (next, dwell) = disease.transition_from(self.state, rng)?;
        self.state = next;
        self.next_state = next;
        self.seconds_left_in_state = if disease.has_transitions(next) {
            dwell
        } else {
            NOT_PROGRESSING
        };
        Ok(())
    }

    /// Puts the person at the front of the disease progression, used to seed
    /// initial infections at load.
    pub fn begin_progression(&mut self, disease: &DiseaseModel, rng: &mut SimRng) -> Result<(), NososError> {
        self.seconds_left_in_state = -1;
        self.advance_state(disease, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disease::{
        DiseaseDefinition, DiseaseModel, DiseaseState, DwellTime, StateTransitions, TransitionEdge,
    };
    use crate::rng::partition_rng;

    /// susceptible → infected(terminal, infectious), immediate.
    fn two_state_model() -> DiseaseModel {
        let definition = DiseaseDefinition {
            states: vec![
                DiseaseState {
                    label: "susceptible".to_string(),
                    susceptible: true,
                    infectious: false,
                },
                DiseaseState {
                    label: "infected".to_string(),
                    susceptible: false,
                    infectious: true,
                },
            ],
            healthy_state: 0,
            transitions: vec![StateTransitions {
                from: 0,
                edges: vec![TransitionEdge {
                    next: 1,
                    probability: 1.0,
                    dwell: DwellTime::Fixed { seconds: 0 },
                }],
            }],
        };
        DiseaseModel::new(
            definition,
            Default::default(),
            Default::default(),
            Default::default(),
            &[],
        )
        .unwrap()
    }

    fn interaction(propensity: f64) -> Interaction {
        Interaction {
            source: 9,
            source_state: 1,
            location: 0,
            start_time: 0,
            end_time: DAY_LENGTH,
            propensity,
        }
    }

    #[test]
    fn no_interactions_means_no_state_change() {
        let disease = two_state_model();
        let mut rng = partition_rng(0, "test", 0);
        let mut person = Person::new(0, 0, vec![]);
        person.process_interactions(&disease, &mut rng);
        assert_eq!(person.state, 0);
        assert_eq!(person.seconds_left_in_state, NOT_PROGRESSING);
    }

    #[test]
    fn overwhelming_propensity_always_exposes() {
        let disease = two_state_model();
        let mut rng = partition_rng(1, "test", 0);
        for _ in 0..32 {
            let mut person = Person::new(0, 0, vec![]);
            person.interactions.push(interaction(1e6));
            person.process_interactions(&disease, &mut rng);
            assert_eq!(person.seconds_left_in_state, -1);
            assert!(person.interactions.is_empty());
        }
    }

    #[test]
    fn zero_total_propensity_never_exposes() {
        let disease = two_state_model();
        let mut rng = partition_rng(2, "test", 0);
        let mut person = Person::new(0, 0, vec![]);
        person.interactions.push(interaction(0.0));
        person.process_interactions(&disease, &mut rng);
        assert_eq!(person.seconds_left_in_state, NOT_PROGRESSING);
        assert!(person.interactions.is_empty());
    }

    #[test]
    fn infectious_person_is_not_reexposed() {
        let disease = two_state_model();
        let mut rng = partition_rng(3, "test", 0);
        let mut person = Person::new(0, 1, vec![]);
        person.interactions.push(interaction(1e6));
        person.process_interactions(&disease, &mut rng);
        assert_eq!(person.state, 1);
        assert_eq!(person.seconds_left_in_state, NOT_PROGRESSING);
    }

    #[test]
    fn pending_exposure_fires_at_next_update() {
        let disease = two_state_model();
        let mut rng = partition_rng(4, "test", 0);
        let mut person = Person::new(0, 0, vec![]);
        person.seconds_left_in_state = -1;
        person.advance_state(&disease, &mut rng).unwrap();
        assert_eq!(person.state, 1);
        assert_eq!(person.next_state, 1);
        // infected is terminal, so the countdown parks.
        assert_eq!(person.seconds_left_in_state, NOT_PROGRESSING);
    }

    #[test]
    fn countdown_decrements_by_a_day() {
        let disease = two_state_model();
        let mut rng = partition_rng(5, "test", 0);
        let mut person = Person::new(0, 0, vec![]);
        person.seconds_left_in_state = 3 * DAY_LENGTH;
        person.advance_state(&disease, &mut rng).unwrap();
        assert_eq!(person.state, 0);
        assert_eq!(person.seconds_left_in_state, 2 * DAY_LENGTH);
    }

    #[test]
    fn begin_progression_seeds_an_infection() {
        let disease = two_state_model();
        let mut rng = partition_rng(6, "test", 0);
        let mut person = Person::new(0, 0, vec![]);
        person.begin_progression(&disease, &mut rng).unwrap();
        assert_eq!(person.state, 1);
    }
}
