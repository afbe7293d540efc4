//! Per-round turn scheduling.
//!
//! The policy favours balanced participation. Personas are ranked by how many responses they
//! have given so far in the session. Ties go to whoever spoke least recently (a persona that
//! never spoke counts as the oldest), and remaining ties go to roster order. The first
//! `min(K, R)` of that ranking speak, where K is the per-round response count and R the
//! roster size.

use crate::roundtable::error::SchedulingError;
use crate::roundtable::persona::PersonaId;
use serde::Serialize;

/// Contribution record of one persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participation {
    pub persona: PersonaId,
    pub responses: u32,
    /// Turn sequence number of the latest response, if any.
    pub last_turn: Option<u64>,
}

/// Per-session participation counters, kept in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipationLedger {
    entries: Vec<Participation>,
    next_turn: u64,
}

impl ParticipationLedger {
    pub fn new(roster: &[PersonaId]) -> Self {
        Self {
            entries: roster
                .iter()
                .map(|persona| Participation {
                    persona: *persona,
                    responses: 0,
                    last_turn: None,
                })
                .collect(),
            next_turn: 0,
        }
    }

    /// Counts one appended message for `persona`.
    pub fn record(&mut self, persona: PersonaId) {
        let turn = self.next_turn;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.persona == persona) {
            entry.responses += 1;
            entry.last_turn = Some(turn);
            self.next_turn += 1;
        }
    }

    pub fn responses(&self, persona: PersonaId) -> u32 {
        self.entries
            .iter()
            .find(|e| e.persona == persona)
            .map(|e| e.responses)
            .unwrap_or(0)
    }

    pub fn entries(&self) -> &[Participation] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TurnScheduler {
    responders_per_round: usize,
}

impl TurnScheduler {
    pub fn new(responders_per_round: usize) -> Self {
        Self {
            responders_per_round,
        }
    }

    /// Picks who speaks this round, in speaking order.
    pub fn select(&self, ledger: &ParticipationLedger) -> Result<Vec<PersonaId>, SchedulingError> {
        if ledger.entries.is_empty() || self.responders_per_round == 0 {
            return Err(SchedulingError::NoEligibleAgents);
        }

        let mut ranked: Vec<(usize, &Participation)> = ledger.entries.iter().enumerate().collect();
        ranked.sort_by_key(|(position, entry)| (entry.responses, entry.last_turn, *position));

        Ok(ranked
            .into_iter()
            .take(self.responders_per_round)
            .map(|(_, entry)| entry.persona)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: [PersonaId; 4] = PersonaId::ALL;

    #[test]
    fn first_round_follows_roster_order() {
        let ledger = ParticipationLedger::new(&ROSTER);
        let picked = TurnScheduler::new(2).select(&ledger).unwrap();
        assert_eq!(picked, vec![PersonaId::Skeptic, PersonaId::Synthesizer]);
    }

    #[test]
    fn least_active_personas_go_next() {
        let mut ledger = ParticipationLedger::new(&ROSTER);
        ledger.record(PersonaId::Skeptic);
        ledger.record(PersonaId::Synthesizer);
        let picked = TurnScheduler::new(2).select(&ledger).unwrap();
        assert_eq!(picked, vec![PersonaId::Analyst, PersonaId::Explorer]);
    }

    #[test]
    fn equal_counts_prefer_least_recent_speaker() {
        let mut ledger = ParticipationLedger::new(&ROSTER);
        for persona in [
            PersonaId::Explorer,
            PersonaId::Analyst,
            PersonaId::Synthesizer,
            PersonaId::Skeptic,
        ] {
            ledger.record(persona);
        }
        let picked = TurnScheduler::new(2).select(&ledger).unwrap();
        assert_eq!(picked, vec![PersonaId::Explorer, PersonaId::Analyst]);
    }

    #[test]
    fn more_responders_than_roster_selects_everyone_once() {
        let ledger = ParticipationLedger::new(&ROSTER[..3]);
        let picked = TurnScheduler::new(5).select(&ledger).unwrap();
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn empty_roster_or_zero_k_fails() {
        let empty = ParticipationLedger::new(&[]);
        assert_eq!(
            TurnScheduler::new(2).select(&empty),
            Err(SchedulingError::NoEligibleAgents)
        );
        let ledger = ParticipationLedger::new(&ROSTER);
        assert_eq!(
            TurnScheduler::new(0).select(&ledger),
            Err(SchedulingError::NoEligibleAgents)
        );
    }

    #[test]
    fn rounds_cover_the_roster_evenly() {
        let mut ledger = ParticipationLedger::new(&ROSTER);
        let scheduler = TurnScheduler::new(2);
        for _ in 0..6 {
            for persona in scheduler.select(&ledger).unwrap() {
                ledger.record(persona);
            }
        }
        for entry in ledger.entries() {
            assert_eq!(entry.responses, 3);
        }
    }
}
