use super::game::{check_winner, Game, Transition, VOTE_RESULT_DELAY_TICKS};
use super::player::Players;
use crate::broadcast::Outbox;
use crate::error::{GameError, GameResult};
use crate::types::*;
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Eliminated(PlayerId),
    Tie,
    NoVotes,
}

/// Count current votes per target. Always derived from the votes map, so a
/// changed vote is counted once.
pub fn tally(votes: &IndexMap<PlayerId, PlayerId>) -> HashMap<PlayerId, u32> {
    let mut counts: HashMap<PlayerId, u32> = HashMap::new();
    for target in votes.values() {
        *counts.entry(target.clone()).or_insert(0) += 1;
    }
    counts
}

/// A unique maximum eliminates; a shared maximum or no votes does not
pub fn decide(tally: &HashMap<PlayerId, u32>) -> VoteOutcome {
    let Some(max) = tally.values().copied().max() else {
        return VoteOutcome::NoVotes;
    };

    let mut leaders = tally.iter().filter(|(_, count)| **count == max);
    match (leaders.next(), leaders.next()) {
        (Some((id, _)), None) => VoteOutcome::Eliminated(id.clone()),
        _ => VoteOutcome::Tie,
    }
}

impl Game {
    /// Record (or replace) a vote. Resolves immediately once every living
    /// player has voted, then schedules the next night.
    pub fn cast_vote(
        &mut self,
        voter_id: &str,
        target_id: &str,
        players: &mut Players,
        out: &mut Outbox,
    ) -> GameResult<()> {
        if self.phase != GamePhase::Voting {
            return Err(GameError::authorization(
                "Votes are only accepted during the voting phase",
            ));
        }
        if self.scheduled.is_some() {
            return Err(GameError::authorization("Voting has closed"));
        }

        match players.get(voter_id) {
            None => return Err(GameError::validation("Unknown player")),
            Some(voter) if !voter.alive => {
                return Err(GameError::authorization("Dead players cannot vote"))
            }
            Some(_) => {}
        }
        match players.get(target_id) {
            Some(target) if target.alive => {}
            Some(_) => return Err(GameError::validation("Target is not alive")),
            None => return Err(GameError::validation("Unknown target")),
        }

        self.votes
            .insert(voter_id.to_string(), target_id.to_string());
        if let Some(voter) = players.get_mut(voter_id) {
            voter.vote_target = Some(target_id.to_string());
        }
        tracing::debug!("{} voted for {}", voter_id, target_id);
        self.broadcast_state(players, out);

        let living = players.values().filter(|p| p.alive).count();
        if self.votes.len() >= living {
            tracing::info!("All {} living players voted, resolving early", living);
            self.resolve_votes(players, out);
            if self.is_running() {
                self.schedule(Transition::EnterNight, VOTE_RESULT_DELAY_TICKS);
            }
        }

        Ok(())
    }

    /// Eliminate the unique leader (if any), then check for a winner
    pub fn resolve_votes(&mut self, players: &mut Players, out: &mut Outbox) -> VoteOutcome {
        let outcome = decide(&tally(&self.votes));

        match &outcome {
            VoteOutcome::Eliminated(id) => {
                let name = match players.get_mut(id) {
                    Some(p) => {
                        p.alive = false;
                        p.name.clone()
                    }
                    None => String::new(),
                };
                tracing::info!("Day {}: {} eliminated by vote", self.day_number, id);
                self.announce(format!("{} has been eliminated!", name), out);
            }
            VoteOutcome::Tie => {
                self.announce("It's a tie! No one is eliminated.", out);
            }
            VoteOutcome::NoVotes => {
                self.announce("No votes were cast.", out);
            }
        }

        match check_winner(players) {
            Some(winner) => self.end(winner, players, out),
            None => self.broadcast_state(players, out),
        }

        outcome
    }
}
