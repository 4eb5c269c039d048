//! Game phase state machine
//!
//! Edges: Setup -> Night -> Day -> Discussion -> Voting -> Night | Ended.
//! Every phase entry resets the countdown, clears any scheduled transition,
//! posts an announcement and broadcasts the public snapshot.

use super::chat::ChatLog;
use super::player::Players;
use super::roles;
use crate::broadcast::Outbox;
use crate::protocol::ServerMessage;
use crate::types::*;
use indexmap::IndexMap;
use rand::Rng;

/// Pause between the last night action and resolving the night
pub const NIGHT_RESOLVE_DELAY_TICKS: u32 = 2;
/// Pause between an early vote resolution and the next night
pub const VOTE_RESULT_DELAY_TICKS: u32 = 3;

/// A transition queued by an early trigger, run by the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ResolveNight,
    EnterNight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub transition: Transition,
    pub ticks_left: u32,
}

#[derive(Debug, Clone)]
pub struct Game {
    pub phase: GamePhase,
    pub day_number: u32,
    pub time_remaining: u32,
    /// Actor id -> action, in first-submission order. Cleared each night.
    pub night_actions: IndexMap<PlayerId, NightAction>,
    /// Voter id -> target id. Cleared each voting phase.
    pub votes: IndexMap<PlayerId, PlayerId>,
    pub communications: ChatLog,
    pub winner: Option<Winner>,
    /// While set, the phase countdown is frozen and this runs instead
    pub scheduled: Option<Scheduled>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Town wins with no living mafia; mafia wins at parity or better
pub fn check_winner(players: &Players) -> Option<Winner> {
    let (mafia, town) = players
        .values()
        .filter(|p| p.alive)
        .fold((0usize, 0usize), |(m, t), p| {
            if p.is_mafia() {
                (m + 1, t)
            } else {
                (m, t + 1)
            }
        });

    if mafia == 0 {
        Some(Winner::Town)
    } else if mafia >= town {
        Some(Winner::Mafia)
    } else {
        None
    }
}

impl Game {
    fn new() -> Self {
        Self {
            phase: GamePhase::Setup,
            day_number: 0,
            time_remaining: 0,
            night_actions: IndexMap::new(),
            votes: IndexMap::new(),
            communications: ChatLog::default(),
            winner: None,
            scheduled: None,
            started_at: chrono::Utc::now(),
        }
    }

    /// Deal roles, tell everyone theirs, and open the first night
    pub fn start<R: Rng + ?Sized>(
        players: &mut Players,
        settings: &LobbySettings,
        rng: &mut R,
        out: &mut Outbox,
    ) -> Self {
        let mut game = Self::new();
        roles::assign_roles(players, settings, rng);

        for p in players.values() {
            if let Some(role) = p.role {
                out.player(&p.id, ServerMessage::RoleAssigned { role });
            }
        }

        game.enter_night(players, settings, out);
        game
    }

    /// Night, day, discussion or voting
    pub fn is_running(&self) -> bool {
        self.phase.is_timed()
    }

    pub fn is_ended(&self) -> bool {
        self.phase == GamePhase::Ended
    }

    /// Post a system line to the communications log
    pub fn announce(&mut self, text: impl Into<String>, out: &mut Outbox) {
        let entry = self.communications.push(text, None);
        out.room(ServerMessage::NewMessage { entry });
    }

    pub fn broadcast_state(&self, players: &Players, out: &mut Outbox) {
        out.room(ServerMessage::GameUpdate {
            game: self.snapshot(players),
        });
    }

    pub(crate) fn schedule(&mut self, transition: Transition, ticks: u32) {
        if self.scheduled.is_none() {
            tracing::debug!("Scheduling {:?} in {} ticks", transition, ticks);
            self.scheduled = Some(Scheduled {
                transition,
                ticks_left: ticks,
            });
        }
    }

    fn enter_phase(
        &mut self,
        phase: GamePhase,
        seconds: u32,
        announcement: &str,
        players: &Players,
        out: &mut Outbox,
    ) {
        self.phase = phase;
        self.time_remaining = seconds;
        self.scheduled = None;
        tracing::info!(
            "Entering {:?} (day {}, {}s)",
            phase,
            self.day_number,
            seconds
        );
        self.announce(announcement, out);
        self.broadcast_state(players, out);
    }

    pub fn enter_night(&mut self, players: &mut Players, settings: &LobbySettings, out: &mut Outbox) {
        self.day_number += 1;
        self.night_actions.clear();
        self.votes.clear();
        for p in players.values_mut() {
            p.vote_target = None;
        }

        self.enter_phase(
            GamePhase::Night,
            settings.full_phase_seconds(),
            "The night falls. Mafia, choose your target.",
            players,
            out,
        );

        let mafia: Vec<(&PlayerId, &str)> = players
            .values()
            .filter(|p| p.alive && p.is_mafia())
            .map(|p| (&p.id, p.name.as_str()))
            .collect();

        if mafia.len() > 1 {
            for (id, _) in &mafia {
                let teammates = mafia
                    .iter()
                    .filter(|(other, _)| other != id)
                    .map(|(_, name)| name.to_string())
                    .collect();
                out.player(id, ServerMessage::MafiaTeam { teammates });
            }
        }
    }

    /// Resolve the night's actions, then open the day
    pub fn enter_day(&mut self, players: &mut Players, settings: &LobbySettings, out: &mut Outbox) {
        self.resolve_night(players, out);
        self.enter_phase(
            GamePhase::Day,
            settings.full_phase_seconds(),
            "The day begins. Discuss and find the mafia!",
            players,
            out,
        );
    }

    pub fn enter_discussion(&mut self, players: &Players, settings: &LobbySettings, out: &mut Outbox) {
        self.enter_phase(
            GamePhase::Discussion,
            settings.half_phase_seconds(),
            "Discussion phase begins. Talk about your suspicions!",
            players,
            out,
        );
    }

    pub fn enter_voting(&mut self, players: &mut Players, settings: &LobbySettings, out: &mut Outbox) {
        self.votes.clear();
        for p in players.values_mut() {
            p.vote_target = None;
        }
        self.enter_phase(
            GamePhase::Voting,
            settings.half_phase_seconds(),
            "Voting phase begins. Vote for who you think is mafia!",
            players,
            out,
        );
    }

    /// Terminal. Reveals every role in the final snapshot.
    pub fn end(&mut self, winner: Winner, players: &Players, out: &mut Outbox) {
        self.phase = GamePhase::Ended;
        self.winner = Some(winner);
        self.time_remaining = 0;
        self.scheduled = None;
        tracing::info!("Game ended on day {}: {:?} win", self.day_number, winner);

        let text = match winner {
            Winner::Town => "The townsfolk have won! All mafia members have been eliminated.",
            Winner::Mafia => "The mafia have won! They outnumber the townsfolk.",
        };
        self.announce(text, out);
        self.broadcast_state(players, out);
    }

    /// One timer unit. Runs a due scheduled transition, or counts the
    /// phase down and forces the next phase at zero.
    pub fn tick(&mut self, players: &mut Players, settings: &LobbySettings, out: &mut Outbox) {
        if !self.is_running() {
            return;
        }

        if let Some(mut scheduled) = self.scheduled.take() {
            scheduled.ticks_left = scheduled.ticks_left.saturating_sub(1);
            if scheduled.ticks_left == 0 {
                self.run_transition(scheduled.transition, players, settings, out);
            } else {
                self.scheduled = Some(scheduled);
            }
            return;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            self.force_advance(players, settings, out);
        }
    }

    fn run_transition(
        &mut self,
        transition: Transition,
        players: &mut Players,
        settings: &LobbySettings,
        out: &mut Outbox,
    ) {
        match (transition, self.phase) {
            (Transition::ResolveNight, GamePhase::Night) => self.enter_day(players, settings, out),
            (Transition::EnterNight, GamePhase::Voting) => self.enter_night(players, settings, out),
            (t, phase) => tracing::debug!("Dropping stale {:?} in {:?}", t, phase),
        }
    }

    /// The countdown hit zero: advance whether or not input arrived
    pub fn force_advance(&mut self, players: &mut Players, settings: &LobbySettings, out: &mut Outbox) {
        tracing::debug!("Timer expired in {:?}", self.phase);
        match self.phase {
            GamePhase::Night => self.enter_day(players, settings, out),
            GamePhase::Day => self.enter_discussion(players, settings, out),
            GamePhase::Discussion => self.enter_voting(players, settings, out),
            GamePhase::Voting => {
                self.resolve_votes(players, out);
                if self.is_running() {
                    self.enter_night(players, settings, out);
                }
            }
            GamePhase::Setup | GamePhase::Ended => {}
        }
    }
}
