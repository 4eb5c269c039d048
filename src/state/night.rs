use super::game::{Game, Transition, NIGHT_RESOLVE_DELAY_TICKS};
use super::player::Players;
use crate::broadcast::Outbox;
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;

/// What happened to the mafia's target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NightOutcome {
    Killed(PlayerId),
    Saved,
    NoKill,
}

/// Living players holding a role with a night action
pub fn expected_night_actions(players: &Players) -> usize {
    players.values().filter(|p| p.acts_at_night()).count()
}

impl Game {
    /// Record (or replace) the actor's action for tonight.
    ///
    /// Once every living mafia/doctor/detective has acted, resolution is
    /// scheduled after a short pause instead of waiting for the timer.
    pub fn submit_night_action(
        &mut self,
        actor_id: &str,
        target_id: &str,
        players: &Players,
    ) -> GameResult<NightAction> {
        if self.phase != GamePhase::Night {
            return Err(GameError::authorization(
                "Night actions are only allowed at night",
            ));
        }

        let actor = players
            .get(actor_id)
            .ok_or_else(|| GameError::validation("Unknown player"))?;
        if !actor.alive {
            return Err(GameError::authorization("Dead players cannot act"));
        }
        let kind = actor
            .role
            .and_then(Role::night_action)
            .ok_or_else(|| GameError::authorization("Your role has no night action"))?;

        let target = players
            .get(target_id)
            .ok_or_else(|| GameError::validation("Unknown target"))?;
        if !target.alive {
            return Err(GameError::validation("Target is not alive"));
        }

        let action = NightAction {
            kind,
            target_id: target_id.to_string(),
        };
        self.night_actions
            .insert(actor_id.to_string(), action.clone());
        tracing::debug!("{} submitted {:?} on {}", actor_id, kind, target_id);

        let expected = expected_night_actions(players);
        if self.scheduled.is_none() && self.night_actions.len() >= expected {
            tracing::info!("All {} night actions in, resolving early", expected);
            self.schedule(Transition::ResolveNight, NIGHT_RESOLVE_DELAY_TICKS);
        }

        Ok(action)
    }

    /// First submission of a kind wins; returns (actor, target)
    fn first_action(&self, kind: NightActionKind) -> Option<(PlayerId, PlayerId)> {
        self.night_actions
            .iter()
            .find(|(_, a)| a.kind == kind)
            .map(|(actor, a)| (actor.clone(), a.target_id.clone()))
    }

    /// Apply tonight's actions: kill unless healed, then report the
    /// investigation privately (even if the target just died).
    pub fn resolve_night(&mut self, players: &mut Players, out: &mut Outbox) -> NightOutcome {
        let mafia_target = self
            .first_action(NightActionKind::MafiaKill)
            .map(|(_, target)| target);
        let doctor_target = self
            .first_action(NightActionKind::DoctorHeal)
            .map(|(_, target)| target);
        let investigation = self.first_action(NightActionKind::DetectiveInvestigate);

        let outcome = match mafia_target {
            Some(target) if doctor_target.as_ref() == Some(&target) => NightOutcome::Saved,
            Some(target) => match players.get_mut(&target) {
                Some(victim) => {
                    victim.alive = false;
                    NightOutcome::Killed(target)
                }
                None => NightOutcome::NoKill,
            },
            None => NightOutcome::NoKill,
        };

        match &outcome {
            NightOutcome::Killed(id) => {
                let name = players.get(id).map(|p| p.name.clone()).unwrap_or_default();
                tracing::info!("Night {}: {} was killed", self.day_number, id);
                self.announce(format!("{} was killed by the mafia!", name), out);
            }
            NightOutcome::Saved => {
                tracing::info!("Night {}: doctor saved the target", self.day_number);
                self.announce("The doctor saved someone from the mafia's attack!", out);
            }
            NightOutcome::NoKill => {
                self.announce("The mafia did not kill anyone tonight.", out);
            }
        }

        if let Some((detective, target_id)) = investigation {
            if let Some(target) = players.get(&target_id) {
                let verdict = if target.is_mafia() {
                    Verdict::Suspicious
                } else {
                    Verdict::Trustworthy
                };
                out.player(
                    &detective,
                    ServerMessage::InvestigationResult {
                        target_id: target.id.clone(),
                        target_name: target.name.clone(),
                        verdict,
                    },
                );
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::tests::{game_in, seated};

    fn table() -> Players {
        seated(&[
            ("m", Role::Mafia),
            ("doc", Role::Doctor),
            ("det", Role::Detective),
            ("a", Role::Townsfolk),
            ("b", Role::Townsfolk),
        ])
    }

    fn night() -> Game {
        game_in(GamePhase::Night, 30)
    }

    #[test]
    fn test_kill_when_doctor_heals_someone_else() {
        let mut players = table();
        let mut game = night();
        game.submit_night_action("m", "a", &players).unwrap();
        game.submit_night_action("doc", "b", &players).unwrap();

        let mut out = Outbox::new();
        let outcome = game.resolve_night(&mut players, &mut out);

        assert_eq!(outcome, NightOutcome::Killed("a".to_string()));
        assert!(!players["a"].alive);
        assert_eq!(players.values().filter(|p| !p.alive).count(), 1);
    }

    #[test]
    fn test_doctor_saves_the_target() {
        let mut players = table();
        let mut game = night();
        game.submit_night_action("m", "a", &players).unwrap();
        game.submit_night_action("doc", "a", &players).unwrap();

        let mut out = Outbox::new();
        let outcome = game.resolve_night(&mut players, &mut out);

        assert_eq!(outcome, NightOutcome::Saved);
        assert!(players.values().all(|p| p.alive));
    }

    #[test]
    fn test_no_mafia_action_means_no_death() {
        let mut players = table();
        let mut game = night();
        game.submit_night_action("doc", "a", &players).unwrap();

        let mut out = Outbox::new();
        let outcome = game.resolve_night(&mut players, &mut out);

        assert_eq!(outcome, NightOutcome::NoKill);
        assert!(players.values().all(|p| p.alive));
    }

    #[test]
    fn test_investigation_is_private_and_survives_death() {
        let mut players = table();
        let mut game = night();
        game.submit_night_action("m", "b", &players).unwrap();
        game.submit_night_action("det", "b", &players).unwrap();

        let mut out = Outbox::new();
        game.resolve_night(&mut players, &mut out);

        assert!(!players["b"].alive);
        let results: Vec<_> = out.private_to("det").collect();
        assert_eq!(results.len(), 1);
        match results[0] {
            ServerMessage::InvestigationResult { target_id, verdict, .. } => {
                assert_eq!(target_id, "b");
                assert_eq!(*verdict, Verdict::Trustworthy);
            }
            other => panic!("Expected InvestigationResult, got {:?}", other),
        }
        assert!(out
            .to_room()
            .all(|m| !matches!(m, ServerMessage::InvestigationResult { .. })));
    }

    #[test]
    fn test_investigating_mafia_is_suspicious() {
        let mut players = table();
        let mut game = night();
        game.submit_night_action("det", "m", &players).unwrap();

        let mut out = Outbox::new();
        game.resolve_night(&mut players, &mut out);

        let verdict = out.private_to("det").find_map(|m| match m {
            ServerMessage::InvestigationResult { verdict, .. } => Some(*verdict),
            _ => None,
        });
        assert_eq!(verdict, Some(Verdict::Suspicious));
    }

    #[test]
    fn test_first_mafia_submission_wins() {
        let mut players = seated(&[
            ("m1", Role::Mafia),
            ("m2", Role::Mafia),
            ("a", Role::Townsfolk),
            ("b", Role::Townsfolk),
            ("c", Role::Townsfolk),
            ("d", Role::Townsfolk),
            ("e", Role::Townsfolk),
        ]);
        let mut game = night();
        game.submit_night_action("m1", "a", &players).unwrap();
        game.submit_night_action("m2", "b", &players).unwrap();
        // m1 changes their mind, keeps first position
        game.submit_night_action("m1", "c", &players).unwrap();

        let mut out = Outbox::new();
        let outcome = game.resolve_night(&mut players, &mut out);
        assert_eq!(outcome, NightOutcome::Killed("c".to_string()));
    }

    #[test]
    fn test_action_gating() {
        let mut players = table();
        let mut game = night();

        assert!(matches!(
            game.submit_night_action("a", "b", &players),
            Err(GameError::Authorization(_))
        ));
        assert!(matches!(
            game.submit_night_action("m", "nobody", &players),
            Err(GameError::Validation(_))
        ));

        players.get_mut("b").unwrap().alive = false;
        assert!(matches!(
            game.submit_night_action("m", "b", &players),
            Err(GameError::Validation(_))
        ));

        players.get_mut("doc").unwrap().alive = false;
        assert!(matches!(
            game.submit_night_action("doc", "a", &players),
            Err(GameError::Authorization(_))
        ));

        let mut day = game_in(GamePhase::Day, 30);
        assert!(matches!(
            day.submit_night_action("m", "a", &players),
            Err(GameError::Authorization(_))
        ));
        assert!(game.night_actions.is_empty());
    }

    #[test]
    fn test_all_actions_in_schedules_resolution() {
        let mut players = table();
        let mut game = night();
        let s = LobbySettings::default();

        game.submit_night_action("m", "a", &players).unwrap();
        game.submit_night_action("doc", "doc", &players).unwrap();
        assert!(game.scheduled.is_none());
        game.submit_night_action("det", "m", &players).unwrap();
        assert_eq!(
            game.scheduled.map(|s| s.transition),
            Some(Transition::ResolveNight)
        );

        let mut out = Outbox::new();
        game.tick(&mut players, &s, &mut out);
        assert_eq!(game.phase, GamePhase::Night);
        // Countdown frozen while the resolution is pending
        assert_eq!(game.time_remaining, 30);

        game.tick(&mut players, &s, &mut out);
        assert_eq!(game.phase, GamePhase::Day);
        assert!(!players["a"].alive);
    }
}
