//! Ready-State Manager + Round-Setup Manager (§4.8).

use crate::clock::Millis;
use crate::event::{CountdownPhase, EngineEvent, EventSink};
use crate::player::Roster;

/// Gates `SetPlayerReady` acceptance and the round-to-round re-enable
/// delay. In test mode the delay is 0 (§4.8), so the gate re-enables on
/// the very next tick after a round ends.
#[derive(Debug)]
pub struct ReadyGate {
    enabled: bool,
    pending_enable_at: Option<Millis>,
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self { enabled: true, pending_enable_at: None }
    }
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Called at round end: disables ready acceptance and arms the
    /// re-enable delay.
    pub fn start_delay(&mut self, now: Millis, delay_ms: Millis, sink: &dyn EventSink) {
        self.enabled = false;
        self.pending_enable_at = Some(now + delay_ms);
        sink.publish(EngineEvent::ReadyEnabled { enabled: false });
    }

    /// Call once per tick; flips `enabled` back on once the delay has
    /// elapsed.
    pub fn tick(&mut self, now: Millis, sink: &dyn EventSink) {
        if let Some(at) = self.pending_enable_at {
            if now >= at {
                self.enabled = true;
                self.pending_enable_at = None;
                sink.publish(EngineEvent::ReadyEnabled { enabled: true });
            }
        }
    }

    /// §4.8 `SetPlayerReady`: while disabled, only `false` is accepted.
    /// Returns `false` for unknown players or a rejected `true` while
    /// disabled.
    pub fn set_player_ready(&self, roster: &mut Roster, id: &str, value: bool, sink: &dyn EventSink) -> bool {
        if !self.enabled && value {
            return false;
        }
        let Some(player) = roster.get_mut(id) else { return false };
        player.ready = value;
        sink.publish(EngineEvent::PlayerReady { id: id.to_string(), is_ready: value });

        let total = roster.connected().count() as u32;
        let ready = roster.connected().filter(|p| p.ready).count() as u32;
        sink.publish(EngineEvent::ReadyUpdate { ready, total });
        true
    }

    /// §3 invariant: "all ready" counts only currently connected players.
    pub fn all_ready(&self, roster: &Roster) -> bool {
        roster.all_connected_ready()
    }
}

/// Resets every player's per-round state (§4.8: alive, zero damage, zero
/// round points, cleared status effects). Role-specific round-start
/// bookkeeping (target rerolling, pairing) is a separate call into
/// `role::on_round_start` — this function only touches the generic
/// player fields the spec names.
pub fn reset_players_for_round(roster: &mut Roster) {
    for player in roster.iter_mut() {
        player.reset_for_round();
    }
}

/// Pure computation of a countdown's current phase/remaining-seconds
/// given how much virtual time has elapsed since it started. A
/// zero-duration countdown is immediately `Go` and complete — no tick
/// is required to observe that.
pub fn countdown_tick(total_seconds: u32, started_at: Millis, now: Millis) -> (CountdownPhase, u32, bool) {
    let elapsed_seconds = (now.saturating_sub(started_at) / 1_000) as u32;
    if elapsed_seconds >= total_seconds {
        (CountdownPhase::Go, 0, true)
    } else {
        (CountdownPhase::Countdown, total_seconds - elapsed_seconds, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::event::RecordingSink;
    use crate::player::{EffectKind, Player};

    fn roster_with_one() -> Roster {
        let mut roster = Roster::new();
        roster.insert(Player::new("p1".into(), "P1".into(), 1, false, &Config::default()));
        roster
    }

    #[test]
    fn set_player_ready_rejects_true_while_disabled() {
        let mut roster = roster_with_one();
        let sink = RecordingSink::new();
        let mut gate = ReadyGate::new();
        gate.start_delay(0, 1_000, &sink);

        assert!(!gate.set_player_ready(&mut roster, "p1", true, &sink));
        assert!(gate.set_player_ready(&mut roster, "p1", false, &sink));
    }

    #[test]
    fn gate_reenables_after_delay_elapses() {
        let sink = RecordingSink::new();
        let mut gate = ReadyGate::new();
        gate.start_delay(0, 1_000, &sink);
        assert!(!gate.enabled());

        gate.tick(500, &sink);
        assert!(!gate.enabled());

        gate.tick(1_000, &sink);
        assert!(gate.enabled());
    }

    #[test]
    fn set_player_ready_toggle_is_idempotent_with_no_extra_side_effects() {
        let mut roster = roster_with_one();
        let sink = RecordingSink::new();
        let gate = ReadyGate::new();

        gate.set_player_ready(&mut roster, "p1", true, &sink);
        gate.set_player_ready(&mut roster, "p1", false, &sink);

        assert!(!roster.get("p1").unwrap().ready);
    }

    #[test]
    fn reset_players_for_round_clears_effects_and_damage() {
        let mut roster = roster_with_one();
        {
            let player = roster.get_mut("p1").unwrap();
            player.accumulated_damage = 40.0;
            player.status_effects.apply(EffectKind::Weakened, 0, None, 0.5);
        }
        reset_players_for_round(&mut roster);
        let player = roster.get("p1").unwrap();
        assert!(player.is_alive);
        assert_eq!(player.accumulated_damage, 0.0);
        assert!(!player.status_effects.has(EffectKind::Weakened));
    }

    #[test]
    fn zero_duration_countdown_is_immediately_go_and_complete() {
        let (phase, remaining, complete) = countdown_tick(0, 0, 0);
        assert_eq!(phase, CountdownPhase::Go);
        assert_eq!(remaining, 0);
        assert!(complete);
    }

    #[test]
    fn countdown_counts_down_by_whole_seconds() {
        let (phase, remaining, complete) = countdown_tick(3, 0, 1_500);
        assert_eq!(phase, CountdownPhase::Countdown);
        assert_eq!(remaining, 2);
        assert!(!complete);
    }
}
