//! Game-Event Catalog (§4.7): timed global modifiers with escalating
//! stay-probabilities. Grounded on the closed-enum-with-hook-table idiom
//! used throughout this crate (`role`, `effect`); RNG is constructor/
//! call-site injected per the design note in §9 so tests can seed it.

use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;

use crate::clock::Millis;
use crate::event::{EngineEvent, EventSink};
use crate::mode::ModeKind;
use crate::player::Roster;
use crate::timer::{TimerQueue, TimerTag};

const CHECK_INTERVAL_MS: Millis = 5_000;
const RESTORE_DELAY_MS: Millis = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameEventKind {
    SpeedShift,
    TempoShift,
}

impl GameEventKind {
    fn threshold_factor(self) -> f32 {
        2.0
    }

    /// Base of the geometric stay-probability while in the `Slow` phase.
    fn stay_base_from_slow(self) -> f64 {
        match self {
            GameEventKind::SpeedShift => 3.0 / 4.0,
            GameEventKind::TempoShift => 4.0 / 5.0,
        }
    }

    /// Base of the geometric stay-probability while in the `Fast` phase.
    fn stay_base_from_fast(self) -> f64 {
        match self {
            GameEventKind::SpeedShift => 2.0 / 3.0,
            GameEventKind::TempoShift => 3.0 / 5.0,
        }
    }

    /// SpeedShift scales the danger threshold; TempoShift scales the
    /// damage multiplier — each event targets a distinct movement knob so
    /// they can run simultaneously without fighting over the same field.
    fn scale_movement(self, movement: &mut crate::config::MovementConfig, factor: f32) {
        match self {
            GameEventKind::SpeedShift => movement.danger_threshold *= factor,
            GameEventKind::TempoShift => movement.damage_multiplier *= factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEventPhase {
    Slow,
    Fast,
}

#[derive(Debug, Clone)]
struct GameEventState {
    phase: GameEventPhase,
    consecutive_stays: u32,
    next_check_at: Millis,
    /// Whether the multiplier is currently applied to every player's
    /// movement config — tracked explicitly so restore is idempotent
    /// across the fast→slow delay window.
    applied: bool,
    restore_timer: Option<u64>,
}

impl GameEventState {
    fn new(now: Millis) -> Self {
        Self {
            phase: GameEventPhase::Slow,
            consecutive_stays: 0,
            next_check_at: now + CHECK_INTERVAL_MS,
            applied: false,
            restore_timer: None,
        }
    }
}

/// Ticks every registered game event, manages phase transitions, and
/// applies/restores their player-facing movement multipliers.
#[derive(Debug, Default)]
pub struct GameEventManager {
    states: HashMap<GameEventKind, GameEventState>,
}

impl GameEventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.6 `getGameEvents`: a mode registers the events it wants ticked.
    pub fn register(&mut self, kind: GameEventKind, now: Millis) {
        self.states.entry(kind).or_insert_with(|| GameEventState::new(now));
    }

    pub fn is_registered(&self, kind: GameEventKind) -> bool {
        self.states.contains_key(&kind)
    }

    /// Advances every registered event's probability clock. Call once per
    /// tick; internally no-ops unless `CHECK_INTERVAL_MS` has elapsed
    /// since the last roll.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        roster: &mut Roster,
        now: Millis,
        rng: &mut R,
        timers: &mut TimerQueue,
        sink: &dyn EventSink,
        mode: ModeKind,
    ) {
        let kinds: Vec<GameEventKind> = self.states.keys().copied().collect();
        for kind in kinds {
            self.tick_one(kind, roster, now, rng, timers, sink, mode);
        }
    }

    fn tick_one<R: Rng + ?Sized>(
        &mut self,
        kind: GameEventKind,
        roster: &mut Roster,
        now: Millis,
        rng: &mut R,
        timers: &mut TimerQueue,
        sink: &dyn EventSink,
        mode: ModeKind,
    ) {
        let due = self.states.get(&kind).map(|s| now >= s.next_check_at).unwrap_or(false);
        if !due {
            return;
        }

        let (stay_probability, phase) = {
            let state = self.states.get(&kind).expect("checked above");
            let base = match state.phase {
                GameEventPhase::Slow => kind.stay_base_from_slow(),
                GameEventPhase::Fast => kind.stay_base_from_fast(),
            };
            (base.powi(state.consecutive_stays as i32 + 1), state.phase)
        };

        let stays = rng.random_bool(stay_probability.clamp(0.0, 1.0));

        let state = self.states.get_mut(&kind).expect("checked above");
        state.next_check_at = now + CHECK_INTERVAL_MS;

        if stays {
            state.consecutive_stays += 1;
            return;
        }
        state.consecutive_stays = 0;

        match phase {
            GameEventPhase::Slow => {
                state.phase = GameEventPhase::Fast;
                if let Some(id) = state.restore_timer.take() {
                    timers.cancel(id);
                }
                apply_multiplier(roster, kind);
                self.states.get_mut(&kind).expect("checked above").applied = true;
                sink.publish(EngineEvent::ModeEvent {
                    mode_name: mode,
                    event_type: kind,
                    data: serde_json::json!({ "phase": "fast" }),
                });
            }
            GameEventPhase::Fast => {
                state.phase = GameEventPhase::Slow;
                let restore_timer = timers.schedule(now + RESTORE_DELAY_MS, TimerTag::GameEventRestoreThreshold(kind));
                self.states.get_mut(&kind).expect("checked above").restore_timer = Some(restore_timer);
                sink.publish(EngineEvent::ModeEvent {
                    mode_name: mode,
                    event_type: kind,
                    data: serde_json::json!({ "phase": "slow" }),
                });
            }
        }
    }

    /// Called by the engine when a `GameEventRestoreThreshold` timer
    /// drains: removes the multiplier from every player's movement
    /// config, 1s after the fast→slow transition.
    pub fn handle_restore_timer(&mut self, roster: &mut Roster, kind: GameEventKind) {
        if let Some(state) = self.states.get_mut(&kind) {
            state.restore_timer = None;
        }
        restore_multiplier(roster, kind);
        if let Some(state) = self.states.get_mut(&kind) {
            state.applied = false;
        }
    }

    /// §9 cleanup rule: `Stop()`/`onGameEnd` restores immediately even if
    /// a fast→slow delay is still pending.
    pub fn force_restore_all(&mut self, roster: &mut Roster, timers: &mut TimerQueue) {
        let kinds: Vec<GameEventKind> = self.states.keys().copied().collect();
        for kind in kinds {
            if let Some(state) = self.states.get_mut(&kind) {
                if let Some(id) = state.restore_timer.take() {
                    timers.cancel(id);
                }
                if state.applied {
                    restore_multiplier(roster, kind);
                    state.applied = false;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

fn apply_multiplier(roster: &mut Roster, kind: GameEventKind) {
    let factor = kind.threshold_factor();
    for player in roster.iter_mut() {
        kind.scale_movement(&mut player.movement_config, factor);
    }
}

fn restore_multiplier(roster: &mut Roster, kind: GameEventKind) {
    let factor = 1.0 / kind.threshold_factor();
    for player in roster.iter_mut() {
        kind.scale_movement(&mut player.movement_config, factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::event::RecordingSink;
    use crate::player::Player;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_roster() -> Roster {
        let mut roster = Roster::new();
        let config = Config::default();
        roster.insert(Player::new("p1".into(), "P1".into(), 1, false, &config));
        roster
    }

    #[test]
    fn slow_to_fast_transition_scales_threshold_immediately() {
        let mut manager = GameEventManager::new();
        manager.register(GameEventKind::SpeedShift, 0);
        let mut roster = make_roster();
        let mut timers = TimerQueue::new();
        let sink = RecordingSink::new();
        let base_threshold = roster.get("p1").unwrap().movement_config.danger_threshold;

        // A high roll (near 1.0) always exceeds any stay-probability, so
        // the first check is guaranteed to transition out of `Slow`.
        let mut rng = FixedRng(0.999);
        manager.tick(&mut roster, 5_000, &mut rng, &mut timers, &sink, ModeKind::Classic);

        let scaled = roster.get("p1").unwrap().movement_config.danger_threshold;
        assert_eq!(scaled, base_threshold * GameEventKind::SpeedShift.threshold_factor());
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn fast_to_slow_restore_is_delayed_then_applied() {
        let mut manager = GameEventManager::new();
        manager.register(GameEventKind::SpeedShift, 0);
        let mut roster = make_roster();
        let mut timers = TimerQueue::new();
        let sink = RecordingSink::new();
        let base_threshold = roster.get("p1").unwrap().movement_config.danger_threshold;

        let mut rng = FixedRng(0.999);
        manager.tick(&mut roster, 5_000, &mut rng, &mut timers, &sink, ModeKind::Classic);
        manager.tick(&mut roster, 10_000, &mut rng, &mut timers, &sink, ModeKind::Classic);

        // Restore is scheduled but not yet applied.
        assert_ne!(roster.get("p1").unwrap().movement_config.danger_threshold, base_threshold);
        assert_eq!(timers.len(), 1);

        let due = timers.drain_due(11_000);
        assert_eq!(due.len(), 1);
        manager.handle_restore_timer(&mut roster, GameEventKind::SpeedShift);
        assert_eq!(roster.get("p1").unwrap().movement_config.danger_threshold, base_threshold);
    }

    #[test]
    fn force_restore_bypasses_pending_delay() {
        let mut manager = GameEventManager::new();
        manager.register(GameEventKind::SpeedShift, 0);
        let mut roster = make_roster();
        let mut timers = TimerQueue::new();
        let sink = RecordingSink::new();
        let base_threshold = roster.get("p1").unwrap().movement_config.danger_threshold;

        let mut rng = FixedRng(0.999);
        manager.tick(&mut roster, 5_000, &mut rng, &mut timers, &sink, ModeKind::Classic);
        manager.tick(&mut roster, 10_000, &mut rng, &mut timers, &sink, ModeKind::Classic);

        manager.force_restore_all(&mut roster, &mut timers);
        assert_eq!(roster.get("p1").unwrap().movement_config.danger_threshold, base_threshold);
        assert!(timers.is_empty());
    }

    /// Deterministic stand-in for `StdRng` in tests that need a pinned
    /// roll rather than a seeded-but-opaque sequence.
    struct FixedRng(f64);
    impl rand::RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            (self.0 * u32::MAX as f64) as u32
        }
        fn next_u64(&mut self) -> u64 {
            (self.0 * u64::MAX as f64) as u64
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
    }

    #[test]
    fn speed_shift_escalation_scenario_ends_fast() {
        // §8 scenario 5: checks n=1,2 with rolls {0.7, 0.6} end as `fast`,
        // with the threshold scaled by the fast multiplier.
        let mut manager = GameEventManager::new();
        manager.register(GameEventKind::SpeedShift, 0);
        let mut roster = make_roster();
        let mut timers = TimerQueue::new();
        let sink = RecordingSink::new();
        let base_threshold = roster.get("p1").unwrap().movement_config.danger_threshold;

        let mut first_roll = FixedRng(0.7);
        manager.tick(&mut roster, 5_000, &mut first_roll, &mut timers, &sink, ModeKind::Classic);
        assert_eq!(roster.get("p1").unwrap().movement_config.danger_threshold, base_threshold);

        let mut second_roll = FixedRng(0.6);
        manager.tick(&mut roster, 10_000, &mut second_roll, &mut timers, &sink, ModeKind::Classic);

        assert_eq!(
            roster.get("p1").unwrap().movement_config.danger_threshold,
            base_threshold * GameEventKind::SpeedShift.threshold_factor()
        );
    }

    #[test]
    fn seeded_std_rng_is_reproducible_across_runs() {
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = rng_a.random_bool(0.5);
        let b = rng_b.random_bool(0.5);
        assert_eq!(a, b);
    }
}
