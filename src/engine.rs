//! Match state machine (§4.1-§4.2): the single mutator that owns every
//! other manager and drives the fixed per-tick ordering. Grounded on the
//! teacher's `MatchManager`/`TickEvent` pump (`mtch/mod.rs`) — a
//! single owning struct advanced by one `tick` entry point, publishing
//! everything it does onto the shared event bus rather than returning
//! results piecemeal.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use crate::base::BaseManager;
use crate::clock::{Clock, Millis};
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::event::{CountdownPhase, EngineEvent, EventSink, TeamScoreEntry};
use crate::gameevent::GameEventManager;
use crate::mode::{self, GameMode, ModeCtx, ModeKind};
use crate::player::{MotionSample, PlayerId, Roster};
use crate::ready::{self, ReadyGate};
use crate::role;
use crate::team::TeamManager;
use crate::timer::{TimerQueue, TimerTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchState {
    Waiting,
    PreGame,
    Countdown,
    Active,
    RoundEnded,
    Finished,
}

/// Input-rejection cases (§7): returned to the caller as a structured
/// error; engine state is left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("at least 2 players are required to launch")]
    NotEnoughPlayers,
    #[error("team {0} has no assigned players")]
    EmptyTeam(u8),
    #[error("a match is already active")]
    AlreadyActive,
    #[error("match is not in the pre-game state")]
    NotInPreGame,
    #[error("team count must be between 2 and 4")]
    InvalidTeamCount,
}

/// Body of `POST /api/game/launch` (§6): mode plus the subset of
/// per-mode knobs relevant to it. Fields irrelevant to the chosen mode
/// are ignored rather than rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOptions {
    pub countdown_duration_ms: Option<Millis>,
    pub round_count: Option<u32>,
    pub round_duration_ms: Option<Millis>,
    pub respawn_delay_ms: Option<Millis>,
    pub target_score: Option<u32>,
    pub control_interval_ms: Option<Millis>,
    pub point_target: Option<u32>,
}

fn build_mode(kind: ModeKind, options: LaunchOptions) -> Box<dyn GameMode> {
    match kind {
        ModeKind::Classic => {
            let mut o = mode::ClassicOptions::default();
            if let Some(v) = options.countdown_duration_ms {
                o.countdown_ms = v;
            }
            if options.round_count.is_some() {
                o.round_count = options.round_count;
                o.target_score = None;
            }
            if options.target_score.is_some() {
                o.target_score = options.target_score;
                o.round_count = None;
            }
            Box::new(mode::ClassicMode::new(o))
        }
        ModeKind::RoleBased => {
            let mut o = mode::RoleBasedOptions::default();
            if let Some(v) = options.countdown_duration_ms {
                o.countdown_ms = v;
            }
            if options.round_count.is_some() {
                o.round_count = options.round_count;
                o.target_score = None;
            }
            if options.target_score.is_some() {
                o.target_score = options.target_score;
                o.round_count = None;
            }
            Box::new(mode::RoleBasedMode::new(o))
        }
        ModeKind::DeathCount => {
            let mut o = mode::DeathCountOptions::default();
            if let Some(v) = options.countdown_duration_ms {
                o.countdown_ms = v;
            }
            if let Some(v) = options.round_duration_ms {
                o.round_duration_ms = v;
            }
            if let Some(v) = options.respawn_delay_ms {
                o.respawn_delay_ms = v;
            }
            if options.round_count.is_some() {
                o.round_count = options.round_count;
                o.target_score = None;
            }
            if options.target_score.is_some() {
                o.target_score = options.target_score;
                o.round_count = None;
            }
            Box::new(mode::DeathCountMode::new(o))
        }
        ModeKind::Domination => {
            let mut o = mode::DominationOptions::default();
            if let Some(v) = options.countdown_duration_ms {
                o.countdown_ms = v;
            }
            if let Some(v) = options.control_interval_ms {
                o.control_interval_ms = v;
            }
            if let Some(v) = options.point_target {
                o.point_target = v;
            }
            Box::new(mode::DominationMode::new(o))
        }
    }
}

/// Owns every manager and drives the fixed tick ordering (§4.2). The one
/// piece of mutable state the transport is allowed to touch; everything
/// else is observed through the event bus.
pub struct GameEngine {
    state: MatchState,
    clock: Clock,
    config: Config,
    roster: Roster,
    connection: ConnectionManager,
    teams: TeamManager,
    bases: BaseManager,
    game_events: GameEventManager,
    timers: TimerQueue,
    ready_gate: ReadyGate,
    mode: Option<Box<dyn GameMode>>,
    mode_kind: Option<ModeKind>,
    sink: Box<dyn EventSink>,
    rng: StdRng,

    current_round: u32,
    round_started_at: Millis,
    countdown_started_at: Millis,
    countdown_total_seconds: u32,

    /// §4.1 "Launch ... (or active in test mode)": skips pre-game and
    /// countdown entirely, matching the harness's zero-delay fixtures.
    test_mode: bool,

    ready_delay_ms: Millis,
    lobby_grace_ms: Millis,
}

impl GameEngine {
    pub fn new(sink: Box<dyn EventSink>) -> Self {
        Self::with_config(Config::default(), sink)
    }

    pub fn with_config(config: Config, sink: Box<dyn EventSink>) -> Self {
        let tick_interval_ms = config.tick_interval_ms;
        Self {
            state: MatchState::Waiting,
            clock: Clock::new(tick_interval_ms),
            config,
            roster: Roster::new(),
            connection: ConnectionManager::new(),
            teams: TeamManager::new(),
            bases: BaseManager::new(),
            game_events: GameEventManager::new(),
            timers: TimerQueue::new(),
            ready_gate: ReadyGate::new(),
            mode: None,
            mode_kind: None,
            sink,
            rng: StdRng::seed_from_u64(0xC0FFEE),
            current_round: 0,
            round_started_at: 0,
            countdown_started_at: 0,
            countdown_total_seconds: 0,
            test_mode: false,
            ready_delay_ms: 3_000,
            lobby_grace_ms: 15_000,
        }
    }

    pub fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
        if enabled {
            self.ready_delay_ms = 0;
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn teams(&self) -> &TeamManager {
        &self.teams
    }

    pub fn teams_mut(&mut self) -> &mut TeamManager {
        &mut self.teams
    }

    pub fn bases(&self) -> &BaseManager {
        &self.bases
    }

    pub fn bases_mut(&mut self) -> &mut BaseManager {
        &mut self.bases
    }

    pub fn mode_kind(&self) -> Option<ModeKind> {
        self.mode_kind
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// §6 `POST /api/game/settings`: unlike `TeamManager::configure`'s
    /// internal clamp (used when a mode or test harness sets teams up
    /// directly), the settings endpoint rejects an out-of-range count
    /// outright rather than silently clamping it.
    pub fn configure_teams(&mut self, enabled: bool, count: u8) -> Result<(), EngineError> {
        if enabled && !(2..=4).contains(&count) {
            return Err(EngineError::InvalidTeamCount);
        }
        self.teams.configure(enabled, count);
        Ok(())
    }

    /// §6 `POST /api/game/teams/shuffle`.
    pub fn shuffle_teams(&mut self) {
        let ids: Vec<PlayerId> = self.roster.ids().cloned().collect();
        self.teams.shuffle(&ids);
    }

    // -- Connection passthroughs (§4.9) --------------------------------

    pub fn register_player(&mut self, id: &str, socket_id: String, name: String, is_bot: bool) -> u32 {
        self.connection
            .register(&mut self.roster, id, socket_id, name, is_bot, &self.config, self.sink.as_ref())
    }

    pub fn handle_socket_disconnect(&mut self, socket_id: &str) {
        self.connection.handle_socket_disconnect(&mut self.roster, socket_id);
    }

    pub fn handle_lobby_disconnect(&mut self, id: &str) {
        let now = self.clock.now();
        self.connection.handle_lobby_disconnect(&mut self.roster, id, now, self.lobby_grace_ms, &mut self.timers);
    }

    /// §4.9 `Kick`: external operation permitted only in `waiting`.
    pub fn kick(&mut self, id: &str) -> bool {
        if self.state != MatchState::Waiting {
            return false;
        }
        self.connection.remove(&mut self.roster, id, &mut self.timers, self.sink.as_ref());
        true
    }

    pub fn set_player_ready(&mut self, id: &str, value: bool) -> bool {
        let accepted = self.ready_gate.set_player_ready(&mut self.roster, id, value, self.sink.as_ref());
        if accepted && self.maybe_auto_transition_on_all_ready() {
            // handled below
        }
        accepted
    }

    fn maybe_auto_transition_on_all_ready(&mut self) -> bool {
        if !self.ready_gate.all_ready(&self.roster) {
            return false;
        }
        match self.state {
            MatchState::Finished => {
                self.return_to_waiting();
                true
            }
            _ => false,
        }
    }

    // -- Lifecycle operations (§4.1) ------------------------------------

    pub fn launch(&mut self, mode_kind: ModeKind, options: LaunchOptions) -> Result<(), EngineError> {
        if self.state != MatchState::Waiting {
            return Err(EngineError::AlreadyActive);
        }
        if self.roster.len() < 2 {
            return Err(EngineError::NotEnoughPlayers);
        }
        if let Err(team_id) = self.teams.validate_teams() {
            return Err(EngineError::EmptyTeam(team_id));
        }

        let mut game_mode = build_mode(mode_kind, options);
        self.clock.reset();
        self.timers.clear();
        self.game_events.clear();
        ready::reset_players_for_round(&mut self.roster);

        {
            let mut ctx = ModeCtx {
                roster: &mut self.roster,
                config: &mut self.config,
                teams: &mut self.teams,
                bases: &mut self.bases,
                game_events: &mut self.game_events,
                timers: &mut self.timers,
                sink: self.sink.as_ref(),
                now: 0,
                round_started_at: 0,
            };
            game_mode.on_mode_selected(&mut ctx);
            for kind in game_mode.game_event_kinds() {
                ctx.game_events.register(kind, 0);
            }
            game_mode.on_game_start(&mut ctx);
        }

        self.countdown_total_seconds = game_mode.countdown_duration_ms() as u32 / 1_000;
        self.mode = Some(game_mode);
        self.mode_kind = Some(mode_kind);
        self.current_round = 0;

        self.sink.publish(EngineEvent::GameStart { mode: mode_kind, sensitivity: self.config.sensitivity });

        if self.test_mode {
            self.state = MatchState::Active;
            self.start_round();
        } else {
            self.state = MatchState::PreGame;
        }
        Ok(())
    }

    pub fn proceed_from_pre_game(&mut self) -> Result<(), EngineError> {
        if self.state != MatchState::PreGame {
            return Err(EngineError::NotInPreGame);
        }
        self.begin_countdown();
        Ok(())
    }

    fn begin_countdown(&mut self) {
        self.state = MatchState::Countdown;
        self.countdown_started_at = self.clock.now();
        self.sink.publish(EngineEvent::GameCountdown {
            phase: CountdownPhase::Countdown,
            seconds_remaining: self.countdown_total_seconds,
            total_seconds: self.countdown_total_seconds,
        });
    }

    fn start_round(&mut self) {
        self.current_round += 1;
        self.round_started_at = self.clock.now();
        ready::reset_players_for_round(&mut self.roster);
        role::on_round_start(&mut self.roster, self.round_started_at);

        if let Some(mut game_mode) = self.mode.take() {
            {
                let mut ctx = self.mode_ctx();
                game_mode.on_round_start(&mut ctx);
            }
            self.mode = Some(game_mode);
        }

        self.sink.publish(EngineEvent::GameRoundStart { round: self.current_round });
        self.state = MatchState::Active;
    }

    /// Idempotent from any non-`waiting` state (§4.1): clears respawns,
    /// cancels timers, resets ready state, restores movement config.
    pub fn stop(&mut self) {
        if self.state == MatchState::Waiting {
            return;
        }
        if let Some(mut game_mode) = self.mode.take() {
            {
                let mut ctx = self.mode_ctx();
                game_mode.on_game_end(&mut ctx);
            }
        }
        self.game_events.force_restore_all(&mut self.roster, &mut self.timers);
        self.timers.clear();
        self.mode = None;
        self.mode_kind = None;
        self.state = MatchState::Waiting;
        self.current_round = 0;
        self.ready_gate = ReadyGate::new();
        for player in self.roster.iter_mut() {
            player.ready = false;
        }
    }

    fn return_to_waiting(&mut self) {
        self.stop();
    }

    fn mode_ctx(&mut self) -> ModeCtx<'_> {
        ModeCtx {
            roster: &mut self.roster,
            config: &mut self.config,
            teams: &mut self.teams,
            bases: &mut self.bases,
            game_events: &mut self.game_events,
            timers: &mut self.timers,
            sink: self.sink.as_ref(),
            now: self.clock.now(),
            round_started_at: self.round_started_at,
        }
    }

    // -- Tick loop (§4.2) -------------------------------------------------

    pub fn tick(&mut self) {
        let now = self.clock.advance_one_tick();
        self.sink.publish(EngineEvent::StartOfTick { tick_id: self.clock.tick_count() });

        self.drain_timers(now);
        self.ready_gate.tick(now, self.sink.as_ref());
        if self.maybe_auto_transition_on_all_ready() {
            self.sink.publish(EngineEvent::EndOfTick { tick_id: self.clock.tick_count() });
            return;
        }

        match self.state {
            MatchState::Countdown => self.tick_countdown(now),
            MatchState::Active => self.tick_active(now),
            MatchState::RoundEnded => self.tick_round_ended(now),
            _ => {}
        }

        self.sink.publish(EngineEvent::EndOfTick { tick_id: self.clock.tick_count() });
    }

    /// Advances virtual time without running any tick logic (the debug
    /// `/fastforward` entry point); callers still need to call `tick`
    /// afterward to actually drain whatever became due.
    pub fn fast_forward(&mut self, millis: Millis) {
        self.clock.fast_forward(millis);
    }

    fn drain_timers(&mut self, now: Millis) {
        let due = self.timers.drain_due(now);
        for (_id, tag) in due {
            match tag {
                TimerTag::Respawn(id) => self.handle_respawn_timer(&id, now),
                TimerTag::LobbyGraceExpired(id) => {
                    self.connection.on_lobby_grace_expired(&mut self.roster, &id, &mut self.timers, self.sink.as_ref());
                }
                TimerTag::BerserkerDebounceExpired(id) => {
                    role::on_berserker_debounce_expired(&mut self.roster, &id, now);
                }
                TimerTag::TrollHeal(id) => {
                    role::on_troll_heal_expired(&mut self.roster, &id);
                }
                TimerTag::GameEventRestoreThreshold(kind) => {
                    self.game_events.handle_restore_timer(&mut self.roster, kind);
                }
                TimerTag::ReadyDelayExpired | TimerTag::RoundCountdownTick | TimerTag::GameEventDeactivate(_) => {}
            }
        }
    }

    fn handle_respawn_timer(&mut self, id: &PlayerId, _now: Millis) {
        if let Some(player) = self.roster.get_mut(id) {
            player.respawn();
            self.sink.publish(EngineEvent::PlayerRespawn { player: player.clone() });
        }
    }

    fn tick_countdown(&mut self, now: Millis) {
        let (phase, remaining, complete) = ready::countdown_tick(self.countdown_total_seconds, self.countdown_started_at, now);
        self.sink.publish(EngineEvent::GameCountdown {
            phase,
            seconds_remaining: remaining,
            total_seconds: self.countdown_total_seconds,
        });
        if complete {
            self.start_round();
        }
    }

    fn tick_active(&mut self, now: Millis) {
        let ids: Vec<PlayerId> = self.roster.ids().cloned().collect();
        for id in &ids {
            self.tick_one_player(id, now);
        }

        self.tick_respawn_and_mode_events(now);
        self.tick_mode(now);
        self.check_win_condition(now);
    }

    /// Drives the active mode's own per-tick behavior (§4.2) — Domination's
    /// base-point scoring lives here, not in the generic respawn/game-event
    /// pass, since it's mode-specific rather than shared across modes.
    fn tick_mode(&mut self, _now: Millis) {
        let dt = self.clock.tick_interval();
        if let Some(mut game_mode) = self.mode.take() {
            {
                let mut ctx = self.mode_ctx();
                game_mode.on_tick(&mut ctx, dt);
            }
            self.mode = Some(game_mode);
        }
    }

    fn tick_one_player(&mut self, id: &str, now: Millis) {
        let dt = self.clock.tick_interval();
        let mode_kind = self.mode_kind;
        let Some(player) = self.roster.get_mut(id) else { return };
        if !player.is_alive {
            return;
        }

        player.status_effects.expire(now);

        // Domination has no death at all (§4.6: base capture/scoring is
        // its entire win-condition loop) — motion damage and the Excited
        // idle-kill never apply, so the rest of this pipeline is skipped.
        if mode_kind == Some(ModeKind::Domination) {
            return;
        }

        let blocks_damage = player.status_effects.blocks_all_damage();
        let intensity = player.motion_history.effective_intensity(player.movement_config.smoothing_enabled);
        let is_idle = intensity.map_or(true, |i| i <= role::excited_idle_noise_floor());
        let idle_killed = player.status_effects.tick_excited(dt, is_idle, role::excited_idle_kill_threshold_ms());

        if !blocks_damage {
            if let Some(intensity) = intensity {
                let threshold = player.effective_threshold();
                if intensity > threshold {
                    let raw = if player.movement_config.oneshot_mode {
                        player.death_threshold
                    } else {
                        (intensity - threshold) * player.movement_config.damage_multiplier / player.effective_toughness()
                    };
                    let delivered = player.take_damage(raw);
                    if delivered > 0.0 {
                        self.sink.publish(EngineEvent::PlayerDamage { id: id.to_string(), accumulated_damage: player.accumulated_damage });
                        role::on_damage(&mut self.roster, id, delivered, now, &mut self.timers);
                    }
                }
            }
        }

        let lethal = idle_killed || self.roster.get(id).map(|p| p.is_lethal()).unwrap_or(false);
        if lethal {
            let vetoed = role::veto_death(&mut self.roster, id, now);
            if !vetoed {
                if let Some(player) = self.roster.get_mut(id) {
                    player.die();
                }
                self.handle_player_death(id, now);
            }
        }
    }

    /// Role-hook fan-out for a death (`on_self_death`/`on_other_death`) is
    /// the mode's responsibility, not the engine's — `RoleBasedMode` is the
    /// only mode that assigns roles, and it already calls both from its
    /// own `on_player_death` with the mode-tracked prior-death timestamp
    /// Vulture's window check needs. Calling them again here would
    /// double-award every role bonus in that mode.
    fn handle_player_death(&mut self, id: &str, _now: Millis) {
        if let Some(mut game_mode) = self.mode.take() {
            {
                let mut ctx = self.mode_ctx();
                game_mode.on_player_death(id, &mut ctx);
            }
            self.mode = Some(game_mode);
        }
    }

    fn tick_respawn_and_mode_events(&mut self, now: Millis) {
        let mut rng = std::mem::replace(&mut self.rng, StdRng::seed_from_u64(0));
        let mode_kind = self.mode_kind.unwrap_or(ModeKind::Classic);
        self.game_events.tick(&mut self.roster, now, &mut rng, &mut self.timers, self.sink.as_ref(), mode_kind);
        self.rng = rng;

        let ids: Vec<PlayerId> = self.roster.ids().cloned().collect();
        for id in &ids {
            role::on_tick(&mut self.roster, id, now);
        }
    }

    fn check_win_condition(&mut self, now: Millis) {
        let Some(mut game_mode) = self.mode.take() else { return };
        let win = {
            let mut ctx = self.mode_ctx();
            game_mode.check_win_condition(&mut ctx)
        };
        self.mode = Some(game_mode);

        if win.game_ended {
            self.finish_game(now);
        } else if win.round_ended {
            self.end_round(now);
        }
    }

    fn end_round(&mut self, now: Millis) {
        let Some(mut game_mode) = self.mode.take() else { return };
        let outcome = {
            let mut ctx = self.mode_ctx();
            game_mode.on_round_end(&mut ctx)
        };
        self.mode = Some(game_mode);

        let scores = self.mode.as_ref().expect("mode present").calculate_final_scores(&self.roster);
        let team_scores = self.team_scores_if_enabled();
        self.sink.publish(EngineEvent::RoundEnd { scores, team_scores });

        if outcome.game_ended {
            self.finish_game(now);
        } else {
            self.state = MatchState::RoundEnded;
            self.ready_gate.start_delay(now, self.ready_delay_ms, self.sink.as_ref());
        }
    }

    fn finish_game(&mut self, _now: Millis) {
        let scores = self.mode.as_ref().map(|m| m.calculate_final_scores(&self.roster)).unwrap_or_default();
        let team_scores = self.team_scores_if_enabled();
        self.sink.publish(EngineEvent::GameFinished { scores, team_scores });
        self.state = MatchState::Finished;
    }

    fn team_scores_if_enabled(&self) -> Option<Vec<TeamScoreEntry>> {
        if !self.teams.enabled() {
            return None;
        }
        Some(
            self.teams
                .sorted_summaries()
                .into_iter()
                .map(|s| TeamScoreEntry { team_id: s.id, match_points: s.match_points })
                .collect(),
        )
    }

    fn tick_round_ended(&mut self, now: Millis) {
        if self.ready_gate.enabled() && self.ready_gate.all_ready(&self.roster) {
            self.begin_countdown();
            let _ = now;
        }
    }

    // -- Player input (motion + debug) -----------------------------------

    pub fn apply_motion(&mut self, id: &str, sample: MotionSample) {
        if let Some(player) = self.roster.get_mut(id) {
            player.push_motion(sample);
        }
    }

    /// §6 `/api/debug/player/:id/kill`.
    pub fn debug_kill(&mut self, id: &str) -> bool {
        let Some(player) = self.roster.get_mut(id) else { return false };
        if !player.is_alive {
            return false;
        }
        player.accumulated_damage = player.death_threshold;
        player.die();
        let now = self.clock.now();
        self.handle_player_death(id, now);
        true
    }

    pub fn use_ability(&mut self, id: &str) -> role::AbilityResult {
        let now = self.clock.now();
        role::use_ability(&mut self.roster, id, now)
    }

    /// §4.11 base tap: a team's device taps a base, cycling its
    /// ownership. Publishes `BaseCaptured` only when the tap actually
    /// changes the owner and the match is active — a pre-game or
    /// post-round tap still updates ownership (§4.11) but is not a
    /// scoreable capture.
    pub fn tap_base(&mut self, base_id: &str, tapping_team: crate::team::TeamId) -> bool {
        let now = self.clock.now();
        let changed = self.bases.tap(base_id, tapping_team, now);
        if changed && self.state == MatchState::Active {
            self.sink.publish(EngineEvent::BaseCaptured { base_id: base_id.to_string(), team_id: tapping_team });
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordingSink;

    fn engine_with_two_players(mode_kind: ModeKind) -> GameEngine {
        let mut engine = GameEngine::new(Box::new(RecordingSink::new()));
        engine.set_test_mode(true);
        engine.register_player("p1", "s1".into(), "P1".into(), false);
        engine.register_player("p2", "s2".into(), "P2".into(), false);
        engine
            .launch(mode_kind, LaunchOptions { countdown_duration_ms: Some(0), round_count: Some(1), ..Default::default() })
            .expect("launch should succeed with 2 players");
        engine
    }

    #[test]
    fn launch_rejects_fewer_than_two_players() {
        let mut engine = GameEngine::new(Box::new(RecordingSink::new()));
        engine.register_player("p1", "s1".into(), "P1".into(), false);
        assert_eq!(engine.launch(ModeKind::Classic, LaunchOptions::default()), Err(EngineError::NotEnoughPlayers));
    }

    #[test]
    fn tap_base_reports_ownership_change_and_publishes_only_while_active() {
        let mut engine = engine_with_two_players(ModeKind::Domination);
        engine.bases_mut().register("b1".to_string(), "sock1".to_string());

        assert!(engine.tap_base("b1", 0));
        assert!(!engine.tap_base("b1", 0));
        assert!(engine.tap_base("b1", 1));
        assert_eq!(engine.bases().get("b1").unwrap().owner_team, Some(1));
    }

    #[test]
    fn configure_teams_rejects_out_of_range_count_but_allows_disabled() {
        let mut engine = GameEngine::new(Box::new(RecordingSink::new()));
        assert_eq!(engine.configure_teams(true, 1), Err(EngineError::InvalidTeamCount));
        assert_eq!(engine.configure_teams(true, 5), Err(EngineError::InvalidTeamCount));
        assert!(engine.configure_teams(true, 3).is_ok());
        assert_eq!(engine.teams_mut().count(), 3);
        assert!(engine.configure_teams(false, 1).is_ok());
    }

    #[test]
    fn launch_in_test_mode_goes_straight_to_active() {
        let engine = engine_with_two_players(ModeKind::Classic);
        assert_eq!(engine.state(), MatchState::Active);
        assert_eq!(engine.current_round(), 1);
    }

    #[test]
    fn classic_scenario_one_round_kill_finishes_match() {
        // §8 scenario 1.
        let mut engine = engine_with_two_players(ModeKind::Classic);
        engine.debug_kill("p2");
        engine.tick();

        assert_eq!(engine.state(), MatchState::Finished);
        assert_eq!(engine.roster().get("p1").unwrap().total_points, 5);
        assert_eq!(engine.roster().get("p2").unwrap().total_points, 3);
    }

    #[test]
    fn domination_players_never_die_from_motion() {
        let mut engine = engine_with_two_players(ModeKind::Domination);
        engine.apply_motion("p1", MotionSample { intensity: 100.0 });
        engine.tick();

        assert!(engine.roster().get("p1").unwrap().is_alive);
        assert_eq!(engine.roster().get("p1").unwrap().accumulated_damage, 0.0);
    }

    #[test]
    fn stop_is_idempotent_and_returns_to_waiting() {
        let mut engine = engine_with_two_players(ModeKind::Classic);
        engine.stop();
        assert_eq!(engine.state(), MatchState::Waiting);
        engine.stop();
        assert_eq!(engine.state(), MatchState::Waiting);
    }

    #[test]
    fn death_count_respawn_scenario() {
        // §8 scenario 2: roundDuration=30_000, kill p1 at t=0; alive again
        // with accumulatedDamage reset by t=5_100.
        let mut engine = GameEngine::new(Box::new(RecordingSink::new()));
        engine.set_test_mode(true);
        engine.register_player("p1", "s1".into(), "P1".into(), false);
        engine.register_player("p2", "s2".into(), "P2".into(), false);
        engine
            .launch(
                ModeKind::DeathCount,
                LaunchOptions {
                    countdown_duration_ms: Some(0),
                    round_duration_ms: Some(30_000),
                    respawn_delay_ms: Some(5_000),
                    round_count: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();

        engine.debug_kill("p1");
        assert!(!engine.roster().get("p1").unwrap().is_alive);

        engine.fast_forward(4_800);
        engine.tick();
        assert!(!engine.roster().get("p1").unwrap().is_alive);

        engine.fast_forward(100);
        engine.tick();
        assert!(engine.roster().get("p1").unwrap().is_alive);
        assert_eq!(engine.roster().get("p1").unwrap().accumulated_damage, 0.0);
        assert_eq!(engine.roster().get("p1").unwrap().death_count, 1);
    }
}
