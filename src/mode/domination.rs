//! Domination mode (§4.6): round-less base control. Teams earn match
//! points on an interval for every base they hold; the first team to
//! the point target wins the game outright.

use crate::clock::Millis;
use crate::event::{EngineEvent, ScoreEntry};
use crate::gameevent::GameEventKind;
use crate::player::Roster;

use super::{GameMode, ModeCtx, ModeKind, RoundEndOutcome, WinCheck};

const DEFAULT_COUNTDOWN_MS: Millis = 3_000;

#[derive(Debug, Clone, Copy)]
pub struct DominationOptions {
    pub control_interval_ms: Millis,
    pub point_target: u32,
    pub countdown_ms: Millis,
}

impl Default for DominationOptions {
    fn default() -> Self {
        Self { control_interval_ms: 10_000, point_target: 100, countdown_ms: DEFAULT_COUNTDOWN_MS }
    }
}

#[derive(Debug)]
pub struct DominationMode {
    options: DominationOptions,
    next_score_at: Option<Millis>,
}

impl DominationMode {
    pub fn new(options: DominationOptions) -> Self {
        Self { options, next_score_at: None }
    }
}

impl GameMode for DominationMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Domination
    }

    fn on_mode_selected(&mut self, ctx: &mut ModeCtx) {
        ctx.config.push_movement(ctx.config.movement());
    }

    fn on_game_start(&mut self, ctx: &mut ModeCtx) {
        ctx.teams.reset_match_points();
        self.next_score_at = None;
    }

    fn on_round_start(&mut self, _ctx: &mut ModeCtx) {}

    /// Awards one match point per held, connected base every
    /// `controlIntervalMs` (§4.11). Only ever called while the match is
    /// in its active state — the engine does not drive this hook
    /// otherwise, so there is no separate "is active" guard here.
    fn on_tick(&mut self, ctx: &mut ModeCtx, _dt: Millis) {
        let next_at = *self.next_score_at.get_or_insert(ctx.now + self.options.control_interval_ms);
        if ctx.now < next_at {
            return;
        }
        self.next_score_at = Some(ctx.now + self.options.control_interval_ms);

        let owned: Vec<(String, crate::team::TeamId)> = ctx
            .bases
            .iter()
            .filter(|base| base.connected)
            .filter_map(|base| base.owner_team.map(|team| (base.id.clone(), team)))
            .collect();

        for (base_id, team_id) in owned {
            ctx.teams.award_match_points(team_id, 1);
            ctx.sink.publish(EngineEvent::BasePoint { base_id, team_id });
        }
    }

    /// Unreachable in normal play — the engine skips motion damage and
    /// the Excited idle-kill entirely for Domination (§4.6), since the
    /// mode has no death at all. Only a forced `/api/debug/player/:id/kill`
    /// can reach here, and it has nothing to score or respawn.
    fn on_player_death(&mut self, _victim_id: &str, _ctx: &mut ModeCtx) {}

    fn on_round_end(&mut self, _ctx: &mut ModeCtx) -> RoundEndOutcome {
        RoundEndOutcome { game_ended: false }
    }

    fn on_game_end(&mut self, ctx: &mut ModeCtx) {
        ctx.config.pop_movement();
    }

    /// Domination has no round structure, so `game_ended` here is
    /// authoritative (§4.6) rather than deferred to `on_round_end` the
    /// way the round-based modes do it.
    fn check_win_condition(&mut self, ctx: &mut ModeCtx) -> WinCheck {
        let winner = (0..ctx.teams.count()).find(|&team_id| ctx.teams.match_points(team_id) >= self.options.point_target);
        if let Some(winning_team_id) = winner {
            ctx.sink.publish(EngineEvent::DominationWin { winning_team_id });
        }
        WinCheck { round_ended: false, game_ended: winner.is_some() }
    }

    fn calculate_final_scores(&self, roster: &Roster) -> Vec<ScoreEntry> {
        let mut scores: Vec<ScoreEntry> = roster
            .iter()
            .map(|p| ScoreEntry { player_id: p.id.clone(), points: p.points, total_points: p.total_points })
            .collect();
        scores.sort_by(|a, b| b.total_points.cmp(&a.total_points));
        scores
    }

    fn game_event_kinds(&self) -> Vec<GameEventKind> {
        Vec::new()
    }

    fn countdown_duration_ms(&self) -> Millis {
        self.options.countdown_ms
    }

    fn has_rounds(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseManager;
    use crate::config::Config;
    use crate::event::RecordingSink;
    use crate::gameevent::GameEventManager;
    use crate::player::Roster;
    use crate::team::TeamManager;
    use crate::timer::TimerQueue;

    fn ctx_pieces() -> (Roster, Config, TeamManager, BaseManager, GameEventManager, TimerQueue, RecordingSink) {
        (Roster::new(), Config::default(), TeamManager::new(), BaseManager::new(), GameEventManager::new(), TimerQueue::new(), RecordingSink::new())
    }

    #[test]
    fn held_base_awards_a_match_point_per_interval() {
        let (mut roster, mut config, mut teams, mut bases, mut game_events, mut timers, sink) = ctx_pieces();
        teams.configure(true, 2);
        bases.register("b1".to_string(), "sock1".to_string());
        bases.tap("b1", 0, 0);

        let mut mode = DominationMode::new(DominationOptions { control_interval_ms: 10_000, ..DominationOptions::default() });
        let mut ctx = ModeCtx {
            roster: &mut roster,
            config: &mut config,
            teams: &mut teams,
            bases: &mut bases,
            game_events: &mut game_events,
            timers: &mut timers,
            sink: &sink,
            now: 0,
            round_started_at: 0,
        };
        mode.on_tick(&mut ctx, 0);
        assert_eq!(ctx.teams.match_points(0), 0);

        ctx.now = 10_000;
        mode.on_tick(&mut ctx, 0);
        assert_eq!(ctx.teams.match_points(0), 1);
    }

    #[test]
    fn win_condition_fires_once_point_target_reached() {
        let (mut roster, mut config, mut teams, mut bases, mut game_events, mut timers, sink) = ctx_pieces();
        teams.configure(true, 2);
        teams.award_match_points(1, 100);

        let mut mode = DominationMode::new(DominationOptions { point_target: 100, ..DominationOptions::default() });
        let mut ctx = ModeCtx {
            roster: &mut roster,
            config: &mut config,
            teams: &mut teams,
            bases: &mut bases,
            game_events: &mut game_events,
            timers: &mut timers,
            sink: &sink,
            now: 0,
            round_started_at: 0,
        };
        let result = mode.check_win_condition(&mut ctx);
        assert!(result.game_ended);
        assert!(!result.round_ended);
    }

    #[test]
    fn disconnected_base_is_skipped_for_scoring() {
        let (mut roster, mut config, mut teams, mut bases, mut game_events, mut timers, sink) = ctx_pieces();
        teams.configure(true, 2);
        bases.register("b1".to_string(), "sock1".to_string());
        bases.tap("b1", 0, 0);
        bases.mark_disconnected("sock1");

        let mut mode = DominationMode::new(DominationOptions { control_interval_ms: 10_000, ..DominationOptions::default() });
        let mut ctx = ModeCtx {
            roster: &mut roster,
            config: &mut config,
            teams: &mut teams,
            bases: &mut bases,
            game_events: &mut game_events,
            timers: &mut timers,
            sink: &sink,
            now: 10_000,
            round_started_at: 0,
        };
        mode.on_tick(&mut ctx, 0);
        assert_eq!(ctx.teams.match_points(0), 0);
    }
}
