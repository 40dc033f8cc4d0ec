//! Classic mode (§4.6): last-standing elimination with fixed round count
//! or first-to-target-score.

use crate::clock::Millis;
use crate::event::{EngineEvent, ScoreEntry};
use crate::gameevent::GameEventKind;
use crate::player::{PlayerId, Roster};

use super::{placement_bonus_for_groups, GameMode, ModeCtx, ModeKind, RoundEndOutcome, WinCheck, DEFAULT_PLACEMENT_TABLE};

const DEFAULT_COUNTDOWN_MS: Millis = 3_000;

#[derive(Debug, Clone, Copy)]
pub struct ClassicOptions {
    pub round_count: Option<u32>,
    pub target_score: Option<u32>,
    pub countdown_ms: Millis,
}

impl Default for ClassicOptions {
    fn default() -> Self {
        Self { round_count: Some(3), target_score: None, countdown_ms: DEFAULT_COUNTDOWN_MS }
    }
}

#[derive(Debug)]
pub struct ClassicMode {
    options: ClassicOptions,
    elimination_order: Vec<PlayerId>,
    rounds_played: u32,
}

impl ClassicMode {
    pub fn new(options: ClassicOptions) -> Self {
        Self { options, elimination_order: Vec::new(), rounds_played: 0 }
    }
}

impl GameMode for ClassicMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Classic
    }

    fn on_mode_selected(&mut self, ctx: &mut ModeCtx) {
        ctx.config.push_movement(ctx.config.movement());
    }

    fn on_game_start(&mut self, _ctx: &mut ModeCtx) {
        self.rounds_played = 0;
    }

    fn on_round_start(&mut self, _ctx: &mut ModeCtx) {
        self.elimination_order.clear();
    }

    fn on_tick(&mut self, _ctx: &mut ModeCtx, _dt: Millis) {}

    fn on_player_death(&mut self, victim_id: &str, ctx: &mut ModeCtx) {
        self.elimination_order.push(victim_id.to_string());
        ctx.sink.publish(EngineEvent::PlayerDied { id: victim_id.to_string() });
    }

    fn on_round_end(&mut self, ctx: &mut ModeCtx) -> RoundEndOutcome {
        let groups = ranking_groups(ctx.roster, &self.elimination_order);
        let bonuses = placement_bonus_for_groups(&groups, &DEFAULT_PLACEMENT_TABLE);
        for (id, bonus) in &bonuses {
            if let Some(player) = ctx.roster.get_mut(id) {
                player.award_points(*bonus);
            }
        }
        self.rounds_played += 1;

        let game_ended = match (self.options.round_count, self.options.target_score) {
            (Some(round_count), _) => self.rounds_played >= round_count,
            (None, Some(target)) => ctx.roster.iter().any(|p| p.total_points >= target),
            (None, None) => true,
        };
        RoundEndOutcome { game_ended }
    }

    fn on_game_end(&mut self, ctx: &mut ModeCtx) {
        ctx.config.pop_movement();
    }

    fn check_win_condition(&mut self, ctx: &mut ModeCtx) -> WinCheck {
        let alive = ctx.roster.alive_count();
        WinCheck { round_ended: alive <= 1, game_ended: false }
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
        vec![GameEventKind::SpeedShift]
    }

    fn countdown_duration_ms(&self) -> Millis {
        self.options.countdown_ms
    }
}

/// Survivors (rank 0, if any) followed by eliminated players in reverse
/// elimination order (last eliminated ranks just below the survivor).
fn ranking_groups(roster: &Roster, elimination_order: &[PlayerId]) -> Vec<Vec<PlayerId>> {
    let mut groups = Vec::new();
    let survivors: Vec<PlayerId> = roster.alive().map(|p| p.id.clone()).collect();
    if !survivors.is_empty() {
        groups.push(survivors);
    }
    for id in elimination_order.iter().rev() {
        groups.push(vec![id.clone()]);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::BaseManager;
    use crate::config::Config;
    use crate::event::RecordingSink;
    use crate::gameevent::GameEventManager;
    use crate::player::Player;
    use crate::team::TeamManager;
    use crate::timer::TimerQueue;

    fn ctx_pieces() -> (Roster, Config, TeamManager, BaseManager, GameEventManager, TimerQueue, RecordingSink) {
        (Roster::new(), Config::default(), TeamManager::new(), BaseManager::new(), GameEventManager::new(), TimerQueue::new(), RecordingSink::new())
    }

    #[test]
    fn two_player_one_round_matches_end_to_end_scenario() {
        // §8 scenario 1: Classic 2-player, one round, kill p2 -> p1=5, p2=3.
        let (mut roster, mut config, mut teams, mut bases, mut game_events, mut timers, sink) = ctx_pieces();
        roster.insert(Player::new("p1".into(), "P1".into(), 1, false, &config));
        roster.insert(Player::new("p2".into(), "P2".into(), 2, false, &config));

        let mut mode = ClassicMode::new(ClassicOptions { round_count: Some(1), target_score: None, countdown_ms: 0 });
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
        mode.on_round_start(&mut ctx);
        ctx.roster.get_mut("p2").unwrap().die();
        mode.on_player_death("p2", &mut ctx);

        let outcome = mode.on_round_end(&mut ctx);
        assert!(outcome.game_ended);
        assert_eq!(ctx.roster.get("p1").unwrap().total_points, 5);
        assert_eq!(ctx.roster.get("p2").unwrap().total_points, 3);
    }
}
