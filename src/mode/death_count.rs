//! Death-Count mode (§4.6): respawn-on-death within a fixed-duration
//! round instead of elimination; placement ranks fewest deaths first.

use crate::clock::Millis;
use crate::event::{EngineEvent, ScoreEntry};
use crate::gameevent::GameEventKind;
use crate::player::{PlayerId, Roster};
use crate::respawn;

use super::{placement_bonus_for_groups, GameMode, ModeCtx, ModeKind, RoundEndOutcome, WinCheck, DEFAULT_PLACEMENT_TABLE};

const DEFAULT_COUNTDOWN_MS: Millis = 3_000;

#[derive(Debug, Clone, Copy)]
pub struct DeathCountOptions {
    pub round_duration_ms: Millis,
    pub respawn_delay_ms: Millis,
    pub round_count: Option<u32>,
    pub target_score: Option<u32>,
    pub countdown_ms: Millis,
}

impl Default for DeathCountOptions {
    fn default() -> Self {
        Self {
            round_duration_ms: 120_000,
            respawn_delay_ms: 3_000,
            round_count: Some(3),
            target_score: None,
            countdown_ms: DEFAULT_COUNTDOWN_MS,
        }
    }
}

#[derive(Debug)]
pub struct DeathCountMode {
    options: DeathCountOptions,
    rounds_played: u32,
}

impl DeathCountMode {
    pub fn new(options: DeathCountOptions) -> Self {
        Self { options, rounds_played: 0 }
    }
}

impl GameMode for DeathCountMode {
    fn kind(&self) -> ModeKind {
        ModeKind::DeathCount
    }

    fn on_mode_selected(&mut self, ctx: &mut ModeCtx) {
        ctx.config.push_movement(ctx.config.movement());
    }

    fn on_game_start(&mut self, _ctx: &mut ModeCtx) {
        self.rounds_played = 0;
    }

    fn on_round_start(&mut self, _ctx: &mut ModeCtx) {}

    fn on_tick(&mut self, _ctx: &mut ModeCtx, _dt: Millis) {}

    fn on_player_death(&mut self, victim_id: &str, ctx: &mut ModeCtx) {
        ctx.sink.publish(EngineEvent::PlayerDied { id: victim_id.to_string() });
        respawn::schedule_respawn(
            ctx.timers,
            ctx.sink,
            &victim_id.to_string(),
            ctx.now,
            self.options.respawn_delay_ms,
            ctx.round_started_at,
            Some(self.options.round_duration_ms),
        );
    }

    fn on_round_end(&mut self, ctx: &mut ModeCtx) -> RoundEndOutcome {
        let groups = if ctx.teams.enabled() {
            team_ranking_groups(ctx)
        } else {
            player_ranking_groups(ctx.roster)
        };
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
        let elapsed = ctx.now.saturating_sub(ctx.round_started_at);
        WinCheck { round_ended: elapsed >= self.options.round_duration_ms, game_ended: false }
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

    fn respawn_delay_ms(&self) -> Option<Millis> {
        Some(self.options.respawn_delay_ms)
    }

    fn round_duration_ms(&self) -> Option<Millis> {
        Some(self.options.round_duration_ms)
    }

    fn countdown_duration_ms(&self) -> Millis {
        self.options.countdown_ms
    }
}

/// Ranks individual players fewest-deaths-first; ties share a group.
fn player_ranking_groups(roster: &Roster) -> Vec<Vec<PlayerId>> {
    let mut by_deaths: std::collections::BTreeMap<u32, Vec<PlayerId>> = std::collections::BTreeMap::new();
    for player in roster.iter() {
        by_deaths.entry(player.death_count).or_default().push(player.id.clone());
    }
    by_deaths.into_values().collect()
}

/// Team variant: ranks teams by their players' summed death count,
/// fewest first, with every player on a tied team sharing that group.
fn team_ranking_groups(ctx: &ModeCtx) -> Vec<Vec<PlayerId>> {
    let mut team_deaths: std::collections::HashMap<u8, u32> = std::collections::HashMap::new();
    let mut team_members: std::collections::HashMap<u8, Vec<PlayerId>> = std::collections::HashMap::new();
    for player in ctx.roster.iter() {
        let Some(team_id) = ctx.teams.team_of(&player.id) else { continue };
        *team_deaths.entry(team_id).or_insert(0) += player.death_count;
        team_members.entry(team_id).or_default().push(player.id.clone());
    }

    let mut by_deaths: std::collections::BTreeMap<u32, Vec<PlayerId>> = std::collections::BTreeMap::new();
    for (team_id, deaths) in team_deaths {
        if let Some(members) = team_members.remove(&team_id) {
            by_deaths.entry(deaths).or_default().extend(members);
        }
    }
    by_deaths.into_values().collect()
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
    fn fewer_deaths_rank_ahead_with_placement_bonus() {
        let (mut roster, mut config, mut teams, mut bases, mut game_events, mut timers, sink) = ctx_pieces();
        let mut p1 = Player::new("p1".into(), "P1".into(), 1, false, &config);
        p1.death_count = 1;
        roster.insert(p1);
        let mut p2 = Player::new("p2".into(), "P2".into(), 2, false, &config);
        p2.death_count = 3;
        roster.insert(p2);

        let mut mode = DeathCountMode::new(DeathCountOptions { round_count: Some(1), ..DeathCountOptions::default() });
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
        let outcome = mode.on_round_end(&mut ctx);
        assert!(outcome.game_ended);
        assert_eq!(ctx.roster.get("p1").unwrap().total_points, 5);
        assert_eq!(ctx.roster.get("p2").unwrap().total_points, 3);
    }

    #[test]
    fn respawn_is_suppressed_past_round_cutoff() {
        let (mut roster, mut config, mut teams, mut bases, mut game_events, mut timers, sink) = ctx_pieces();
        roster.insert(Player::new("p1".into(), "P1".into(), 1, false, &config));

        let mut mode = DeathCountMode::new(DeathCountOptions {
            round_duration_ms: 10_000,
            respawn_delay_ms: 5_000,
            ..DeathCountOptions::default()
        });
        let mut ctx = ModeCtx {
            roster: &mut roster,
            config: &mut config,
            teams: &mut teams,
            bases: &mut bases,
            game_events: &mut game_events,
            timers: &mut timers,
            sink: &sink,
            now: 6_000,
            round_started_at: 0,
        };
        mode.on_player_death("p1", &mut ctx);
        assert!(ctx.timers.is_empty());
    }
}
