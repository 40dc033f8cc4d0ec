//! Role-Based mode (§4.6): Classic's elimination structure plus an
//! assigned role pool and per-role placement-bonus overrides.

use crate::clock::Millis;
use crate::event::{EngineEvent, ScoreEntry};
use crate::gameevent::GameEventKind;
use crate::player::{PlayerId, Roster};
use crate::role::{self, Role, RoleKind};

use super::{placement_bonus_for_groups, GameMode, ModeCtx, ModeKind, RoundEndOutcome, WinCheck, DEFAULT_PLACEMENT_TABLE};

/// Long enough to let a voice cue announcing roles finish (§4.6).
const DEFAULT_COUNTDOWN_MS: Millis = 6_000;

const ROLE_CYCLE: [RoleKind; 14] = [
    RoleKind::Vampire,
    RoleKind::Beast,
    RoleKind::BeastHunter,
    RoleKind::Angel,
    RoleKind::Survivor,
    RoleKind::Executioner,
    RoleKind::Bodyguard,
    RoleKind::Berserker,
    RoleKind::Ninja,
    RoleKind::Masochist,
    RoleKind::Sibling,
    RoleKind::Vulture,
    RoleKind::Troll,
    RoleKind::Ironclad,
];

#[derive(Debug, Clone, Copy)]
pub struct RoleBasedOptions {
    pub round_count: Option<u32>,
    pub target_score: Option<u32>,
    pub countdown_ms: Millis,
}

impl Default for RoleBasedOptions {
    fn default() -> Self {
        Self { round_count: Some(3), target_score: None, countdown_ms: DEFAULT_COUNTDOWN_MS }
    }
}

#[derive(Debug)]
pub struct RoleBasedMode {
    options: RoleBasedOptions,
    elimination_order: Vec<PlayerId>,
    rounds_played: u32,
    last_death_at: Option<Millis>,
}

impl RoleBasedMode {
    pub fn new(options: RoleBasedOptions) -> Self {
        Self { options, elimination_order: Vec::new(), rounds_played: 0, last_death_at: None }
    }
}

impl GameMode for RoleBasedMode {
    fn kind(&self) -> ModeKind {
        ModeKind::RoleBased
    }

    fn on_mode_selected(&mut self, ctx: &mut ModeCtx) {
        ctx.config.push_movement(ctx.config.movement());
    }

    fn on_game_start(&mut self, _ctx: &mut ModeCtx) {
        self.rounds_played = 0;
    }

    fn on_round_start(&mut self, ctx: &mut ModeCtx) {
        self.elimination_order.clear();
        self.last_death_at = None;

        let pool = self.role_pool(ctx.roster.len());
        let mut ids: Vec<PlayerId> = ctx.roster.ids().cloned().collect();
        ids.sort();
        for (id, kind) in ids.iter().zip(pool.into_iter()) {
            if let Some(player) = ctx.roster.get_mut(id) {
                role::assign_role(player, kind, ctx.config);
            }
        }

        role::on_round_start(ctx.roster, ctx.now);
    }

    fn on_tick(&mut self, ctx: &mut ModeCtx, _dt: Millis) {
        let ids: Vec<PlayerId> = ctx.roster.ids().cloned().collect();
        for id in &ids {
            role::on_tick(ctx.roster, id, ctx.now);
        }
    }

    fn on_player_death(&mut self, victim_id: &str, ctx: &mut ModeCtx) {
        self.elimination_order.push(victim_id.to_string());
        ctx.sink.publish(EngineEvent::PlayerDied { id: victim_id.to_string() });
        role::on_self_death(ctx.roster, victim_id, ctx.timers);
        role::on_other_death(ctx.roster, victim_id, ctx.now, self.last_death_at);
        self.last_death_at = Some(ctx.now);
    }

    fn on_round_end(&mut self, ctx: &mut ModeCtx) -> RoundEndOutcome {
        let groups = ranking_groups(ctx.roster, &self.elimination_order);
        let bonuses = placement_bonus_for_groups(&groups, &DEFAULT_PLACEMENT_TABLE);
        for (id, bonus) in &bonuses {
            if let Some(player) = ctx.roster.get_mut(id) {
                player.award_points(*bonus);
            }
        }
        award_bodyguard_protection_bonus(ctx.roster, &groups);
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

    fn role_pool(&self, player_count: usize) -> Vec<RoleKind> {
        ROLE_CYCLE.iter().copied().cycle().take(player_count).collect()
    }

    fn game_event_kinds(&self) -> Vec<GameEventKind> {
        vec![GameEventKind::SpeedShift]
    }

    fn countdown_duration_ms(&self) -> Millis {
        self.options.countdown_ms
    }
}

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

/// Bodyguard's protection bonus: if their target survived into the top
/// 3 ranking groups, award the bonus (§4.5).
fn award_bodyguard_protection_bonus(roster: &mut Roster, groups: &[Vec<PlayerId>]) {
    let top_three: std::collections::HashSet<PlayerId> = groups.iter().take(3).flatten().cloned().collect();

    let bodyguards: Vec<(PlayerId, Option<PlayerId>)> = roster
        .iter()
        .filter_map(|p| match &p.role {
            Some(Role::Bodyguard { target }) => Some((p.id.clone(), target.clone())),
            _ => None,
        })
        .collect();

    for (owner_id, target) in bodyguards {
        let Some(target_id) = target else { continue };
        if top_three.contains(&target_id) {
            if let Some(owner) = roster.get_mut(&owner_id) {
                owner.award_points(role::bodyguard_protection_bonus());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::player::Player;

    #[test]
    fn role_pool_cycles_through_the_full_catalog() {
        let mode = RoleBasedMode::new(RoleBasedOptions::default());
        let pool = mode.role_pool(16);
        assert_eq!(pool.len(), 16);
        assert_eq!(pool[0], RoleKind::Vampire);
        assert_eq!(pool[14], RoleKind::Vampire);
    }

    #[test]
    fn bodyguard_protection_bonus_awarded_when_target_in_top_three() {
        let config = Config::default();
        let mut roster = Roster::new();
        let mut bodyguard = Player::new("bg".into(), "BG".into(), 1, false, &config);
        bodyguard.role = Some(Role::Bodyguard { target: Some("survivor".to_string()) });
        roster.insert(bodyguard);
        roster.insert(Player::new("survivor".into(), "S".into(), 2, false, &config));

        let groups = vec![vec!["survivor".to_string()]];
        award_bodyguard_protection_bonus(&mut roster, &groups);
        assert_eq!(roster.get("bg").unwrap().points, role::bodyguard_protection_bonus());
    }
}
