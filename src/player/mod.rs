//! Player model + damage/toughness pipeline (§3, §4.3).

pub mod effect;
pub mod motion;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clock::Millis;
use crate::config::MovementConfig;
use crate::role::Role;
use crate::team::TeamId;

pub use effect::{DamageOutcome, EffectKind, EffectStack, StatusEffect};
pub use motion::{MotionHistory, MotionSample};

pub type PlayerId = String;

/// A full player entity as broadcast to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub socket_id: Option<String>,
    pub name: String,
    pub number: u32,
    pub is_bot: bool,

    /// Currently has a live socket (distinct from "known to the roster" —
    /// a lobby-disconnected player stays in the roster with `connected =
    /// false` during its grace period).
    pub connected: bool,

    pub is_alive: bool,
    pub accumulated_damage: f32,
    pub death_threshold: f32,
    pub points: u32,
    pub total_points: u32,
    pub death_count: u32,
    pub toughness: f32,

    /// Per-player override of the global movement config; defaults to a
    /// copy of the global config at spawn time (§3).
    pub movement_config: MovementConfig,

    #[serde(skip)]
    pub motion_history: MotionHistory,

    pub role: Option<Role>,

    pub status_effects: EffectStack,

    pub ready: bool,
    pub team: Option<TeamId>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, number: u32, is_bot: bool, config: &crate::config::Config) -> Self {
        Self {
            id,
            socket_id: None,
            name,
            number,
            is_bot,
            connected: true,
            is_alive: true,
            accumulated_damage: 0.0,
            death_threshold: config.default_death_threshold,
            points: 0,
            total_points: 0,
            death_count: 0,
            toughness: config.default_toughness,
            movement_config: config.movement(),
            motion_history: MotionHistory::new(config.motion_history_len),
            role: None,
            status_effects: EffectStack::new(),
            ready: false,
            team: None,
        }
    }

    /// Effective toughness after status-effect modifiers and role base
    /// toughness (role multipliers are applied when the role is assigned;
    /// see `role::apply_role_base_stats`).
    pub fn effective_toughness(&self) -> f32 {
        self.status_effects.modify_toughness(self.toughness).max(0.01)
    }

    /// Effective danger threshold, honoring per-role multipliers (Ninja)
    /// applied at role-assignment time into `movement_config`.
    pub fn effective_threshold(&self) -> f32 {
        self.movement_config.danger_threshold
    }

    pub fn push_motion(&mut self, sample: MotionSample) {
        self.motion_history.push(sample);
    }

    /// §4.3 `TakeDamage`: runs the status-effect stack, then accumulates
    /// whatever lands onto `accumulated_damage`. Never negative, never
    /// applied to a dead player.
    pub fn take_damage(&mut self, raw_amount: f32) -> f32 {
        if !self.is_alive || raw_amount <= 0.0 {
            return 0.0;
        }
        let outcome = self.status_effects.modify_incoming_damage(raw_amount);
        self.accumulated_damage += outcome.amount;
        outcome.amount
    }

    pub fn is_lethal(&self) -> bool {
        self.is_alive && self.accumulated_damage >= self.death_threshold
    }

    /// §4.3 `Die`: one-shot per death; caller is responsible for firing
    /// `PlayerDied` exactly once per call (the engine only calls this once
    /// liveness is confirmed false-bound).
    pub fn die(&mut self) {
        self.is_alive = false;
        self.death_count += 1;
    }

    /// §4.3 `Respawn`.
    pub fn respawn(&mut self) {
        self.accumulated_damage = 0.0;
        self.is_alive = true;
    }

    /// Round-Setup Manager per-round reset (§4.8): alive, zero damage,
    /// zero round points, clear status effects.
    pub fn reset_for_round(&mut self) {
        self.is_alive = true;
        self.accumulated_damage = 0.0;
        self.points = 0;
        self.status_effects.clear();
    }

    pub fn award_points(&mut self, amount: u32) {
        self.points += amount;
        self.total_points += amount;
    }

    pub fn hp_fraction(&self) -> f32 {
        if self.death_threshold <= 0.0 {
            return 0.0;
        }
        (1.0 - self.accumulated_damage / self.death_threshold).clamp(0.0, 1.0)
    }
}

/// Thin wrapper around the player map shared by the engine, modes, and
/// role hooks. Grounded on the teacher's `EntityManager`/`EntityView`
/// split (`entity/manager.rs`, `entity/snapshot.rs`) — a single owned map
/// plus convenience accessors, rather than scattering `HashMap` lookups
/// across every caller.
#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<PlayerId, Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id.clone(), player);
    }

    pub fn remove(&mut self, id: &str) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.keys()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.is_alive)
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive).count()
    }

    pub fn dead_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_alive).count()
    }

    pub fn connected(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.connected)
    }

    pub fn all_connected_ready(&self) -> bool {
        self.connected().all(|p| p.ready)
    }

    /// Ids of every *other* connected, live player — the eligible pool for
    /// targeted roles (Executioner/Bodyguard) and "any other death" checks
    /// (Vulture, BeastHunter, `onOtherDeath`).
    pub fn other_ids_excluding(&self, exclude: &str) -> Vec<PlayerId> {
        self.players
            .keys()
            .filter(|id| id.as_str() != exclude)
            .cloned()
            .collect()
    }

    /// Run a mutation against two distinct players at once without
    /// fighting the borrow checker — used by Sibling damage mirroring and
    /// targeted-role bookkeeping. Panics if `a == b`.
    pub fn with_two_mut<F>(&mut self, a: &str, b: &str, f: F)
    where
        F: FnOnce(&mut Player, &mut Player),
    {
        assert_ne!(a, b, "with_two_mut requires distinct player ids");
        // SAFETY-free approach: temporarily remove one, mutate both, reinsert.
        if let Some(mut player_b) = self.players.remove(b) {
            if let Some(player_a) = self.players.get_mut(a) {
                f(player_a, &mut player_b);
            }
            self.players.insert(b.to_string(), player_b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_player(id: &str, number: u32) -> Player {
        Player::new(id.to_string(), format!("Player {number}"), number, false, &Config::default())
    }

    #[test]
    fn take_damage_accumulates_and_never_goes_negative() {
        let mut player = make_player("p1", 1);
        assert_eq!(player.take_damage(-10.0), 0.0);
        assert_eq!(player.accumulated_damage, 0.0);

        let delivered = player.take_damage(30.0);
        assert_eq!(delivered, 30.0);
        assert_eq!(player.accumulated_damage, 30.0);
    }

    #[test]
    fn dead_players_take_no_further_damage() {
        let mut player = make_player("p1", 1);
        player.die();
        assert_eq!(player.take_damage(50.0), 0.0);
    }

    #[test]
    fn lethal_threshold_and_die_increments_death_count() {
        let mut player = make_player("p1", 1);
        player.take_damage(100.0);
        assert!(player.is_lethal());
        player.die();
        assert!(!player.is_alive);
        assert_eq!(player.death_count, 1);
    }

    #[test]
    fn respawn_restores_liveness_and_clears_damage() {
        let mut player = make_player("p1", 1);
        player.take_damage(100.0);
        player.die();
        player.respawn();
        assert!(player.is_alive);
        assert_eq!(player.accumulated_damage, 0.0);
        // Respawn is not a death: death_count stays at the prior value.
        assert_eq!(player.death_count, 1);
    }

    #[test]
    fn reset_for_round_clears_round_points_and_effects_but_not_total() {
        let mut player = make_player("p1", 1);
        player.award_points(5);
        player.status_effects.apply(EffectKind::Toughened, 0, None, 1.5);
        player.accumulated_damage = 40.0;

        player.reset_for_round();

        assert_eq!(player.points, 0);
        assert_eq!(player.total_points, 5);
        assert_eq!(player.accumulated_damage, 0.0);
        assert!(!player.status_effects.has(EffectKind::Toughened));
    }

    #[test]
    fn roster_with_two_mut_allows_cross_player_mutation() {
        let mut roster = Roster::new();
        roster.insert(make_player("p1", 1));
        roster.insert(make_player("p2", 2));

        roster.with_two_mut("p1", "p2", |a, b| {
            a.take_damage(10.0);
            let mirrored = a.accumulated_damage;
            b.take_damage(mirrored);
        });

        assert_eq!(roster.get("p1").unwrap().accumulated_damage, 10.0);
        assert_eq!(roster.get("p2").unwrap().accumulated_damage, 10.0);
    }

    #[test]
    fn all_connected_ready_ignores_disconnected_players() {
        let mut roster = Roster::new();
        let mut p1 = make_player("p1", 1);
        p1.ready = true;
        roster.insert(p1);

        let mut p2 = make_player("p2", 2);
        p2.connected = false;
        p2.ready = false;
        roster.insert(p2);

        assert!(roster.all_connected_ready());
    }
}
