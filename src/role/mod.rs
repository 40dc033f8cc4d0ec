//! Role catalog (§4.5): polymorphic player specializations.
//!
//! Redesign note (§9): the source's deep role inheritance hierarchy becomes
//! a closed sum type — `Role` — where each variant owns its private
//! counters directly (targets, bloodlust arm time, pending heal amount,
//! …). The core (engine/modes) never reaches into a variant's fields; it
//! only calls the free dispatch functions in this module, which is the
//! "shared method table" called for in the design note.

pub mod hooks;

use serde::Serialize;

use crate::clock::Millis;
use crate::config::Config;
use crate::player::{EffectKind, Player, PlayerId, Roster};

pub use hooks::{
    on_berserker_debounce_expired, on_damage, on_other_death, on_round_start, on_self_death,
    on_tick, on_troll_heal_expired, use_ability, veto_death, AbilityResult,
};

/// The closed tag set (§4.5), used wherever only the kind (not private
/// state) is needed — mode role pools, wire payloads, tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoleKind {
    Vampire,
    Beast,
    BeastHunter,
    Angel,
    Survivor,
    Executioner,
    Bodyguard,
    Berserker,
    Ninja,
    Masochist,
    Sibling,
    Vulture,
    Troll,
    Ironclad,
}

/// A role instance: the tag plus whatever private counters that role
/// needs. Roles with no private state (`Beast`, `Ninja`) are unit
/// variants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Role {
    Vampire { bloodlust_active: bool, round_start_at: Millis },
    Beast,
    BeastHunter,
    Angel { absorbed_once: bool },
    Survivor { last_point_at: Millis },
    Executioner { target: Option<PlayerId> },
    Bodyguard { target: Option<PlayerId> },
    Berserker { debounce_timer: Option<u64> },
    Ninja,
    Masochist { last_point_at: Millis },
    Sibling { paired_with: Option<PlayerId> },
    Vulture,
    Troll { pending: f32, heal_timer: Option<u64> },
    Ironclad { charge_used: bool },
}

impl Role {
    pub fn new(kind: RoleKind) -> Self {
        match kind {
            RoleKind::Vampire => Role::Vampire { bloodlust_active: false, round_start_at: 0 },
            RoleKind::Beast => Role::Beast,
            RoleKind::BeastHunter => Role::BeastHunter,
            RoleKind::Angel => Role::Angel { absorbed_once: false },
            RoleKind::Survivor => Role::Survivor { last_point_at: 0 },
            RoleKind::Executioner => Role::Executioner { target: None },
            RoleKind::Bodyguard => Role::Bodyguard { target: None },
            RoleKind::Berserker => Role::Berserker { debounce_timer: None },
            RoleKind::Ninja => Role::Ninja,
            RoleKind::Masochist => Role::Masochist { last_point_at: 0 },
            RoleKind::Sibling => Role::Sibling { paired_with: None },
            RoleKind::Vulture => Role::Vulture,
            RoleKind::Troll => Role::Troll { pending: 0.0, heal_timer: None },
            RoleKind::Ironclad => Role::Ironclad { charge_used: false },
        }
    }

    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Vampire { .. } => RoleKind::Vampire,
            Role::Beast => RoleKind::Beast,
            Role::BeastHunter => RoleKind::BeastHunter,
            Role::Angel { .. } => RoleKind::Angel,
            Role::Survivor { .. } => RoleKind::Survivor,
            Role::Executioner { .. } => RoleKind::Executioner,
            Role::Bodyguard { .. } => RoleKind::Bodyguard,
            Role::Berserker { .. } => RoleKind::Berserker,
            Role::Ninja => RoleKind::Ninja,
            Role::Masochist { .. } => RoleKind::Masochist,
            Role::Sibling { .. } => RoleKind::Sibling,
            Role::Vulture => RoleKind::Vulture,
            Role::Troll { .. } => RoleKind::Troll,
            Role::Ironclad { .. } => RoleKind::Ironclad,
        }
    }
}

/// Assigns a role to a player and applies its one-time base stat
/// modifiers (toughness multiplier, effective threshold multiplier).
/// Called once at role-pool assignment (round/game start); never
/// reapplied mid-round, so repeated calls would double-stack — callers
/// must only call this for a fresh assignment.
pub fn assign_role(player: &mut Player, kind: RoleKind, config: &Config) {
    match kind {
        RoleKind::Beast | RoleKind::Sibling => {
            player.toughness *= 1.5;
        }
        RoleKind::Ninja => {
            player.movement_config.danger_threshold *= config.ninja_threshold_multiplier;
        }
        _ => {}
    }
    player.role = Some(Role::new(kind));
}

/// Pair up every `Sibling` in the roster with another `Sibling` (§4.5:
/// targeted roles must not self-target, and must reroll if their partner
/// leaves). Called at round start and whenever a sibling's partner is
/// lost.
pub fn pair_siblings(roster: &mut Roster) {
    let sibling_ids: Vec<PlayerId> = roster
        .iter()
        .filter(|p| matches!(p.role, Some(Role::Sibling { .. })) && p.is_alive && p.connected)
        .map(|p| p.id.clone())
        .collect();

    for (i, id) in sibling_ids.iter().enumerate() {
        let partner = if i % 2 == 0 {
            sibling_ids.get(i + 1).cloned()
        } else {
            sibling_ids.get(i - 1).cloned()
        };
        if let Some(player) = roster.get_mut(id) {
            if let Some(Role::Sibling { paired_with }) = &mut player.role {
                *paired_with = partner;
            }
        }
    }
}

/// Reassign a fresh non-self target for Executioner/Bodyguard roles,
/// drawn from the live, connected roster excluding `exclude_id` and the
/// role owner themself. Returns the chosen target, if any were eligible.
pub fn reroll_target(roster: &Roster, owner_id: &str, exclude_id: Option<&str>) -> Option<PlayerId> {
    roster
        .iter()
        .filter(|p| p.is_alive && p.connected && p.id != owner_id)
        .filter(|p| exclude_id != Some(p.id.as_str()))
        .map(|p| p.id.clone())
        .next()
}

/// The `EffectKind::Invulnerability` duration Angel installs after
/// absorbing a lethal hit.
pub fn angel_invulnerability_window_ms() -> Millis {
    1_500
}

pub fn berserker_debounce_ms() -> Millis {
    300
}

pub fn berserker_toughened_duration_ms() -> Millis {
    5_000
}

pub fn berserker_toughened_magnitude() -> f32 {
    1.5
}

pub fn troll_heal_delay_ms() -> Millis {
    4_000
}

pub fn ironclad_toughened_duration_ms() -> Millis {
    5_000
}

pub fn ironclad_toughened_magnitude() -> f32 {
    2.0
}

pub fn vampire_bloodlust_delay_ms() -> Millis {
    30_000
}

pub fn vampire_bonus_points() -> u32 {
    2
}

pub fn beast_hunter_bonus_points() -> u32 {
    3
}

pub fn executioner_bonus_points() -> u32 {
    3
}

pub fn bodyguard_protection_bonus() -> u32 {
    3
}

pub fn survivor_point_interval_ms() -> Millis {
    30_000
}

pub fn masochist_point_interval_ms() -> Millis {
    15_000
}

pub fn vulture_bonus_points() -> u32 {
    2
}

pub fn vulture_window_ms() -> Millis {
    5_000
}

/// Applies the Excited effect's idle-kill rule: killed if idle (no motion
/// above a trivial noise floor) for more than 2s. This lives alongside
/// the role catalog rather than in `effect.rs` because it is the one
/// effect whose tick behavior needs a damage-pipeline decision
/// (`EffectKind::Excited`'s `on_tick` hook from §4.4).
pub fn excited_idle_kill_threshold_ms() -> Millis {
    2_000
}

/// Motion intensity at or below this counts as "idle" for Excited's
/// timer — small enough to absorb sensor noise from a motionless device.
pub fn excited_idle_noise_floor() -> f32 {
    0.05
}

pub fn excited_priority() -> i32 {
    EffectKind::Excited.priority()
}
