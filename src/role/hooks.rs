//! Per-role hook dispatch (§4.5). Each function is a fan-out point the
//! engine calls once per relevant lifecycle event; the `match` inside is
//! the "shared method table" the closed `Role` enum replaces a trait
//! hierarchy with.

use crate::player::{EffectKind, Roster};
use crate::timer::{TimerQueue, TimerTag};

use super::{
    angel_invulnerability_window_ms, beast_hunter_bonus_points, berserker_debounce_ms,
    berserker_toughened_duration_ms, berserker_toughened_magnitude, executioner_bonus_points,
    ironclad_toughened_duration_ms, ironclad_toughened_magnitude, masochist_point_interval_ms,
    reroll_target, survivor_point_interval_ms, troll_heal_delay_ms, vampire_bloodlust_delay_ms,
    vampire_bonus_points, vulture_bonus_points, vulture_window_ms, Role, RoleKind,
};
use crate::clock::Millis;
use crate::player::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityResult {
    Applied,
    AlreadyUsed,
    NoAbility,
}

/// Round-start bookkeeping: resets every role's per-round transient
/// state, then re-pairs Siblings and assigns fresh Executioner/Bodyguard
/// targets.
pub fn on_round_start(roster: &mut Roster, now: Millis) {
    let ids: Vec<PlayerId> = roster.ids().cloned().collect();
    for id in &ids {
        if let Some(player) = roster.get_mut(id) {
            if let Some(role) = &mut player.role {
                match role {
                    Role::Vampire { bloodlust_active, round_start_at } => {
                        *bloodlust_active = false;
                        *round_start_at = now;
                    }
                    Role::Angel { absorbed_once } => *absorbed_once = false,
                    Role::Survivor { last_point_at } => *last_point_at = now,
                    Role::Masochist { last_point_at } => *last_point_at = now,
                    Role::Berserker { debounce_timer } => *debounce_timer = None,
                    Role::Troll { pending, heal_timer } => {
                        *pending = 0.0;
                        *heal_timer = None;
                    }
                    Role::Ironclad { charge_used } => *charge_used = false,
                    _ => {}
                }
            }
        }
    }

    super::pair_siblings(roster);
    assign_targets(roster);
}

fn assign_targets(roster: &mut Roster) {
    let targeted_owners: Vec<PlayerId> = roster
        .iter()
        .filter(|p| matches!(p.role, Some(Role::Executioner { .. }) | Some(Role::Bodyguard { .. })))
        .map(|p| p.id.clone())
        .collect();

    for owner_id in targeted_owners {
        let target = reroll_target(roster, &owner_id, None);
        if let Some(player) = roster.get_mut(&owner_id) {
            match &mut player.role {
                Some(Role::Executioner { target: slot }) => *slot = target,
                Some(Role::Bodyguard { target: slot }) => *slot = target,
                _ => {}
            }
        }
    }
}

/// Per-tick passive scoring: Survivor's flat tick income and Masochist's
/// low-hp income.
pub fn on_tick(roster: &mut Roster, player_id: &str, now: Millis) {
    let Some(player) = roster.get_mut(player_id) else { return };
    if !player.is_alive {
        return;
    }
    let hp = player.hp_fraction();

    let mut award = 0u32;
    if let Some(role) = &mut player.role {
        match role {
            Role::Survivor { last_point_at } => {
                if now.saturating_sub(*last_point_at) >= survivor_point_interval_ms() {
                    *last_point_at = now;
                    award = 1;
                }
            }
            Role::Vampire { bloodlust_active, round_start_at } => {
                if !*bloodlust_active && now.saturating_sub(*round_start_at) >= vampire_bloodlust_delay_ms() {
                    *bloodlust_active = true;
                }
            }
            Role::Masochist { last_point_at } => {
                if hp < 0.5 && now.saturating_sub(*last_point_at) >= masochist_point_interval_ms() {
                    *last_point_at = now;
                    award = 1;
                }
            }
            _ => {}
        }
    }

    if award > 0 {
        player.award_points(award);
    }
}

/// Reacts to a hit the player just took: arms Berserker's post-hit
/// debounce, tracks Troll's pending heal, mirrors damage to a paired
/// Sibling. Called once per hit with the amount actually delivered after
/// the status-effect pipeline (never the raw pre-effect amount).
pub fn on_damage(roster: &mut Roster, player_id: &str, delivered: f32, now: Millis, timers: &mut TimerQueue) {
    if delivered <= 0.0 {
        return;
    }

    {
        if let Some(player) = roster.get_mut(player_id) {
            if let Some(role) = &mut player.role {
                match role {
                    Role::Berserker { debounce_timer } => {
                        if let Some(id) = debounce_timer.take() {
                            timers.cancel(id);
                        }
                        let id = timers.schedule(
                            now + berserker_debounce_ms(),
                            TimerTag::BerserkerDebounceExpired(player_id.to_string()),
                        );
                        *debounce_timer = Some(id);
                    }
                    Role::Troll { pending, heal_timer } => {
                        *pending += delivered;
                        if let Some(id) = heal_timer.take() {
                            timers.cancel(id);
                        }
                        let id = timers.schedule(now + troll_heal_delay_ms(), TimerTag::TrollHeal(player_id.to_string()));
                        *heal_timer = Some(id);
                    }
                    _ => {}
                }
            }
        }
    }

    let sibling_partner = roster.get(player_id).and_then(|p| match &p.role {
        Some(Role::Sibling { paired_with }) => paired_with.clone(),
        _ => None,
    });
    if let Some(partner_id) = sibling_partner {
        if roster.contains(&partner_id) {
            roster.with_two_mut(player_id, &partner_id, |_victim, partner| {
                partner.take_damage(delivered);
            });
        }
    }
}

/// Called when a timer queue drains a `BerserkerDebounceExpired` entry:
/// the player went this long without a new hit, so their Berserker role
/// rewards the lull with a temporary toughness boost.
pub fn on_berserker_debounce_expired(roster: &mut Roster, player_id: &str, now: Millis) {
    let Some(player) = roster.get_mut(player_id) else { return };
    if !player.is_alive {
        return;
    }
    if matches!(player.role, Some(Role::Berserker { .. })) {
        player.status_effects.apply(
            EffectKind::Toughened,
            now,
            Some(berserker_toughened_duration_ms()),
            berserker_toughened_magnitude(),
        );
    }
    if let Some(Role::Berserker { debounce_timer }) = &mut player.role {
        *debounce_timer = None;
    }
}

/// Called when a timer queue drains a `TrollHeal` entry: no new damage
/// arrived during the heal window, so whatever is still pending is
/// healed back off `accumulated_damage`.
pub fn on_troll_heal_expired(roster: &mut Roster, player_id: &str) {
    let Some(player) = roster.get_mut(player_id) else { return };
    if !player.is_alive {
        return;
    }
    if let Some(Role::Troll { pending, heal_timer }) = &mut player.role {
        let healed = *pending;
        *pending = 0.0;
        *heal_timer = None;
        player.accumulated_damage = (player.accumulated_damage - healed).max(0.0);
    }
}

/// Angel's death veto: the first lethal hit is absorbed instead of
/// killing. Must be called by the engine *before* `Player::die`, in
/// place of the normal lethal check, for any player carrying the Angel
/// role. Returns `true` if death was vetoed.
pub fn veto_death(roster: &mut Roster, player_id: &str, now: Millis) -> bool {
    let Some(player) = roster.get_mut(player_id) else { return false };
    let should_absorb = matches!(player.role, Some(Role::Angel { absorbed_once: false }));
    if !should_absorb {
        return false;
    }
    if let Some(Role::Angel { absorbed_once }) = &mut player.role {
        *absorbed_once = true;
    }
    player.accumulated_damage = (player.death_threshold - 1.0).max(0.0);
    player.status_effects.apply(
        EffectKind::Invulnerability,
        now,
        Some(angel_invulnerability_window_ms()),
        0.0,
    );
    true
}

/// Cleanup on the dying player's own role: discards Troll's pending heal
/// and Berserker's debounce timer (a kill outright forfeits both), and
/// reassigns anyone who had targeted or paired with the victim.
pub fn on_self_death(roster: &mut Roster, victim_id: &str, timers: &mut TimerQueue) {
    if let Some(player) = roster.get_mut(victim_id) {
        if let Some(role) = &mut player.role {
            match role {
                Role::Berserker { debounce_timer } => {
                    if let Some(id) = debounce_timer.take() {
                        timers.cancel(id);
                    }
                }
                Role::Troll { pending, heal_timer } => {
                    *pending = 0.0;
                    if let Some(id) = heal_timer.take() {
                        timers.cancel(id);
                    }
                }
                _ => {}
            }
        }
    }

    reroll_targets_pointing_at(roster, victim_id);
    clear_sibling_pairing_pointing_at(roster, victim_id);
}

fn reroll_targets_pointing_at(roster: &mut Roster, dead_id: &str) {
    let owners: Vec<PlayerId> = roster
        .iter()
        .filter(|p| p.is_alive && p.connected)
        .filter(|p| match &p.role {
            Some(Role::Executioner { target: Some(t) }) => t == dead_id,
            Some(Role::Bodyguard { target: Some(t) }) => t == dead_id,
            _ => false,
        })
        .map(|p| p.id.clone())
        .collect();

    for owner_id in owners {
        let new_target = reroll_target(roster, &owner_id, Some(dead_id));
        if let Some(player) = roster.get_mut(&owner_id) {
            match &mut player.role {
                Some(Role::Executioner { target }) => *target = new_target,
                Some(Role::Bodyguard { target }) => *target = new_target,
                _ => {}
            }
        }
    }
}

fn clear_sibling_pairing_pointing_at(roster: &mut Roster, dead_id: &str) {
    let siblings: Vec<PlayerId> = roster
        .iter()
        .filter(|p| matches!(&p.role, Some(Role::Sibling { paired_with: Some(t) }) if t == dead_id))
        .map(|p| p.id.clone())
        .collect();

    for id in siblings {
        if let Some(player) = roster.get_mut(&id) {
            if let Some(Role::Sibling { paired_with }) = &mut player.role {
                *paired_with = None;
            }
        }
    }
}

/// Reactive hooks fired on every *other* living player when `victim_id`
/// dies: BeastHunter's bounty on a Beast's death, Vulture's rapid-chain
/// bonus, Vampire's bloodlust feeding, and Executioner's contract payout
/// (plus reroll). `prior_other_death_at` is the timestamp of the death
/// immediately before this one (not counting the victim's own prior
/// deaths), used for Vulture's window check.
pub fn on_other_death(roster: &mut Roster, victim_id: &str, now: Millis, prior_other_death_at: Option<Millis>) {
    let victim_kind = roster.get(victim_id).and_then(|p| p.role.as_ref()).map(|r| r.kind());
    let observer_ids: Vec<PlayerId> = roster
        .iter()
        .filter(|p| p.id != victim_id)
        .map(|p| p.id.clone())
        .collect();

    for observer_id in observer_ids {
        let mut award = 0u32;
        let mut reroll = false;

        if let Some(player) = roster.get_mut(&observer_id) {
            if let Some(role) = &mut player.role {
                match role {
                    Role::BeastHunter if victim_kind == Some(RoleKind::Beast) => {
                        award = beast_hunter_bonus_points();
                    }
                    Role::Vulture => {
                        let within_window = prior_other_death_at
                            .map(|t| now.saturating_sub(t) <= vulture_window_ms())
                            .unwrap_or(false);
                        if within_window {
                            award = vulture_bonus_points();
                        }
                    }
                    Role::Vampire { bloodlust_active, .. } => {
                        if *bloodlust_active {
                            award = vampire_bonus_points();
                        }
                    }
                    Role::Executioner { target } if target.as_deref() == Some(victim_id) => {
                        award = executioner_bonus_points();
                        reroll = true;
                    }
                    _ => {}
                }
            }
            if award > 0 {
                player.award_points(award);
            }
        }

        if reroll {
            let new_target = reroll_target(roster, &observer_id, Some(victim_id));
            if let Some(player) = roster.get_mut(&observer_id) {
                if let Some(Role::Executioner { target }) = &mut player.role {
                    *target = new_target;
                }
            }
        }
    }
}

/// Ironclad's single-charge active ability: a fixed Toughened window with
/// no recharge for the rest of the round.
pub fn use_ability(roster: &mut Roster, player_id: &str, now: Millis) -> AbilityResult {
    let Some(player) = roster.get_mut(player_id) else { return AbilityResult::NoAbility };
    match &mut player.role {
        Some(Role::Ironclad { charge_used }) => {
            if *charge_used {
                AbilityResult::AlreadyUsed
            } else {
                *charge_used = true;
                let duration = ironclad_toughened_duration_ms();
                let magnitude = ironclad_toughened_magnitude();
                player.status_effects.apply(EffectKind::Toughened, now, Some(duration), magnitude);
                AbilityResult::Applied
            }
        }
        _ => AbilityResult::NoAbility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::player::Player;
    use crate::role::{assign_role, RoleKind};

    fn make_player(id: &str, kind: RoleKind) -> Player {
        let config = Config::default();
        let mut player = Player::new(id.to_string(), id.to_string(), 1, false, &config);
        assign_role(&mut player, kind, &config);
        player
    }

    #[test]
    fn vampire_arms_bloodlust_after_delay() {
        let mut roster = Roster::new();
        roster.insert(make_player("vamp", RoleKind::Vampire));
        on_round_start(&mut roster, 0);

        on_tick(&mut roster, "vamp", 10_000);
        assert!(matches!(
            roster.get("vamp").unwrap().role,
            Some(Role::Vampire { bloodlust_active: false, .. })
        ));

        on_tick(&mut roster, "vamp", vampire_bloodlust_delay_ms());
        assert!(matches!(
            roster.get("vamp").unwrap().role,
            Some(Role::Vampire { bloodlust_active: true, .. })
        ));
    }

    #[test]
    fn sibling_damage_mirrors_once_without_recursion() {
        let mut roster = Roster::new();
        roster.insert(make_player("s1", RoleKind::Sibling));
        roster.insert(make_player("s2", RoleKind::Sibling));
        on_round_start(&mut roster, 0);

        let mut timers = TimerQueue::new();
        let delivered = roster.get_mut("s1").unwrap().take_damage(20.0);
        on_damage(&mut roster, "s1", delivered, 0, &mut timers);

        assert_eq!(roster.get("s1").unwrap().accumulated_damage, 20.0);
        assert_eq!(roster.get("s2").unwrap().accumulated_damage, 20.0);
    }

    #[test]
    fn troll_heal_expiry_reverts_pending_damage() {
        let mut roster = Roster::new();
        roster.insert(make_player("troll", RoleKind::Troll));
        on_round_start(&mut roster, 0);

        let mut timers = TimerQueue::new();
        let delivered = roster.get_mut("troll").unwrap().take_damage(40.0);
        on_damage(&mut roster, "troll", delivered, 0, &mut timers);
        assert_eq!(roster.get("troll").unwrap().accumulated_damage, 40.0);

        on_troll_heal_expired(&mut roster, "troll");
        assert_eq!(roster.get("troll").unwrap().accumulated_damage, 0.0);
    }

    #[test]
    fn troll_death_discards_pending_instead_of_healing() {
        let mut roster = Roster::new();
        roster.insert(make_player("troll", RoleKind::Troll));
        on_round_start(&mut roster, 0);

        let mut timers = TimerQueue::new();
        let delivered = roster.get_mut("troll").unwrap().take_damage(150.0);
        on_damage(&mut roster, "troll", delivered, 0, &mut timers);
        roster.get_mut("troll").unwrap().die();
        on_self_death(&mut roster, "troll", &mut timers);

        assert!(timers.is_empty());
    }

    #[test]
    fn angel_vetoes_first_lethal_hit_only() {
        let mut roster = Roster::new();
        roster.insert(make_player("angel", RoleKind::Angel));
        on_round_start(&mut roster, 0);
        roster.get_mut("angel").unwrap().take_damage(100.0);

        assert!(veto_death(&mut roster, "angel", 0));
        assert!(!roster.get("angel").unwrap().is_lethal());
        assert!(roster.get("angel").unwrap().status_effects.has(EffectKind::Invulnerability));

        roster.get_mut("angel").unwrap().accumulated_damage = 200.0;
        assert!(!veto_death(&mut roster, "angel", 0));
    }

    #[test]
    fn executioner_scores_and_rerolls_on_target_death() {
        let mut roster = Roster::new();
        roster.insert(make_player("exe", RoleKind::Executioner));
        roster.insert(make_player("t1", RoleKind::Survivor));
        roster.insert(make_player("t2", RoleKind::Survivor));
        on_round_start(&mut roster, 0);

        let original_target = match &roster.get("exe").unwrap().role {
            Some(Role::Executioner { target }) => target.clone().unwrap(),
            _ => panic!("expected executioner role"),
        };

        roster.get_mut(&original_target).unwrap().die();
        on_other_death(&mut roster, &original_target, 0, None);

        assert_eq!(roster.get("exe").unwrap().points, executioner_bonus_points());
        let new_target = match &roster.get("exe").unwrap().role {
            Some(Role::Executioner { target }) => target.clone(),
            _ => panic!("expected executioner role"),
        };
        assert_ne!(new_target, Some(original_target));
    }

    #[test]
    fn ironclad_ability_has_a_single_charge() {
        let mut roster = Roster::new();
        roster.insert(make_player("iron", RoleKind::Ironclad));
        on_round_start(&mut roster, 0);

        assert_eq!(use_ability(&mut roster, "iron", 0), AbilityResult::Applied);
        assert_eq!(use_ability(&mut roster, "iron", 100), AbilityResult::AlreadyUsed);
    }
}
