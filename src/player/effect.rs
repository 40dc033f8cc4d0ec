//! Priority-ordered status-effect stack (§4.4).
//!
//! Redesign note (§9): the source's duck-typed effect list becomes a fixed
//! enum of effect kinds with per-kind hook functions, dispatched by a
//! `match` rather than dynamic dispatch, since the set is closed and small.

use serde::{Deserialize, Serialize};

use crate::clock::Millis;

/// The closed set of status-effect kinds, each with a fixed priority.
/// Higher priority effects run first in the per-tick pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Invulnerability,
    Shielded,
    Toughened,
    Weakened,
    Excited,
}

impl EffectKind {
    pub fn priority(self) -> i32 {
        match self {
            EffectKind::Invulnerability => 100,
            EffectKind::Shielded => 80,
            EffectKind::Toughened => 60,
            EffectKind::Weakened => 40,
            EffectKind::Excited => 20,
        }
    }
}

/// One applied instance of an effect on a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: EffectKind,
    pub applied_at: Millis,
    /// `None` means "until explicitly removed".
    pub duration: Option<Millis>,
    /// Effect-specific scalar: shield pool remaining, toughness factor, etc.
    pub magnitude: f32,
    /// Tracks idle time for effects like Excited that kill on inactivity.
    pub idle_for: Millis,
}

impl StatusEffect {
    pub fn new(kind: EffectKind, applied_at: Millis, duration: Option<Millis>, magnitude: f32) -> Self {
        Self {
            kind,
            applied_at,
            duration,
            magnitude,
            idle_for: 0,
        }
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        match self.duration {
            Some(duration) => now.saturating_sub(self.applied_at) >= duration,
            None => false,
        }
    }

    pub fn priority(&self) -> i32 {
        self.kind.priority()
    }
}

/// Result of running the effect stack against an incoming hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageOutcome {
    pub amount: f32,
    pub blocked: bool,
}

/// Per-player stack of active status effects. At most one instance of a
/// given kind at a time (§3 invariant); re-applying refreshes
/// `applied_at`/`duration` and replaces the magnitude.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectStack {
    effects: Vec<StatusEffect>,
}

impl EffectStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply (or refresh) an effect. Re-applying the same kind does not
    /// stack — it replaces `applied_at`, `duration`, and `magnitude`.
    pub fn apply(&mut self, kind: EffectKind, now: Millis, duration: Option<Millis>, magnitude: f32) {
        if let Some(existing) = self.effects.iter_mut().find(|e| e.kind == kind) {
            existing.applied_at = now;
            existing.duration = duration;
            existing.magnitude = magnitude;
            existing.idle_for = 0;
        } else {
            self.effects.push(StatusEffect::new(kind, now, duration, magnitude));
        }
    }

    pub fn remove(&mut self, kind: EffectKind) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.kind != kind);
        self.effects.len() != before
    }

    pub fn has(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn get(&self, kind: EffectKind) -> Option<&StatusEffect> {
        self.effects.iter().find(|e| e.kind == kind)
    }

    pub fn get_mut(&mut self, kind: EffectKind) -> Option<&mut StatusEffect> {
        self.effects.iter_mut().find(|e| e.kind == kind)
    }

    /// Step 1 of the tick pipeline (§4.2): advance timers and drop expired
    /// effects.
    pub fn expire(&mut self, now: Millis) {
        self.effects.retain(|e| !e.is_expired(now));
    }

    /// Effects in priority order, highest first, for step 2 of the tick
    /// pipeline.
    pub fn in_priority_order(&self) -> impl Iterator<Item = &StatusEffect> {
        let mut ordered: Vec<&StatusEffect> = self.effects.iter().collect();
        ordered.sort_by(|a, b| b.priority().cmp(&a.priority()));
        ordered.into_iter()
    }

    /// Runs each active effect in priority order against an incoming hit.
    /// Invulnerability blocks everything; Shielded consumes its pool down
    /// to zero then lets the remainder through; Toughened/Weakened scale
    /// the base toughness divisor upstream (see `Player::take_damage`).
    pub fn modify_incoming_damage(&mut self, amount: f32) -> DamageOutcome {
        let mut remaining = amount.max(0.0);
        let mut blocked = false;

        let kinds_in_order: Vec<EffectKind> = {
            let mut pairs: Vec<(i32, EffectKind)> =
                self.effects.iter().map(|e| (e.priority(), e.kind)).collect();
            pairs.sort_by(|a, b| b.0.cmp(&a.0));
            pairs.into_iter().map(|(_, k)| k).collect()
        };

        for kind in kinds_in_order {
            if remaining <= 0.0 {
                break;
            }
            match kind {
                EffectKind::Invulnerability => {
                    remaining = 0.0;
                    blocked = true;
                }
                EffectKind::Shielded => {
                    if let Some(effect) = self.get_mut(EffectKind::Shielded) {
                        let absorbed = remaining.min(effect.magnitude.max(0.0));
                        effect.magnitude -= absorbed;
                        remaining -= absorbed;
                        if absorbed > 0.0 && remaining <= 0.0 {
                            blocked = true;
                        }
                    }
                }
                _ => {}
            }
        }

        DamageOutcome {
            amount: remaining.max(0.0),
            blocked,
        }
    }

    /// Applies Toughened/Weakened multiplicatively to a base toughness.
    pub fn modify_toughness(&self, base: f32) -> f32 {
        let mut toughness = base;
        if let Some(effect) = self.get(EffectKind::Toughened) {
            toughness *= effect.magnitude.max(0.01);
        }
        if let Some(effect) = self.get(EffectKind::Weakened) {
            toughness *= effect.magnitude.max(0.01);
        }
        toughness
    }

    /// Whether any currently-active effect has priority at or above
    /// Invulnerability's, which the testable property in §8 uses to assert
    /// "no damage increase this tick".
    pub fn blocks_all_damage(&self) -> bool {
        self.has(EffectKind::Invulnerability)
    }

    /// Excited's `onTick` (§4.4): advances (or resets) its idle timer and
    /// reports whether the holder has now been idle past `threshold_ms`.
    /// A no-op (returns `false`) when Excited isn't active.
    pub fn tick_excited(&mut self, dt: Millis, is_idle: bool, threshold_ms: Millis) -> bool {
        let Some(effect) = self.get_mut(EffectKind::Excited) else { return false };
        if is_idle {
            effect.idle_for += dt;
        } else {
            effect.idle_for = 0;
        }
        effect.idle_for >= threshold_ms
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}
