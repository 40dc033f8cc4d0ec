//! Global simulation defaults and the movement config stack.
//!
//! `gameConfig` in the design doc is represented here as [`MovementConfig`]
//! plus the handful of top-level knobs in [`Config`]. Mode installation and
//! game-event transitions mutate this through [`Config::push_movement`] /
//! [`Config::pop_movement`] so cleanup always restores exactly what was
//! there before, per the "stack discipline" redesign note.

use serde::{Deserialize, Serialize};

/// Sensitivity presets exposed to players/dashboard; `Custom` means the
/// player (or settings doc) has hand-tuned `MovementConfig` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensitivityPreset {
    Low,
    #[default]
    Medium,
    High,
    Custom,
}

impl SensitivityPreset {
    /// Danger threshold implied by a preset, used when a player has no
    /// per-player override.
    pub fn default_threshold(&self) -> f32 {
        match self {
            SensitivityPreset::Low => 2.5,
            SensitivityPreset::Medium => 1.6,
            SensitivityPreset::High => 1.0,
            SensitivityPreset::Custom => 1.6,
        }
    }
}

/// The movement half of `gameConfig` — the part that mode installation and
/// game events are allowed to mutate and must restore.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Intensity above which motion starts accumulating damage.
    pub danger_threshold: f32,

    /// Multiplier applied to `(intensity - threshold)` when accumulating damage.
    pub damage_multiplier: f32,

    /// If set, any motion above threshold is instantly lethal.
    pub oneshot_mode: bool,

    /// If set, motion intensity is smoothed over the recent history window
    /// rather than using the single latest sample.
    pub smoothing_enabled: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            danger_threshold: SensitivityPreset::Medium.default_threshold(),
            damage_multiplier: 12.0,
            oneshot_mode: false,
            smoothing_enabled: true,
        }
    }
}

/// Top-level engine configuration: global movement config plus constants
/// that aren't part of the mutate/restore stack.
#[derive(Debug, Clone)]
pub struct Config {
    /// Current effective movement config ("gameConfig.movement").
    movement: MovementConfig,

    /// Stack of movement configs saved by `push_movement`, popped by
    /// `pop_movement`. Each mode install / game-event transition that
    /// mutates `movement` pushes the prior value first.
    movement_stack: Vec<MovementConfig>,

    /// Current sensitivity label (display only; movement thresholds are
    /// the source of truth for simulation).
    pub sensitivity: SensitivityPreset,

    /// Size of the bounded motion-sample ring kept per player.
    pub motion_history_len: usize,

    /// Default `deathThreshold` for newly spawned players.
    pub default_death_threshold: f32,

    /// Default `toughness` for newly spawned players.
    pub default_toughness: f32,

    /// Canonical single site for the Ninja threshold multiplier
    /// (referenced ambiguously as 2x/3x/4x upstream; §9 decision: 3x).
    pub ninja_threshold_multiplier: f32,

    /// Fixed tick cadence.
    pub tick_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            movement_stack: Vec::new(),
            sensitivity: SensitivityPreset::Medium,
            motion_history_len: 8,
            default_death_threshold: 100.0,
            default_toughness: 1.0,
            ninja_threshold_multiplier: 3.0,
            tick_interval_ms: 100,
        }
    }
}

impl Config {
    pub fn movement(&self) -> MovementConfig {
        self.movement
    }

    /// Save the current movement config and install a new one. Pairs with
    /// `pop_movement`; mode installs and game-event transitions always call
    /// this instead of mutating `movement` directly.
    pub fn push_movement(&mut self, new_movement: MovementConfig) {
        self.movement_stack.push(self.movement);
        self.movement = new_movement;
    }

    /// Mutate the movement config in place, preserving the prior value on
    /// the stack (used by game events that only tweak one field).
    pub fn push_movement_with<F>(&mut self, f: F)
    where
        F: FnOnce(&mut MovementConfig),
    {
        let mut next = self.movement;
        f(&mut next);
        self.push_movement(next);
    }

    /// Restore the movement config saved by the matching `push_movement`.
    /// No-op (with a warning) if the stack is already empty — this should
    /// never happen if push/pop calls are paired correctly.
    pub fn pop_movement(&mut self) {
        match self.movement_stack.pop() {
            Some(prev) => self.movement = prev,
            None => tracing::warn!("pop_movement called with an empty movement stack"),
        }
    }

    /// Depth of the movement stack; used by tests asserting push/pop balance.
    pub fn movement_stack_depth(&self) -> usize {
        self.movement_stack.len()
    }
}
