//! Settings Store (§6 Persistence, §9 design note): a single JSON document
//! covering every tunable exposed through `/api/game/settings`. Grounded
//! on the teacher's `anyhow::Result` + `tracing` error style — disk I/O
//! here is best-effort and logged rather than propagated as a hard engine
//! failure, matching how the teacher's persistence-adjacent code treats
//! non-fatal I/O.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clock::Millis;
use crate::config::SensitivityPreset;
use crate::mode::ModeKind;

/// The full persisted document (§6: "movement config, sensitivity label,
/// mode default, theme, roundCount, roundDuration, team flags, domination
/// knobs, deathCount respawn, earbud flag").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsDocument {
    #[serde(default)]
    pub sensitivity: SensitivityPreset,
    #[serde(default)]
    pub movement: MovementSettings,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub default_mode: ModeKind,
    #[serde(default)]
    pub round_count: u32,
    #[serde(default)]
    pub round_duration_ms: Millis,
    #[serde(default)]
    pub teams_enabled: bool,
    #[serde(default)]
    pub team_count: u8,
    #[serde(default)]
    pub domination: DominationSettings,
    #[serde(default)]
    pub death_count_respawn_delay_ms: Millis,
    #[serde(default)]
    pub earbud_mode: bool,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            sensitivity: SensitivityPreset::Medium,
            movement: MovementSettings::default(),
            theme: "default".to_string(),
            default_mode: ModeKind::Classic,
            round_count: 3,
            round_duration_ms: 120_000,
            teams_enabled: false,
            team_count: 2,
            domination: DominationSettings::default(),
            death_count_respawn_delay_ms: 3_000,
            earbud_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementSettings {
    pub danger_threshold: f32,
    pub damage_multiplier: f32,
    pub oneshot_mode: bool,
    pub smoothing_enabled: bool,
}

impl Default for MovementSettings {
    fn default() -> Self {
        let defaults = crate::config::MovementConfig::default();
        Self {
            danger_threshold: defaults.danger_threshold,
            damage_multiplier: defaults.damage_multiplier,
            oneshot_mode: defaults.oneshot_mode,
            smoothing_enabled: defaults.smoothing_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DominationSettings {
    pub control_interval_ms: Millis,
    pub point_target: u32,
}

impl Default for DominationSettings {
    fn default() -> Self {
        Self { control_interval_ms: 10_000, point_target: 100 }
    }
}

/// Legacy layout the loader must still accept and migrate (§6): the
/// movement knobs used to live flat at the document root rather than
/// nested under `movement`.
#[derive(Debug, Deserialize)]
struct LegacyFlatDocument {
    #[serde(default)]
    sensitivity: SensitivityPreset,
    danger_threshold: Option<f32>,
    damage_multiplier: Option<f32>,
    oneshot_mode: Option<bool>,
    smoothing_enabled: Option<bool>,
    #[serde(default)]
    theme: String,
    #[serde(default)]
    default_mode: ModeKind,
    #[serde(default)]
    round_count: u32,
    #[serde(default)]
    round_duration_ms: Millis,
    #[serde(default)]
    teams_enabled: bool,
    #[serde(default)]
    team_count: u8,
    #[serde(default)]
    domination: DominationSettings,
    #[serde(default)]
    death_count_respawn_delay_ms: Millis,
    #[serde(default)]
    earbud_mode: bool,
}

impl From<LegacyFlatDocument> for SettingsDocument {
    fn from(legacy: LegacyFlatDocument) -> Self {
        let base_movement = MovementSettings::default();
        Self {
            sensitivity: legacy.sensitivity,
            movement: MovementSettings {
                danger_threshold: legacy.danger_threshold.unwrap_or(base_movement.danger_threshold),
                damage_multiplier: legacy.damage_multiplier.unwrap_or(base_movement.damage_multiplier),
                oneshot_mode: legacy.oneshot_mode.unwrap_or(base_movement.oneshot_mode),
                smoothing_enabled: legacy.smoothing_enabled.unwrap_or(base_movement.smoothing_enabled),
            },
            theme: if legacy.theme.is_empty() { "default".to_string() } else { legacy.theme },
            default_mode: legacy.default_mode,
            round_count: if legacy.round_count == 0 { 3 } else { legacy.round_count },
            round_duration_ms: if legacy.round_duration_ms == 0 { 120_000 } else { legacy.round_duration_ms },
            teams_enabled: legacy.teams_enabled,
            team_count: if legacy.team_count == 0 { 2 } else { legacy.team_count },
            domination: legacy.domination,
            death_count_respawn_delay_ms: if legacy.death_count_respawn_delay_ms == 0 {
                3_000
            } else {
                legacy.death_count_respawn_delay_ms
            },
            earbud_mode: legacy.earbud_mode,
        }
    }
}

/// Persistence seam (§6.1): the transport wires a real `JsonFileStore`;
/// tests use an in-memory stand-in or `JsonFileStore::disabled`.
pub trait SettingsPersistence: Send {
    fn load(&self) -> anyhow::Result<Option<SettingsDocument>>;
    fn save(&self, doc: &SettingsDocument) -> anyhow::Result<()>;
}

/// Default production store: one JSON file, created on first save.
/// Corrupt files load as `None` (§6: "the system proceeds with
/// defaults") rather than propagating a parse error.
pub struct JsonFileStore {
    path: PathBuf,
    /// §9 design note: disk persistence is off during tests so repeated
    /// runs don't clobber a developer's real settings file or each other.
    enabled: bool,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), enabled: true }
    }

    /// Construct a store that never touches disk — `load` always returns
    /// `Ok(None)`, `save` always returns `Ok(())`. Used by the test harness
    /// per the §9 "disk persistence during tests" decision.
    pub fn disabled<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), enabled: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsPersistence for JsonFileStore {
    fn load(&self) -> anyhow::Result<Option<SettingsDocument>> {
        if !self.enabled {
            return Ok(None);
        }
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if let Ok(doc) = serde_json::from_str::<SettingsDocument>(&raw) {
            return Ok(Some(doc));
        }
        match serde_json::from_str::<LegacyFlatDocument>(&raw) {
            Ok(legacy) => {
                tracing::info!(path = %self.path.display(), "migrating legacy flat settings layout");
                Ok(Some(legacy.into()))
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "settings file is corrupt, using defaults");
                Ok(None)
            }
        }
    }

    fn save(&self, doc: &SettingsDocument) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
            _ => {}
        }
        let serialized = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }
}
