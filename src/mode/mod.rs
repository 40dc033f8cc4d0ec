//! Game-Mode strategies (§4.6). Grounded on the `BreakpointGame`-style
//! trait-object strategy pattern (`other_examples` game_trait.rs): one
//! struct per mode, installed behind a `Box<dyn GameMode>`, with the
//! engine driving a fixed lifecycle contract rather than the mode
//! reaching back into engine internals.

mod classic;
mod death_count;
mod domination;
mod role_based;

pub use classic::{ClassicMode, ClassicOptions};
pub use death_count::{DeathCountMode, DeathCountOptions};
pub use domination::{DominationMode, DominationOptions};
pub use role_based::{RoleBasedMode, RoleBasedOptions};

use serde::{Deserialize, Serialize};

use crate::base::BaseManager;
use crate::clock::Millis;
use crate::config::Config;
use crate::event::{EventSink, ScoreEntry};
use crate::gameevent::{GameEventKind, GameEventManager};
use crate::player::{PlayerId, Roster};
use crate::role::RoleKind;
use crate::team::TeamManager;
use crate::timer::TimerQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModeKind {
    #[default]
    Classic,
    RoleBased,
    DeathCount,
    Domination,
}

/// Every mutable piece of engine state a mode is allowed to touch,
/// bundled so the `GameMode` trait doesn't need a dozen parameters and
/// the engine doesn't need to hand out `&mut self` to a trait object it
/// owns a field of.
pub struct ModeCtx<'a> {
    pub roster: &'a mut Roster,
    pub config: &'a mut Config,
    pub teams: &'a mut TeamManager,
    pub bases: &'a mut BaseManager,
    pub game_events: &'a mut GameEventManager,
    pub timers: &'a mut TimerQueue,
    pub sink: &'a dyn EventSink,
    pub now: Millis,
    pub round_started_at: Millis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinCheck {
    pub round_ended: bool,
    pub game_ended: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundEndOutcome {
    pub game_ended: bool,
}

/// The strategy contract every mode implements (§4.6).
pub trait GameMode: Send + Sync {
    fn kind(&self) -> ModeKind;

    /// One-shot: install countdown/config overrides. Any `gameConfig`
    /// mutation here must be undone in `on_game_end` (§5 shared-resource
    /// policy); modes that only push/pop via `Config` get this for free.
    fn on_mode_selected(&mut self, ctx: &mut ModeCtx);

    fn on_game_start(&mut self, ctx: &mut ModeCtx);

    fn on_round_start(&mut self, ctx: &mut ModeCtx);

    fn on_tick(&mut self, ctx: &mut ModeCtx, dt: Millis);

    fn on_player_death(&mut self, victim_id: &str, ctx: &mut ModeCtx);

    fn on_round_end(&mut self, ctx: &mut ModeCtx) -> RoundEndOutcome;

    /// Restores whatever `on_mode_selected` pushed onto the global config.
    fn on_game_end(&mut self, ctx: &mut ModeCtx);

    fn check_win_condition(&mut self, ctx: &mut ModeCtx) -> WinCheck;

    fn calculate_final_scores(&self, roster: &Roster) -> Vec<ScoreEntry>;

    fn role_pool(&self, player_count: usize) -> Vec<RoleKind> {
        let _ = player_count;
        Vec::new()
    }

    fn game_event_kinds(&self) -> Vec<GameEventKind> {
        Vec::new()
    }

    /// `Some(delay)` if deaths respawn after a fixed delay (Death-Count);
    /// `None` means deaths are permanent for the round (Classic,
    /// Role-Based) or there is no death at all (Domination).
    fn respawn_delay_ms(&self) -> Option<Millis> {
        None
    }

    /// `Some(duration)` caps a round by wall-clock/virtual time rather
    /// than elimination (Death-Count); `None` for elimination-based or
    /// round-less modes.
    fn round_duration_ms(&self) -> Option<Millis> {
        None
    }

    fn countdown_duration_ms(&self) -> Millis;

    /// Whether this mode has a round structure at all — Domination does
    /// not (§4.6: "match has no round structure").
    fn has_rounds(&self) -> bool {
        true
    }
}

/// Generic elimination-order → placement-bonus scorer shared by Classic
/// and Role-Based: `groups` is rank order best-first, each inner `Vec` a
/// tie group. Ties share the *higher* of the bonuses spanned by the
/// group (§8: "ties share rank and share the higher bonus").
pub(crate) fn placement_bonus_for_groups(groups: &[Vec<PlayerId>], table: &[u32]) -> Vec<(PlayerId, u32)> {
    let mut result = Vec::new();
    let mut rank = 0usize;
    for group in groups {
        let len = group.len().max(1);
        let bonus = (rank..rank + len).map(|r| table.get(r).copied().unwrap_or(0)).max().unwrap_or(0);
        for id in group {
            result.push((id.clone(), bonus));
        }
        rank += len;
    }
    result
}

pub(crate) const DEFAULT_PLACEMENT_TABLE: [u32; 3] = [5, 3, 1];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_bonus_ties_share_the_higher_value() {
        let groups = vec![vec!["p1".to_string()], vec!["p2".to_string(), "p3".to_string()], vec!["p4".to_string()]];
        let bonuses = placement_bonus_for_groups(&groups, &DEFAULT_PLACEMENT_TABLE);
        let map: std::collections::HashMap<_, _> = bonuses.into_iter().collect();
        assert_eq!(map["p1"], 5);
        // p2/p3 tie for ranks 1-2 (0-indexed): table[1]=3, table[2]=1 -> higher is 3.
        assert_eq!(map["p2"], 3);
        assert_eq!(map["p3"], 3);
        assert_eq!(map["p4"], 0);
    }
}
