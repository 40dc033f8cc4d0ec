//! Team Manager (§4.10): optional team assignment, cycling/shuffling, and
//! per-team match-point tallies.

use std::collections::HashMap;

use serde::Serialize;

use crate::player::PlayerId;

pub type TeamId = u8;

const MIN_TEAM_COUNT: u8 = 2;
const MAX_TEAM_COUNT: u8 = 4;

/// Fixed display table (§3): `id` indexes directly into this array.
const TEAM_NAMES: [&str; 4] = ["Red", "Blue", "Green", "Yellow"];

pub fn team_name(id: TeamId) -> &'static str {
    TEAM_NAMES.get(id as usize).copied().unwrap_or("Unknown")
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub id: TeamId,
    pub name: &'static str,
    pub match_points: u32,
}

/// Owns team enablement/count and the player→team mapping plus match-point
/// accumulators. The engine's `Roster` stays the source of truth for
/// *which* players exist; this manager only tracks the team graph over
/// them, mirroring the teacher's separation between `EntityManager` and
/// its satellite managers.
#[derive(Debug)]
pub struct TeamManager {
    enabled: bool,
    count: u8,
    assignments: HashMap<PlayerId, TeamId>,
    match_points: Vec<u32>,
}

impl Default for TeamManager {
    fn default() -> Self {
        Self {
            enabled: false,
            count: MIN_TEAM_COUNT,
            assignments: HashMap::new(),
            match_points: vec![0; MIN_TEAM_COUNT as usize],
        }
    }
}

impl TeamManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    /// §4.10 `Configure`: invalid counts clamp into `[2, 4]` rather than
    /// being rejected.
    pub fn configure(&mut self, enabled: bool, count: u8) {
        self.enabled = enabled;
        self.count = count.clamp(MIN_TEAM_COUNT, MAX_TEAM_COUNT);
        self.match_points.resize(self.count as usize, 0);
        self.assignments.retain(|_, team_id| *team_id < self.count);
    }

    pub fn team_of(&self, id: &str) -> Option<TeamId> {
        self.assignments.get(id).copied()
    }

    /// §4.10 `AssignSequential`: round-robins the given ids across teams in
    /// input order.
    pub fn assign_sequential(&mut self, ids: &[PlayerId]) {
        for (i, id) in ids.iter().enumerate() {
            let team_id = (i as u8) % self.count;
            self.assignments.insert(id.clone(), team_id);
        }
    }

    /// §4.10 `AddPlayer`: places a newly joined player on the currently
    /// smallest team (ties broken by lowest team id).
    pub fn add_player(&mut self, id: PlayerId) -> TeamId {
        let team_id = self.smallest_team();
        self.assignments.insert(id, team_id);
        team_id
    }

    fn smallest_team(&self) -> TeamId {
        let mut sizes = vec![0u32; self.count as usize];
        for team_id in self.assignments.values() {
            if let Some(slot) = sizes.get_mut(*team_id as usize) {
                *slot += 1;
            }
        }
        sizes
            .iter()
            .enumerate()
            .min_by_key(|(_, size)| **size)
            .map(|(id, _)| id as TeamId)
            .unwrap_or(0)
    }

    /// §4.10 `CyclePlayerTeam`: moves the player to the next team id,
    /// wrapping around, and returns the new id. A no-op (returns the
    /// current id) for unknown players.
    pub fn cycle_player_team(&mut self, id: &str) -> TeamId {
        let current = self.assignments.get(id).copied().unwrap_or(0);
        let next = (current + 1) % self.count.max(1);
        self.assignments.insert(id.to_string(), next);
        next
    }

    /// §4.10 `Shuffle`: redistributes the given ids across teams as evenly
    /// as possible. Deterministic given input order — callers that want
    /// randomness pre-shuffle the id list themselves (the RNG lives with
    /// the caller per the constructor-injected-RNG design note, §9).
    pub fn shuffle(&mut self, ids: &[PlayerId]) {
        self.assign_sequential(ids);
    }

    pub fn remove_player(&mut self, id: &str) {
        self.assignments.remove(id);
    }

    /// §4.10 `ValidateTeams`: when teams are enabled, every configured
    /// team must have at least one assigned player — an empty team
    /// invalidates a launch (§3 invariant).
    pub fn validate_teams(&self) -> Result<(), TeamId> {
        if !self.enabled {
            return Ok(());
        }
        let mut sizes = vec![0u32; self.count as usize];
        for team_id in self.assignments.values() {
            if let Some(slot) = sizes.get_mut(*team_id as usize) {
                *slot += 1;
            }
        }
        for (id, size) in sizes.iter().enumerate() {
            if *size == 0 {
                return Err(id as TeamId);
            }
        }
        Ok(())
    }

    pub fn award_match_points(&mut self, team_id: TeamId, amount: u32) {
        if let Some(slot) = self.match_points.get_mut(team_id as usize) {
            *slot += amount;
        }
    }

    pub fn match_points(&self, team_id: TeamId) -> u32 {
        self.match_points.get(team_id as usize).copied().unwrap_or(0)
    }

    pub fn reset_match_points(&mut self) {
        for slot in &mut self.match_points {
            *slot = 0;
        }
    }

    /// Teams sorted by descending match points, ties broken by ascending
    /// id, for final-scores reporting.
    pub fn sorted_summaries(&self) -> Vec<TeamSummary> {
        let mut summaries: Vec<TeamSummary> = (0..self.count)
            .map(|id| TeamSummary {
                id,
                name: team_name(id),
                match_points: self.match_points(id),
            })
            .collect();
        summaries.sort_by(|a, b| b.match_points.cmp(&a.match_points).then(a.id.cmp(&b.id)));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_clamps_out_of_range_counts() {
        let mut manager = TeamManager::new();
        manager.configure(true, 10);
        assert_eq!(manager.count(), MAX_TEAM_COUNT);
        manager.configure(true, 0);
        assert_eq!(manager.count(), MIN_TEAM_COUNT);
    }

    #[test]
    fn assign_sequential_round_robins_in_order() {
        let mut manager = TeamManager::new();
        manager.configure(true, 2);
        let ids = vec!["p1".to_string(), "p2".to_string(), "p3".to_string(), "p4".to_string()];
        manager.assign_sequential(&ids);
        assert_eq!(manager.team_of("p1"), Some(0));
        assert_eq!(manager.team_of("p2"), Some(1));
        assert_eq!(manager.team_of("p3"), Some(0));
        assert_eq!(manager.team_of("p4"), Some(1));
    }

    #[test]
    fn add_player_picks_smallest_team() {
        let mut manager = TeamManager::new();
        manager.configure(true, 2);
        manager.assign_sequential(&["p1".to_string(), "p2".to_string()]);
        let assigned = manager.add_player("p3".to_string());
        // Both teams have 1 player; smallest_team ties broken by lowest id.
        assert_eq!(assigned, 0);
    }

    #[test]
    fn cycle_player_team_wraps_around() {
        let mut manager = TeamManager::new();
        manager.configure(true, 2);
        manager.assignments.insert("p1".to_string(), 1);
        assert_eq!(manager.cycle_player_team("p1"), 0);
    }

    #[test]
    fn validate_teams_rejects_empty_team_when_enabled() {
        let mut manager = TeamManager::new();
        manager.configure(true, 3);
        manager.assign_sequential(&["p1".to_string(), "p2".to_string()]);
        assert_eq!(manager.validate_teams(), Err(2));
    }

    #[test]
    fn validate_teams_ignored_when_disabled() {
        let manager = TeamManager::new();
        assert_eq!(manager.validate_teams(), Ok(()));
    }
}
