//! Base Manager (§4.11): Domination control-point devices. Grounded on
//! the teacher's lowest-free-number allocation idiom used for player
//! numbering (`connection.rs`), reapplied here to physical base devices.

use std::collections::HashMap;

use serde::Serialize;

use crate::clock::Millis;
use crate::team::TeamId;

pub type BaseId = String;

/// §3: a Domination control-point device bound to a dedicated socket.
#[derive(Debug, Clone, Serialize)]
pub struct Base {
    pub id: BaseId,
    pub number: u32,
    pub socket_id: String,
    pub owner_team: Option<TeamId>,
    pub captured_at: Option<Millis>,
    pub connected: bool,
}

/// Registry of Domination bases. Disconnected bases are retained (so a
/// reconnect can resume ownership) but are excluded from scoring and
/// reject taps until their socket comes back.
#[derive(Debug, Default)]
pub struct BaseManager {
    bases: HashMap<BaseId, Base>,
}

impl BaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// §4.11: register a base by its socket, reusing the lowest free
    /// number. Re-registering an already-known socket reconnects the
    /// existing base rather than minting a new id.
    pub fn register(&mut self, id: BaseId, socket_id: String) -> &Base {
        if let Some(existing_id) = self.id_for_socket(&socket_id) {
            if existing_id != id {
                // Socket moved under a new logical id; drop the stale entry.
                self.bases.remove(&existing_id);
            }
        }

        let number = self.lowest_free_number();
        self.bases.entry(id.clone()).or_insert_with(|| Base {
            id: id.clone(),
            number,
            socket_id: socket_id.clone(),
            owner_team: None,
            captured_at: None,
            connected: true,
        });
        if let Some(base) = self.bases.get_mut(&id) {
            base.socket_id = socket_id;
            base.connected = true;
        }
        self.bases.get(&id).expect("just inserted")
    }

    fn id_for_socket(&self, socket_id: &str) -> Option<BaseId> {
        self.bases
            .values()
            .find(|b| b.socket_id == socket_id)
            .map(|b| b.id.clone())
    }

    fn lowest_free_number(&self) -> u32 {
        let taken: std::collections::HashSet<u32> = self.bases.values().map(|b| b.number).collect();
        let mut candidate = 1;
        while taken.contains(&candidate) {
            candidate += 1;
        }
        candidate
    }

    pub fn mark_disconnected(&mut self, socket_id: &str) {
        if let Some(base) = self.bases.values_mut().find(|b| b.socket_id == socket_id) {
            base.connected = false;
        }
    }

    /// Purges a base whose socket is gone for good (distinct from a
    /// transient disconnect) — releases its number for reuse.
    pub fn remove(&mut self, id: &str) -> Option<Base> {
        self.bases.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Base> {
        self.bases.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Base> {
        self.bases.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Base> {
        self.bases.values_mut()
    }

    /// §4.11 capture cycle: neutral → tapping team → opposite team → ...
    /// Rejects taps against a disconnected base. Returns `true` if
    /// ownership changed.
    pub fn tap(&mut self, id: &str, tapping_team: TeamId, now: Millis) -> bool {
        let Some(base) = self.bases.get_mut(id) else { return false };
        if !base.connected {
            return false;
        }
        let changed = base.owner_team != Some(tapping_team);
        base.owner_team = Some(tapping_team);
        base.captured_at = Some(now);
        changed
    }

    pub fn clear(&mut self) {
        self.bases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_lowest_free_number() {
        let mut manager = BaseManager::new();
        manager.register("b1".to_string(), "sock1".to_string());
        manager.register("b2".to_string(), "sock2".to_string());
        manager.remove("b1");
        manager.register("b3".to_string(), "sock3".to_string());
        assert_eq!(manager.get("b3").unwrap().number, 1);
    }

    #[test]
    fn disconnected_bases_reject_taps() {
        let mut manager = BaseManager::new();
        manager.register("b1".to_string(), "sock1".to_string());
        manager.mark_disconnected("sock1");
        assert!(!manager.tap("b1", 0, 1_000));
        assert_eq!(manager.get("b1").unwrap().owner_team, None);
    }

    #[test]
    fn tap_cycles_ownership() {
        let mut manager = BaseManager::new();
        manager.register("b1".to_string(), "sock1".to_string());
        assert!(manager.tap("b1", 0, 0));
        assert_eq!(manager.get("b1").unwrap().owner_team, Some(0));
        assert!(manager.tap("b1", 1, 100));
        assert_eq!(manager.get("b1").unwrap().owner_team, Some(1));
        assert!(manager.tap("b1", 0, 200));
        assert_eq!(manager.get("b1").unwrap().owner_team, Some(0));
    }
}
