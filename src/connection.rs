//! Connection Manager (§4.9): player-number allocation/reuse, socket
//! lifecycle, and lobby-disconnect grace.
//!
//! Deviation from a literal reading of §5's "players are owned by the
//! ConnectionManager": this crate keeps player *records* in the engine's
//! `Roster` (the single owned map every other manager already indexes
//! into, mirroring the teacher's `EntityManager`) and has this manager
//! own only the number-allocation pool and grace bookkeeping layered on
//! top. Recorded as a design decision in `DESIGN.md`.

use std::collections::HashMap;

use crate::clock::Millis;
use crate::config::Config;
use crate::event::{EngineEvent, EventSink};
use crate::player::{Player, PlayerId, Roster};
use crate::timer::{TimerQueue, TimerTag};

#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// Player id → assigned number. Retained across normal disconnects
    /// and the lobby-disconnect grace window; released only on `Remove`.
    numbers: HashMap<PlayerId, u32>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lowest_free_number(&self) -> u32 {
        let taken: std::collections::HashSet<u32> = self.numbers.values().copied().collect();
        let mut candidate = 1;
        while taken.contains(&candidate) {
            candidate += 1;
        }
        candidate
    }

    /// §4.9 `Register`: reuses a known id's number; otherwise assigns the
    /// smallest free one ≥ 1.
    pub fn register(
        &mut self,
        roster: &mut Roster,
        id: &str,
        socket_id: String,
        name: String,
        is_bot: bool,
        config: &Config,
        sink: &dyn EventSink,
    ) -> u32 {
        let next = self.lowest_free_number();
        let number = *self.numbers.entry(id.to_string()).or_insert(next);

        if let Some(player) = roster.get_mut(id) {
            player.socket_id = Some(socket_id);
            player.connected = true;
            player.name = name.clone();
        } else {
            let mut player = Player::new(id.to_string(), name.clone(), number, is_bot, config);
            player.socket_id = Some(socket_id);
            roster.insert(player);
        }

        sink.publish(EngineEvent::PlayerJoined { id: id.to_string(), name, number });
        number
    }

    /// §4.9 `HandleSocketDisconnect`: clears ready, marks disconnected,
    /// retains the number for a future reconnect.
    pub fn handle_socket_disconnect(&mut self, roster: &mut Roster, socket_id: &str) {
        let id = roster.iter().find(|p| p.socket_id.as_deref() == Some(socket_id)).map(|p| p.id.clone());
        if let Some(id) = id {
            if let Some(player) = roster.get_mut(&id) {
                player.connected = false;
                player.ready = false;
                player.socket_id = None;
            }
        }
    }

    /// §4.9 `HandleLobbyDisconnect`: same as a socket disconnect, plus a
    /// grace timer after which the player is fully removed.
    pub fn handle_lobby_disconnect(
        &mut self,
        roster: &mut Roster,
        id: &str,
        now: Millis,
        grace_ms: Millis,
        timers: &mut TimerQueue,
    ) {
        self.handle_socket_disconnect_by_id(roster, id);
        timers.schedule(now + grace_ms, TimerTag::LobbyGraceExpired(id.to_string()));
    }

    fn handle_socket_disconnect_by_id(&mut self, roster: &mut Roster, id: &str) {
        if let Some(player) = roster.get_mut(id) {
            player.connected = false;
            player.ready = false;
            player.socket_id = None;
        }
    }

    /// Invoked by the engine when a `LobbyGraceExpired` timer drains: the
    /// player never reconnected within the grace window, so they're fully
    /// removed.
    pub fn on_lobby_grace_expired(&mut self, roster: &mut Roster, id: &str, timers: &mut TimerQueue, sink: &dyn EventSink) {
        self.remove(roster, id, timers, sink);
    }

    /// §4.9 `Remove`: deletes all player state, releases the number,
    /// cancels any pending grace timer.
    pub fn remove(&mut self, roster: &mut Roster, id: &str, timers: &mut TimerQueue, sink: &dyn EventSink) {
        if roster.remove(id).is_some() {
            sink.publish(EngineEvent::PlayerLeft { id: id.to_string() });
        }
        self.numbers.remove(id);
        timers.cancel_matching(|tag| matches!(tag, TimerTag::LobbyGraceExpired(existing) if existing == id));
    }

    /// §4.9 `Kick`: the caller (engine) is responsible for only allowing
    /// this in the `waiting` state; this method itself has no state
    /// opinion.
    pub fn kick(&mut self, roster: &mut Roster, id: &str, timers: &mut TimerQueue, sink: &dyn EventSink) {
        self.remove(roster, id, timers, sink);
    }

    pub fn number_of(&self, id: &str) -> Option<u32> {
        self.numbers.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordingSink;

    fn manager_and_roster() -> (ConnectionManager, Roster, Config) {
        (ConnectionManager::new(), Roster::new(), Config::default())
    }

    #[test]
    fn register_assigns_smallest_free_number() {
        let (mut manager, mut roster, config) = manager_and_roster();
        let sink = RecordingSink::new();
        manager.register(&mut roster, "p1", "s1".into(), "P1".into(), false, &config, &sink);
        let n2 = manager.register(&mut roster, "p2", "s2".into(), "P2".into(), false, &config, &sink);
        assert_eq!(n2, 2);

        manager.remove(&mut roster, "p1", &mut TimerQueue::new(), &sink);
        let n3 = manager.register(&mut roster, "p3", "s3".into(), "P3".into(), false, &config, &sink);
        assert_eq!(n3, 1);
    }

    #[test]
    fn reconnect_within_grace_preserves_number() {
        let (mut manager, mut roster, config) = manager_and_roster();
        let sink = RecordingSink::new();
        let number = manager.register(&mut roster, "p1", "s1".into(), "P1".into(), false, &config, &sink);

        let mut timers = TimerQueue::new();
        manager.handle_lobby_disconnect(&mut roster, "p1", 0, 5_000, &mut timers);
        assert!(!roster.get("p1").unwrap().connected);

        let reconnect_number = manager.register(&mut roster, "p1", "s1-new".into(), "P1".into(), false, &config, &sink);
        assert_eq!(reconnect_number, number);
        assert!(roster.get("p1").unwrap().connected);
    }

    #[test]
    fn remove_releases_number_and_cancels_grace_timer() {
        let (mut manager, mut roster, config) = manager_and_roster();
        let sink = RecordingSink::new();
        manager.register(&mut roster, "p1", "s1".into(), "P1".into(), false, &config, &sink);

        let mut timers = TimerQueue::new();
        manager.handle_lobby_disconnect(&mut roster, "p1", 0, 5_000, &mut timers);
        manager.remove(&mut roster, "p1", &mut timers, &sink);

        assert!(timers.is_empty());
        assert_eq!(manager.number_of("p1"), None);
        assert!(!roster.contains("p1"));
    }
}
