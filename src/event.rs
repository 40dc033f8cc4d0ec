//! The event bus: the only coupling point between the engine and the
//! network layer (§1). Grounded on the teacher's `TickEvent` broadcast
//! pattern (`mtch/mod.rs`, `tick.rs`) — a strongly typed, tagged enum
//! published over a `tokio::sync::broadcast` channel, fanned out
//! synchronously within the tick that raised it.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::base::BaseId;
use crate::gameevent::GameEventKind;
use crate::mode::ModeKind;
use crate::player::{Player, PlayerId};
use crate::team::TeamId;

/// Scores attached to round-end / match-finished events.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub points: u32,
    pub total_points: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamScoreEntry {
    pub team_id: TeamId,
    pub match_points: u32,
}

/// Countdown phase broadcast each second by the round-setup manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPhase {
    Countdown,
    Go,
}

/// Every event the engine can raise. Tagged the same way the teacher tags
/// `TickEvent`/`GameLogBody`, so a transport can serialize this directly
/// onto a WebSocket frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    StartOfTick { tick_id: u64 },
    EndOfTick { tick_id: u64 },

    PlayerJoined { id: PlayerId, name: String, number: u32 },
    PlayerLeft { id: PlayerId },
    PlayerReady { id: PlayerId, is_ready: bool },
    ReadyUpdate { ready: u32, total: u32 },
    ReadyEnabled { enabled: bool },

    GameCountdown { phase: CountdownPhase, seconds_remaining: u32, total_seconds: u32 },
    GameStart { mode: ModeKind, sensitivity: crate::config::SensitivityPreset },
    GameRoundStart { round: u32 },
    RoundEnd { scores: Vec<ScoreEntry>, team_scores: Option<Vec<TeamScoreEntry>> },
    GameFinished { scores: Vec<ScoreEntry>, team_scores: Option<Vec<TeamScoreEntry>> },

    PlayerDamage { id: PlayerId, accumulated_damage: f32 },
    PlayerDied { id: PlayerId },
    PlayerRespawnPending { id: PlayerId, respawn_in_ms: u64 },
    PlayerRespawn { player: Player },

    ModeEvent { mode_name: ModeKind, event_type: GameEventKind, data: serde_json::Value },

    BaseCaptured { base_id: BaseId, team_id: TeamId },
    BasePoint { base_id: BaseId, team_id: TeamId },
    DominationWin { winning_team_id: TeamId },
}

/// Sink trait the engine publishes through. The transport crate supplies
/// the real (broadcast-channel-backed) implementation (§6.1); tests use
/// `RecordingSink`.
pub trait EventSink: Send {
    fn publish(&self, event: EngineEvent);
}

/// Default production sink: fan out over a `broadcast::Sender`. Dropped
/// messages (no subscribers) are not an error — matches the teacher's
/// `tick_tx.send(...).unwrap()` only being a hard error on channel
/// construction issues, not on zero-subscriber sends, since
/// `broadcast::Sender::send` only errors when there are no receivers and
/// we intentionally tolerate running with none (e.g. during tests).
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<EngineEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: EngineEvent) {
        // A send error just means nobody is listening right now.
        let _ = self.sender.send(event);
    }
}

/// Test/debug sink that records every published event for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("recording sink mutex poisoned").clone()
    }

    pub fn clear(&self) {
        self.events.lock().expect("recording sink mutex poisoned").clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: EngineEvent) {
        self.events.lock().expect("recording sink mutex poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_preserves_publish_order() {
        let sink = RecordingSink::new();
        sink.publish(EngineEvent::StartOfTick { tick_id: 0 });
        sink.publish(EngineEvent::EndOfTick { tick_id: 0 });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EngineEvent::StartOfTick { tick_id: 0 }));
        assert!(matches!(events[1], EngineEvent::EndOfTick { tick_id: 0 }));
    }

    #[test]
    fn broadcast_sink_send_without_subscribers_does_not_panic() {
        let (sink, _rx) = BroadcastEventSink::new(8);
        sink.publish(EngineEvent::PlayerLeft { id: "p1".into() });
    }
}
