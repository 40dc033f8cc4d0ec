//! Respawn Manager (§2): schedules future respawns with a per-mode delay
//! and honors round-end cutoffs. Grounded on the timer-queue design
//! note in §9 — respawns are just another `TimerTag`, but this module
//! owns the policy (suppress-if-too-late) around scheduling one.

use crate::clock::Millis;
use crate::event::{EngineEvent, EventSink};
use crate::player::PlayerId;
use crate::timer::{TimerQueue, TimerTag};

/// Schedules a respawn for `player_id` at `now + delay`, unless the
/// respawn would land after `round_duration` has elapsed since
/// `round_started_at` — in which case it's suppressed and the player
/// stays dead for the remainder of the round (§8 scenario 3).
///
/// `round_duration` of `None` means the mode has no round cutoff
/// (Domination has no round structure at all).
pub fn schedule_respawn(
    timers: &mut TimerQueue,
    sink: &dyn EventSink,
    player_id: &PlayerId,
    now: Millis,
    delay: Millis,
    round_started_at: Millis,
    round_duration: Option<Millis>,
) -> bool {
    let respawn_at = now + delay;
    if let Some(duration) = round_duration {
        if respawn_at > round_started_at + duration {
            return false;
        }
    }
    timers.schedule(respawn_at, TimerTag::Respawn(player_id.clone()));
    sink.publish(EngineEvent::PlayerRespawnPending {
        id: player_id.clone(),
        respawn_in_ms: delay,
    });
    true
}

/// Cancels any still-pending respawn for a player — used on `Stop()` and
/// when a player is fully removed from the roster.
pub fn cancel_respawn(timers: &mut TimerQueue, player_id: &str) {
    timers.cancel_matching(|tag| matches!(tag, TimerTag::Respawn(id) if id == player_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordingSink;

    #[test]
    fn respawn_within_round_cutoff_is_scheduled() {
        let mut timers = TimerQueue::new();
        let sink = RecordingSink::new();
        let scheduled = schedule_respawn(&mut timers, &sink, &"p1".to_string(), 6_000, 5_000, 0, Some(30_000));
        assert!(scheduled);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn respawn_past_round_cutoff_is_suppressed() {
        let mut timers = TimerQueue::new();
        let sink = RecordingSink::new();
        // round_duration=10_000, kill at t=6_000 with a 5_000ms delay:
        // 6_000 + 5_000 = 11_000 > 10_000, so no respawn this round.
        let scheduled = schedule_respawn(&mut timers, &sink, &"p1".to_string(), 6_000, 5_000, 0, Some(10_000));
        assert!(!scheduled);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_respawn_removes_only_matching_player() {
        let mut timers = TimerQueue::new();
        timers.schedule(1_000, TimerTag::Respawn("p1".to_string()));
        timers.schedule(1_000, TimerTag::Respawn("p2".to_string()));
        cancel_respawn(&mut timers, "p1");
        assert_eq!(timers.len(), 1);
    }
}
