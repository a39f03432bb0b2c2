//! Room registry.
//!
//! An explicit, passable object owning every live room: no process-global
//! maps. Each room is an `Arc<Mutex<RoomSession>>` plus a broadcast channel
//! for its `ServerMessage` fan-out. Locking a room's mutex serializes all
//! message handling for that room; rooms stay fully independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use ludovault_execution::DiceRng;
use ludovault_types::{CreateRoomRequest, PlayerSeat, RoomRecord, RoomStatus, ServerMessage};

use crate::session::RoomSession;

/// Messages buffered per subscriber before a slow client starts lagging.
const ROOM_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct RoomHandle {
    pub session: Arc<Mutex<RoomSession>>,
    pub events: broadcast::Sender<ServerMessage>,
}

pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    max_skips: u8,
}

impl RoomRegistry {
    pub fn new(max_skips: u8) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            max_skips,
        }
    }

    /// Create a `Waiting` room with the creator seated at slot 0 and,
    /// optionally, AI opponents filling the rest of the roster.
    pub fn create(
        &self,
        request: &CreateRoomRequest,
        now_ms: u64,
    ) -> Result<String, &'static str> {
        if !(2..=4).contains(&request.max_players) {
            return Err("maxPlayers must be 2-4");
        }
        if request.creator_address.is_empty() {
            return Err("creatorAddress is required");
        }

        let id = Uuid::new_v4().to_string();
        let mut seats = vec![PlayerSeat::human(
            request.creator_address.clone(),
            request.creator_name.clone(),
            0,
        )];
        if request.ai_opponents {
            for slot in 1..request.max_players {
                seats.push(PlayerSeat::ai(slot));
            }
        }
        let record = RoomRecord {
            id: id.clone(),
            status: RoomStatus::Waiting,
            stake: request.stake,
            max_players: request.max_players,
            created_at_ms: now_ms,
            seats,
        };
        let session = RoomSession::new(record, DiceRng::from_entropy(), self.max_skips, now_ms);
        let (events, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        let handle = RoomHandle {
            session: Arc::new(Mutex::new(session)),
            events,
        };

        self.rooms
            .lock()
            .expect("room registry poisoned")
            .insert(id.clone(), handle);
        info!(room = %id, stake = request.stake, players = request.max_players, "room created");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .expect("room registry poisoned")
            .get(id)
            .cloned()
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms
            .lock()
            .expect("room registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Mark a room cancelled and stop its scheduling; the next sweep frees
    /// it. Finished rooms are left alone so payout claims keep working.
    pub fn cancel(&self, id: &str) -> bool {
        let Some(handle) = self.get(id) else {
            return false;
        };
        let mut session = handle.session.lock().expect("room session poisoned");
        if session.record.status == RoomStatus::Finished {
            return false;
        }
        session.record.status = RoomStatus::Cancelled;
        session.teardown();
        info!(room = %id, "room cancelled");
        true
    }

    /// Tear a room down: cancel its timers and release it.
    pub fn destroy(&self, id: &str) -> bool {
        let handle = self
            .rooms
            .lock()
            .expect("room registry poisoned")
            .remove(id);
        match handle {
            Some(handle) => {
                if let Ok(mut session) = handle.session.lock() {
                    session.teardown();
                }
                info!(room = %id, "room destroyed");
                true
            }
            None => false,
        }
    }

    /// Periodic garbage collection: destroy every room whose lifecycle
    /// predicate says it is done. Returns the destroyed ids for logging.
    pub fn sweep(
        &self,
        now_ms: u64,
        waiting_max_age_ms: u64,
        abandoned_active_ms: u64,
    ) -> Vec<String> {
        let candidates: Vec<String> = {
            let rooms = self.rooms.lock().expect("room registry poisoned");
            rooms
                .iter()
                .filter(|(_, handle)| {
                    handle
                        .session
                        .lock()
                        .map(|session| {
                            session.should_cleanup(now_ms, waiting_max_age_ms, abandoned_active_ms)
                        })
                        .unwrap_or(true)
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &candidates {
            self.destroy(id);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(ai: bool) -> CreateRoomRequest {
        CreateRoomRequest {
            creator_address: "0xaaa111".into(),
            creator_name: "alice".into(),
            stake: 100,
            max_players: 2,
            ai_opponents: ai,
        }
    }

    #[test]
    fn test_create_and_get_room() {
        let registry = RoomRegistry::new(3);
        let id = registry.create(&request(false), 1_000).unwrap();
        let handle = registry.get(&id).unwrap();
        let session = handle.session.lock().unwrap();
        assert_eq!(session.record.status, RoomStatus::Waiting);
        assert_eq!(session.record.seats.len(), 1);
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_create_validates_request() {
        let registry = RoomRegistry::new(3);
        let mut bad = request(false);
        bad.max_players = 1;
        assert!(registry.create(&bad, 0).is_err());
        let mut bad = request(false);
        bad.max_players = 5;
        assert!(registry.create(&bad, 0).is_err());
        let mut bad = request(false);
        bad.creator_address.clear();
        assert!(registry.create(&bad, 0).is_err());
    }

    #[test]
    fn test_ai_fill_completes_roster() {
        let registry = RoomRegistry::new(3);
        let id = registry.create(&request(true), 1_000).unwrap();
        let handle = registry.get(&id).unwrap();
        let session = handle.session.lock().unwrap();
        assert_eq!(session.record.seats.len(), 2);
        assert!(session.record.seats[1].is_ai);
    }

    #[test]
    fn test_cancel_marks_room_for_sweep() {
        let registry = RoomRegistry::new(3);
        let id = registry.create(&request(false), 1_000).unwrap();
        assert!(registry.cancel(&id));
        let handle = registry.get(&id).unwrap();
        assert_eq!(
            handle.session.lock().unwrap().record.status,
            RoomStatus::Cancelled
        );
        drop(handle);
        // Cancelled rooms are collected unconditionally.
        let removed = registry.sweep(1_001, 300_000, 120_000);
        assert_eq!(removed, vec![id]);
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn test_destroy_removes_room() {
        let registry = RoomRegistry::new(3);
        let id = registry.create(&request(false), 1_000).unwrap();
        assert!(registry.destroy(&id));
        assert!(registry.get(&id).is_none());
        assert!(!registry.destroy(&id));
    }

    #[test]
    fn test_sweep_collects_stale_waiting_rooms() {
        let registry = RoomRegistry::new(3);
        let stale = registry.create(&request(false), 0).unwrap();
        let fresh = registry.create(&request(false), 250_000).unwrap();
        let removed = registry.sweep(300_000, 300_000, 120_000);
        assert_eq!(removed, vec![stale.clone()]);
        assert!(registry.get(&stale).is_none());
        assert!(registry.get(&fresh).is_some());
    }
}
