//! Room membership registry and the per-room synthesis in-flight flag.

use crate::ConnectionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A participant in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// The physical connection this participant arrived on.
    pub connection_id: ConnectionId,
    /// Caller-supplied display name, unique within a room by convention.
    pub display_name: String,
}

/// A live room. Exists only while it has participants.
#[derive(Debug, Default)]
pub(crate) struct Room {
    /// Participants in join order.
    pub(crate) participants: Vec<Participant>,
    /// The participant currently holding exclusive speaking rights.
    pub(crate) mic_holder: Option<Participant>,
    /// True while a transcription is being synthesized for this room.
    pub(crate) synthesis_in_flight: bool,
}

pub(crate) type SharedRooms = Arc<Mutex<HashMap<String, Room>>>;

/// Locks the shared room map, recovering the inner state if a previous
/// holder panicked. Nothing in this crate can leave the map in a torn
/// state, so recovery is always safe.
pub(crate) fn lock_rooms(rooms: &SharedRooms) -> MutexGuard<'_, HashMap<String, Room>> {
    rooms.lock().unwrap_or_else(|e| e.into_inner())
}

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The participant was added (the room may have been created for them).
    Joined,
    /// A participant with this display name was already present; the call
    /// was a no-op. Tolerates reconnect races without duplicate membership.
    Rejoined,
}

/// Facts reported when a participant leaves a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Display name of the departed participant.
    pub display_name: String,
    /// True if the room became empty and was deleted.
    pub room_deleted: bool,
    /// Display name of the mic holder, when the departing connection held
    /// the mic and it was released as part of this departure.
    pub mic_released: Option<String>,
}

/// A departure discovered during connection-wide cleanup, qualified with
/// the room it happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomExit {
    pub room_code: String,
    pub display_name: String,
    pub room_deleted: bool,
    /// Set when the disconnected connection held this room's mic.
    pub mic_released: Option<String>,
}

/// Releases the room's mic if the given connection holds it, returning the
/// holder's display name. The single release funnel: explicit release,
/// leave, and disconnect cleanup all pass through here, inside whatever
/// critical section the caller already holds, so a membership change and
/// its mic release are one atomic transition.
pub(crate) fn release_holder(
    room_code: &str,
    room: &mut Room,
    connection_id: ConnectionId,
) -> Option<String> {
    match room.mic_holder.take() {
        Some(holder) if holder.connection_id == connection_id => {
            tracing::info!(room = room_code, user = %holder.display_name, "mic released");
            Some(holder.display_name)
        }
        other => {
            room.mic_holder = other;
            None
        }
    }
}

/// Outcome of attempting to claim the synthesis pipeline for a room.
#[derive(Debug)]
pub enum SynthesisClaim {
    /// The pipeline is claimed; drop the guard to release it.
    Started(SynthesisGuard),
    /// A synthesis operation is already in flight for this room.
    Busy,
    /// The room does not exist.
    RoomNotFound,
}

/// RAII claim on a room's synthesis pipeline.
///
/// Clears the room's in-flight flag on drop, on every path out of the
/// pipeline — success, failure, timeout, or panic. If the room was deleted
/// while synthesis ran, the drop is a no-op.
#[derive(Debug)]
pub struct SynthesisGuard {
    rooms: SharedRooms,
    room_code: String,
}

impl Drop for SynthesisGuard {
    fn drop(&mut self) {
        let mut rooms = lock_rooms(&self.rooms);
        if let Some(room) = rooms.get_mut(&self.room_code) {
            room.synthesis_in_flight = false;
        }
    }
}

/// Owns the set of live rooms and their participants.
///
/// Rooms are created lazily on first join and deleted synchronously the
/// moment their participant set becomes empty — an empty room never
/// exists in the registry.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: SharedRooms,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(&self) -> SharedRooms {
        Arc::clone(&self.rooms)
    }

    /// Adds a participant to a room, creating the room if absent.
    ///
    /// If a participant with the same display name is already present the
    /// call is idempotent: existing state is untouched and [`JoinOutcome::Rejoined`]
    /// tells the caller to skip duplicate-join side effects.
    pub fn join(
        &self,
        room_code: &str,
        connection_id: ConnectionId,
        display_name: &str,
    ) -> JoinOutcome {
        let mut rooms = lock_rooms(&self.rooms);
        let room = rooms.entry(room_code.to_string()).or_default();

        if room
            .participants
            .iter()
            .any(|p| p.display_name == display_name)
        {
            tracing::debug!(room = room_code, user = display_name, "rejoin, no-op");
            return JoinOutcome::Rejoined;
        }

        room.participants.push(Participant {
            connection_id,
            display_name: display_name.to_string(),
        });
        tracing::info!(room = room_code, user = display_name, "participant joined");
        JoinOutcome::Joined
    }

    /// Removes a connection from a room, releasing the mic if that
    /// connection held it. Membership removal and mic release happen in
    /// one critical section, so no other request can observe a mic held
    /// by a participant who has already left.
    ///
    /// Returns `None` if the room does not exist or the connection is not a
    /// participant. Deletes the room when the last participant leaves and
    /// reports that fact so callers can stop tracking derived state.
    pub fn leave(&self, room_code: &str, connection_id: ConnectionId) -> Option<Departure> {
        let mut rooms = lock_rooms(&self.rooms);
        let room = rooms.get_mut(room_code)?;

        let idx = room
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        let departed = room.participants.remove(idx);
        let mic_released = release_holder(room_code, room, connection_id);

        let room_deleted = room.participants.is_empty();
        if room_deleted {
            rooms.remove(room_code);
            tracing::info!(room = room_code, "room empty, deleted");
        }

        Some(Departure {
            display_name: departed.display_name,
            room_deleted,
            mic_released,
        })
    }

    /// Removes a connection from every room it appears in, releasing any
    /// mic it held, all under one lock acquisition.
    ///
    /// Used on transport disconnect, which carries no room code. In practice
    /// a connection is in exactly one room, but the cleanup tolerates a
    /// connection erroneously present in several.
    pub fn remove_connection(&self, connection_id: ConnectionId) -> Vec<RoomExit> {
        let mut rooms = lock_rooms(&self.rooms);
        let mut exits = Vec::new();

        rooms.retain(|room_code, room| {
            let Some(idx) = room
                .participants
                .iter()
                .position(|p| p.connection_id == connection_id)
            else {
                return true;
            };
            let departed = room.participants.remove(idx);
            let mic_released = release_holder(room_code, room, connection_id);
            let room_deleted = room.participants.is_empty();

            exits.push(RoomExit {
                room_code: room_code.clone(),
                display_name: departed.display_name,
                room_deleted,
                mic_released,
            });
            !room_deleted
        });

        exits
    }

    /// Returns the participants of a room in join order, or an empty list
    /// if the room does not exist.
    pub fn participants(&self, room_code: &str) -> Vec<Participant> {
        let rooms = lock_rooms(&self.rooms);
        rooms
            .get(room_code)
            .map(|room| room.participants.clone())
            .unwrap_or_default()
    }

    /// Returns true if the room currently exists.
    pub fn room_exists(&self, room_code: &str) -> bool {
        lock_rooms(&self.rooms).contains_key(room_code)
    }

    /// Atomically claims the synthesis pipeline for a room.
    ///
    /// At most one claim can be outstanding per room; a second transcription
    /// cannot start until the first claim's guard is dropped. Claims on
    /// different rooms are independent.
    pub fn begin_synthesis(&self, room_code: &str) -> SynthesisClaim {
        let mut rooms = lock_rooms(&self.rooms);
        let Some(room) = rooms.get_mut(room_code) else {
            return SynthesisClaim::RoomNotFound;
        };

        if room.synthesis_in_flight {
            return SynthesisClaim::Busy;
        }

        room.synthesis_in_flight = true;
        SynthesisClaim::Started(SynthesisGuard {
            rooms: self.shared(),
            room_code: room_code.to_string(),
        })
    }

    /// Returns the room's in-flight flag. False for unknown rooms.
    pub fn synthesis_in_flight(&self, room_code: &str) -> bool {
        lock_rooms(&self.rooms)
            .get(room_code)
            .map(|room| room.synthesis_in_flight)
            .unwrap_or(false)
    }
}
