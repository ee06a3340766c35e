//! Per-room exclusive speaking rights.
//!
//! A room's microphone is a two-state machine: idle, or held by exactly one
//! participant. Grants and releases are atomic with respect to membership
//! changes because the coordinator shares the registry's mutex.

use crate::registry::{lock_rooms, release_holder, RoomRegistry, SharedRooms};
use crate::ConnectionId;

/// Outcome of a hold request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicDecision {
    /// Speaking rights granted (idempotent for the current holder).
    Granted {
        /// Display name of the new (or confirmed) holder.
        display_name: String,
    },
    /// Someone else holds the mic. Reported to the requester only.
    Denied {
        /// Display name of the current holder.
        current_holder: String,
    },
    /// The requester is not a participant of the room (or the room does
    /// not exist), so it cannot hold the mic.
    NotInRoom,
}

/// Outcome of a release request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicRelease {
    /// The holder released the mic; the room is idle again.
    Released {
        /// Display name of the participant that held the mic.
        display_name: String,
    },
    /// The releasing connection was not the holder. A stale release from a
    /// party that already lost the mic must not clobber a new holder's
    /// lock, so this is a silent no-op rather than an error.
    Ignored,
}

/// Per-room speaking-rights state machine, layered on [`RoomRegistry`].
#[derive(Debug, Clone)]
pub struct MicCoordinator {
    rooms: SharedRooms,
}

impl MicCoordinator {
    /// Creates a coordinator sharing the registry's room state.
    pub fn new(registry: &RoomRegistry) -> Self {
        Self {
            rooms: registry.shared(),
        }
    }

    /// Requests exclusive speaking rights in a room.
    ///
    /// Succeeds only when the mic is idle; requesting while already holding
    /// is a no-op success. A denial names the current holder so the caller
    /// can report it to the requester.
    pub fn request_hold(&self, room_code: &str, connection_id: ConnectionId) -> MicDecision {
        let mut rooms = lock_rooms(&self.rooms);
        let Some(room) = rooms.get_mut(room_code) else {
            return MicDecision::NotInRoom;
        };

        let Some(requester) = room
            .participants
            .iter()
            .find(|p| p.connection_id == connection_id)
            .cloned()
        else {
            return MicDecision::NotInRoom;
        };

        match &room.mic_holder {
            None => {
                tracing::info!(
                    room = room_code,
                    user = %requester.display_name,
                    "mic granted"
                );
                let display_name = requester.display_name.clone();
                room.mic_holder = Some(requester);
                MicDecision::Granted { display_name }
            }
            Some(holder) if holder.connection_id == connection_id => MicDecision::Granted {
                display_name: holder.display_name.clone(),
            },
            Some(holder) => {
                tracing::debug!(
                    room = room_code,
                    user = %requester.display_name,
                    holder = %holder.display_name,
                    "mic denied"
                );
                MicDecision::Denied {
                    current_holder: holder.display_name.clone(),
                }
            }
        }
    }

    /// Releases the mic if the given connection holds it.
    ///
    /// This is the explicit-release path; leave and disconnect release
    /// through the same funnel inside [`RoomRegistry::leave`] and
    /// [`RoomRegistry::remove_connection`], so a vanished holder can never
    /// strand the lock. Releasing a mic in a room that no longer exists is
    /// a benign no-op.
    pub fn release(&self, room_code: &str, connection_id: ConnectionId) -> MicRelease {
        let mut rooms = lock_rooms(&self.rooms);
        let Some(room) = rooms.get_mut(room_code) else {
            return MicRelease::Ignored;
        };

        match release_holder(room_code, room, connection_id) {
            Some(display_name) => MicRelease::Released { display_name },
            None => MicRelease::Ignored,
        }
    }

    /// Returns the display name of the current holder, if any.
    pub fn current_holder(&self, room_code: &str) -> Option<String> {
        lock_rooms(&self.rooms)
            .get(room_code)
            .and_then(|room| room.mic_holder.as_ref())
            .map(|holder| holder.display_name.clone())
    }
}
