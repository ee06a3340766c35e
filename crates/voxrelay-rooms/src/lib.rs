//! In-memory room and microphone state for the voxrelay gateway.
//!
//! A room is an isolated group of WebSocket connections sharing microphone
//! and synthesis state, keyed by a caller-supplied code (the session id).
//! This crate owns that state and nothing else: no I/O, no outbound events.
//! Callers receive facts ([`JoinOutcome`], [`Departure`], [`MicDecision`])
//! and turn them into wire messages themselves.
//!
//! All operations are synchronous and guarded by a single mutex. Critical
//! sections are brief `HashMap`/`Vec` operations that never span `.await`
//! points, so a `std::sync::Mutex` is safe and cheaper than an async lock.
//! External service calls (speech synthesis, lip-sync) happen strictly
//! outside the lock; the per-room in-flight flag — not the mutex — is what
//! serializes the synthesis pipeline, so rooms never block each other.

mod mic;
mod registry;

pub use mic::{MicCoordinator, MicDecision, MicRelease};
pub use registry::{
    Departure, JoinOutcome, Participant, RoomExit, RoomRegistry, SynthesisClaim, SynthesisGuard,
};

use uuid::Uuid;

/// Transport-assigned identifier for a physical connection. Opaque to the
/// room core; uniqueness is the transport layer's problem.
pub type ConnectionId = Uuid;
