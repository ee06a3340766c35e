//! Database layer for the voxrelay platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and query helpers for sessions, avatars, and
//! attendee records. The session → voice lookup used by the synthesis
//! pipeline lives here as well.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required. WAL
//!   allows concurrent readers with a single writer, which matches the
//!   relay's access pattern (frequent voice lookups, rare writes).
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, ensuring migrations ship with the server and cannot
//!   drift from the code that depends on them.

mod migrations;
mod pool;
mod queries;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, PoolError, PoolSettings};
pub use queries::{
    add_attendees, create_avatar, get_avatar, get_session, insert_session, list_avatars,
    resolve_voice, DbError,
};
