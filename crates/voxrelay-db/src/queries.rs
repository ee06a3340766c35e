//! Query helpers for sessions, avatars, and attendees.

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use voxrelay_types::{Attendee, Avatar, NewAvatar, Session, VoiceRef};

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("session already exists: {0}")]
    DuplicateSession(String),
}

/// Inserts a new session record.
///
/// The session id is caller-supplied (it is handed out to clients as the
/// room code), so a duplicate insert is reported as a distinct error
/// rather than a generic constraint failure.
pub fn insert_session(conn: &Connection, session: &Session) -> Result<(), DbError> {
    let result = conn.execute(
        "INSERT INTO sessions (session_id, job_id, avatar_id) VALUES (?1, ?2, ?3)",
        params![session.session_id, session.job_id, session.avatar_id],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(DbError::DuplicateSession(session.session_id.clone()))
        }
        Err(e) => Err(DbError::Database(e)),
    }
}

/// Retrieves a session by its id, or `None` if it does not exist.
pub fn get_session(conn: &Connection, session_id: &str) -> Result<Option<Session>, DbError> {
    let session = conn
        .query_row(
            "SELECT session_id, job_id, avatar_id FROM sessions WHERE session_id = ?1",
            [session_id],
            |row| {
                Ok(Session {
                    session_id: row.get(0)?,
                    job_id: row.get(1)?,
                    avatar_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(session)
}

/// Resolves the voice configuration for a room code (session id).
///
/// Two-step lookup: session → avatar → (voice_code, avatar_img). Returns
/// `None` when either step finds nothing; an unmapped room is an expected
/// condition, not an error.
pub fn resolve_voice(conn: &Connection, room_code: &str) -> Result<Option<VoiceRef>, DbError> {
    let avatar_id: Option<i64> = conn
        .query_row(
            "SELECT avatar_id FROM sessions WHERE session_id = ?1",
            [room_code],
            |row| row.get(0),
        )
        .optional()?;

    let Some(avatar_id) = avatar_id else {
        return Ok(None);
    };

    let voice = conn
        .query_row(
            "SELECT voice_code, avatar_img FROM avatars WHERE avatar_id = ?1",
            [avatar_id],
            |row| {
                Ok(VoiceRef {
                    voice_code: row.get(0)?,
                    avatar_img: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(voice)
}

/// Creates an avatar record and returns it with the assigned id.
pub fn create_avatar(conn: &Connection, new: &NewAvatar) -> Result<Avatar, DbError> {
    conn.execute(
        "INSERT INTO avatars (avatar_name, avatar_img, voice_code) VALUES (?1, ?2, ?3)",
        params![new.avatar_name, new.avatar_img, new.voice_code],
    )?;

    Ok(Avatar {
        avatar_id: conn.last_insert_rowid(),
        avatar_name: new.avatar_name.clone(),
        avatar_img: new.avatar_img.clone(),
        voice_code: new.voice_code.clone(),
    })
}

/// Retrieves an avatar by id, or `None` if it does not exist.
pub fn get_avatar(conn: &Connection, avatar_id: i64) -> Result<Option<Avatar>, DbError> {
    let avatar = conn
        .query_row(
            "SELECT avatar_id, avatar_name, avatar_img, voice_code FROM avatars WHERE avatar_id = ?1",
            [avatar_id],
            |row| {
                Ok(Avatar {
                    avatar_id: row.get(0)?,
                    avatar_name: row.get(1)?,
                    avatar_img: row.get(2)?,
                    voice_code: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(avatar)
}

/// Lists all avatar records.
pub fn list_avatars(conn: &Connection) -> Result<Vec<Avatar>, DbError> {
    let mut stmt =
        conn.prepare("SELECT avatar_id, avatar_name, avatar_img, voice_code FROM avatars")?;
    let rows = stmt.query_map([], |row| {
        Ok(Avatar {
            avatar_id: row.get(0)?,
            avatar_name: row.get(1)?,
            avatar_img: row.get(2)?,
            voice_code: row.get(3)?,
        })
    })?;

    let mut avatars = Vec::new();
    for avatar in rows {
        avatars.push(avatar?);
    }
    Ok(avatars)
}

/// Bulk-inserts attendee join records inside a single transaction.
pub fn add_attendees(conn: &Connection, attendees: &[Attendee]) -> Result<(), DbError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO attendees (user_name, session_id, join_time, designation)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for attendee in attendees {
            stmt.execute(params![
                attendee.user_name,
                attendee.session_id,
                attendee.join_time,
                attendee.designation,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}
