use rusqlite::{OptionalExtension, params};

use crate::models::SessionRow;
use crate::{Database, DbError};

impl Database {
    /// Inserts a session and stores the token minted for it, atomically.
    ///
    /// The token usually embeds the session id, so it is produced by
    /// `mint_token` after the row exists. If minting fails, the row is rolled
    /// back with everything else.
    pub fn insert_session<F, E>(
        &self,
        user_id: i64,
        created_at: i64,
        expires_at: i64,
        mint_token: F,
    ) -> Result<SessionRow, E>
    where
        F: FnOnce(i64) -> Result<String, E>,
        E: From<DbError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(DbError::from)?;

        tx.execute(
            "INSERT INTO auth_sessions (user_id, created_at, expires_at) VALUES (?1, ?2, ?3)",
            params![user_id, created_at, expires_at],
        )
        .map_err(DbError::from)?;
        let id = tx.last_insert_rowid();

        let token = mint_token(id)?;
        tx.execute(
            "UPDATE auth_sessions SET token = ?1 WHERE id = ?2",
            params![token, id],
        )
        .map_err(DbError::from)?;

        tx.commit().map_err(DbError::from)?;

        Ok(SessionRow {
            id,
            user_id,
            token: Some(token),
            created_at,
            expires_at,
        })
    }

    pub fn find_session_by_token(&self, token: &str) -> Result<Option<SessionRow>, DbError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, token, created_at, expires_at
                     FROM auth_sessions WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(SessionRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            token: row.get(2)?,
                            created_at: row.get(3)?,
                            expires_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Removes sessions whose expiry is at or before `now`. Returns how many went.
    pub fn delete_expired_sessions(&self, now: i64) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM auth_sessions WHERE expires_at <= ?1", [now])?;
            Ok(deleted)
        })
    }
}
