//! Row types that do not map 1:1 onto a wire model.
//!
//! Rooms, products and user-product links are read straight into the
//! `splitbill_types::models` structs; users and sessions carry columns
//! (password hash, token) that must never leave the store layer unfiltered.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string.
    pub password: String,
}

/// Timestamps are Unix seconds, UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: i64,
    pub user_id: i64,
    pub token: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
}

impl SessionRow {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
