//! Ownership and membership checks.
//!
//! Existence and ownership are reported separately so callers can answer
//! 404 and 403 distinctly. The checks only read; they are run on whatever
//! connection the caller already holds, which lets the batch engine check
//! ownership on the same connection it is about to open its transaction on.

use rusqlite::{Connection, OptionalExtension, params};

use crate::{Database, DbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    NotFound,
    Forbidden,
}

impl Access {
    /// Converts a decision into the error the caller should propagate.
    pub fn require(self, resource: &'static str) -> Result<(), DbError> {
        match self {
            Self::Allow => Ok(()),
            Self::NotFound => Err(DbError::NotFound(resource)),
            Self::Forbidden => Err(DbError::Forbidden(resource)),
        }
    }

    fn from_owner(owner_id: Option<i64>, user_id: i64) -> Self {
        match owner_id {
            None => Self::NotFound,
            Some(owner) if owner == user_id => Self::Allow,
            Some(_) => Self::Forbidden,
        }
    }
}

pub fn room_ownership(conn: &Connection, user_id: i64, room_id: i64) -> Result<Access, DbError> {
    let owner = conn
        .query_row(
            "SELECT owner_id FROM rooms WHERE id = ?1",
            [room_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(Access::from_owner(owner, user_id))
}

/// Non-members get `NotFound`, not `Forbidden`: membership is what makes a
/// room visible in the first place.
pub fn room_membership(conn: &Connection, user_id: i64, room_id: i64) -> Result<Access, DbError> {
    let member = conn
        .query_row(
            "SELECT 1 FROM user_rooms WHERE user_id = ?1 AND room_id = ?2",
            params![user_id, room_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(if member.is_some() {
        Access::Allow
    } else {
        Access::NotFound
    })
}

pub fn product_ownership(
    conn: &Connection,
    user_id: i64,
    product_id: i64,
) -> Result<Access, DbError> {
    let owner = conn
        .query_row(
            "SELECT r.owner_id
             FROM products p
             JOIN rooms r ON r.id = p.room_id
             WHERE p.id = ?1",
            [product_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(Access::from_owner(owner, user_id))
}

pub fn user_product_ownership(
    conn: &Connection,
    user_id: i64,
    user_product_id: i64,
) -> Result<Access, DbError> {
    let owner = conn
        .query_row(
            "SELECT r.owner_id
             FROM user_products up
             JOIN products p ON p.id = up.product_id
             JOIN rooms r ON r.id = p.room_id
             WHERE up.id = ?1",
            [user_product_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(Access::from_owner(owner, user_id))
}

impl Database {
    pub fn check_room_ownership(&self, user_id: i64, room_id: i64) -> Result<Access, DbError> {
        self.with_conn(|conn| room_ownership(conn, user_id, room_id))
    }

    pub fn check_room_membership(&self, user_id: i64, room_id: i64) -> Result<Access, DbError> {
        self.with_conn(|conn| room_membership(conn, user_id, room_id))
    }

    pub fn check_product_ownership(
        &self,
        user_id: i64,
        product_id: i64,
    ) -> Result<Access, DbError> {
        self.with_conn(|conn| product_ownership(conn, user_id, product_id))
    }

    pub fn check_user_product_ownership(
        &self,
        user_id: i64,
        user_product_id: i64,
    ) -> Result<Access, DbError> {
        self.with_conn(|conn| user_product_ownership(conn, user_id, user_product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, db};

    fn seeded() -> Database {
        let db = db();
        test_support::user(&db, 7);
        test_support::user(&db, 8);
        test_support::room(&db, 1, 7, "Flat");
        test_support::product(&db, 9, 1, "Pizza", 1200);
        test_support::link(&db, 9, 8, "UNPAID");
        db
    }

    #[test]
    fn owner_is_allowed() {
        let db = seeded();
        assert_eq!(db.check_room_ownership(7, 1).unwrap(), Access::Allow);
        assert_eq!(db.check_product_ownership(7, 9).unwrap(), Access::Allow);
    }

    #[test]
    fn other_users_are_never_allowed_to_mutate() {
        let db = seeded();
        for other in [8, 42] {
            assert_eq!(db.check_room_ownership(other, 1).unwrap(), Access::Forbidden);
            assert_eq!(db.check_product_ownership(other, 9).unwrap(), Access::Forbidden);
        }
    }

    #[test]
    fn missing_resources_are_not_found() {
        let db = seeded();
        assert_eq!(db.check_room_ownership(7, 99).unwrap(), Access::NotFound);
        assert_eq!(db.check_product_ownership(7, 99).unwrap(), Access::NotFound);
        assert_eq!(db.check_user_product_ownership(7, 99).unwrap(), Access::NotFound);
    }

    #[test]
    fn membership_grants_read_but_not_ownership() {
        let db = seeded();
        db.join_room(8, 1).unwrap();

        assert_eq!(db.check_room_membership(8, 1).unwrap(), Access::Allow);
        assert_eq!(db.check_room_ownership(8, 1).unwrap(), Access::Forbidden);
    }

    #[test]
    fn non_members_cannot_see_the_room() {
        let db = seeded();
        assert_eq!(db.check_room_membership(8, 1).unwrap(), Access::NotFound);
        assert_eq!(db.check_room_membership(7, 1).unwrap(), Access::Allow);
    }

    #[test]
    fn link_ownership_resolves_through_the_room() {
        let db = seeded();
        let link_id: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT id FROM user_products WHERE product_id = 9 AND user_id = 8",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();

        assert_eq!(db.check_user_product_ownership(7, link_id).unwrap(), Access::Allow);
        // The debtor is linked to the product but does not own the room.
        assert_eq!(db.check_user_product_ownership(8, link_id).unwrap(), Access::Forbidden);
    }

    #[test]
    fn require_maps_decisions_to_errors() {
        assert!(Access::Allow.require("room").is_ok());
        assert!(matches!(Access::NotFound.require("room"), Err(DbError::NotFound("room"))));
        assert!(matches!(Access::Forbidden.require("room"), Err(DbError::Forbidden("room"))));
    }
}
