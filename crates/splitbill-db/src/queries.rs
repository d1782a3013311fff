use rusqlite::{Connection, OptionalExtension, Row, params};

use splitbill_types::api::{ListQuery, ProductSort, RoomSort, UserDebts};
use splitbill_types::models::{PaymentStatus, Product, Room, UserProduct};

use crate::models::UserRow;
use crate::{Database, DbError};

// ORDER BY columns come from these tables only. Client input selects an enum
// variant; it is never spliced into SQL.

fn room_sort_column(sort: RoomSort) -> &'static str {
    match sort {
        RoomSort::Id => "r.id",
        RoomSort::Name => "r.name",
        RoomSort::OwnerId => "r.owner_id",
    }
}

fn product_sort_column(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Id => "p.id",
        ProductSort::Name => "p.name",
        ProductSort::Price => "p.price",
        ProductSort::RoomId => "p.room_id",
    }
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        full_name: &str,
        photo_url: &str,
    ) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, full_name, photo_url) VALUES (?1, ?2, ?3, ?4)",
                params![username, password_hash, full_name, photo_url],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, username, password FROM users WHERE username = ?1",
                    [username],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Rooms --

    /// Creates a room and records the creator as its first member.
    pub fn create_room(&self, owner_id: i64, name: &str) -> Result<Room, DbError> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO rooms (name, owner_id) VALUES (?1, ?2)",
                params![name, owner_id],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO user_rooms (user_id, room_id) VALUES (?1, ?2)",
                params![owner_id, id],
            )?;
            Ok(Room {
                id,
                name: name.to_string(),
                owner_id,
            })
        })
    }

    pub fn get_room(&self, room_id: i64) -> Result<Option<Room>, DbError> {
        self.with_conn(|conn| query_room(conn, room_id))
    }

    /// Rooms the user belongs to, plus the total count for paging.
    pub fn list_rooms_for_member(
        &self,
        user_id: i64,
        query: &ListQuery<RoomSort>,
    ) -> Result<(Vec<Room>, i64), DbError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM user_rooms WHERE user_id = ?1",
                [user_id],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT r.id, r.name, r.owner_id
                 FROM rooms r
                 JOIN user_rooms ur ON ur.room_id = r.id
                 WHERE ur.user_id = ?1
                 ORDER BY {}, r.id
                 LIMIT ?2 OFFSET ?3",
                room_sort_column(query.order_by)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rooms = stmt
                .query_map(params![user_id, query.limit(), query.offset()], room_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok((rooms, total))
        })
    }

    /// Adds a membership. Returns `false` when the user was already a member.
    pub fn join_room(&self, user_id: i64, room_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user_rooms (user_id, room_id) VALUES (?1, ?2)",
                params![user_id, room_id],
            )?;
            Ok(inserted == 1)
        })
    }

    // -- Products --

    pub fn insert_product(&self, room_id: i64, name: &str, price: i64) -> Result<Product, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (name, price, room_id) VALUES (?1, ?2, ?3)",
                params![name, price, room_id],
            )?;
            Ok(Product {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                price,
                room_id,
            })
        })
    }

    pub fn get_product(&self, product_id: i64) -> Result<Option<Product>, DbError> {
        self.with_conn(|conn| {
            let product = conn
                .query_row(
                    "SELECT p.id, p.name, p.price, p.room_id FROM products p WHERE p.id = ?1",
                    [product_id],
                    product_from_row,
                )
                .optional()?;
            Ok(product)
        })
    }

    /// Products the user is linked to, plus the total count for paging.
    pub fn list_products_for_user(
        &self,
        user_id: i64,
        query: &ListQuery<ProductSort>,
    ) -> Result<(Vec<Product>, i64), DbError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM user_products WHERE user_id = ?1",
                [user_id],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT p.id, p.name, p.price, p.room_id
                 FROM products p
                 JOIN user_products up ON up.product_id = p.id
                 WHERE up.user_id = ?1
                 ORDER BY {}, p.id
                 LIMIT ?2 OFFSET ?3",
                product_sort_column(query.order_by)
            );
            let mut stmt = conn.prepare(&sql)?;
            let products = stmt
                .query_map(params![user_id, query.limit(), query.offset()], product_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok((products, total))
        })
    }

    /// Deletes a product; its links go with it (ON DELETE CASCADE).
    pub fn delete_product(&self, product_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM products WHERE id = ?1", [product_id])?;
            Ok(deleted == 1)
        })
    }

    // -- User products --

    pub fn insert_user_product(
        &self,
        product_id: i64,
        user_id: i64,
        status: PaymentStatus,
    ) -> Result<UserProduct, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_products (product_id, user_id, status) VALUES (?1, ?2, ?3)",
                params![product_id, user_id, status.as_str()],
            )?;
            Ok(UserProduct {
                id: conn.last_insert_rowid(),
                product_id,
                user_id,
                status,
            })
        })
    }

    pub fn set_user_product_status(
        &self,
        user_product_id: i64,
        status: PaymentStatus,
    ) -> Result<Option<UserProduct>, DbError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE user_products SET status = ?1 WHERE id = ?2",
                params![status.as_str(), user_product_id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            let link = conn.query_row(
                "SELECT id, product_id, user_id, status FROM user_products WHERE id = ?1",
                [user_product_id],
                user_product_from_row,
            )?;
            Ok(Some(link))
        })
    }

    pub fn list_user_products_for_room(&self, room_id: i64) -> Result<Vec<UserProduct>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT up.id, up.product_id, up.user_id, up.status
                 FROM user_products up
                 JOIN products p ON p.id = up.product_id
                 WHERE p.room_id = ?1
                 ORDER BY up.user_id, up.product_id",
            )?;
            let links = stmt
                .query_map([room_id], user_product_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(links)
        })
    }

    /// For each user with at least one link in the room, the products they are linked to.
    pub fn room_debts(&self, room_id: i64) -> Result<Vec<UserDebts>, DbError> {
        let links = self.list_user_products_for_room(room_id)?;

        let mut debts: Vec<UserDebts> = Vec::new();
        // Links arrive ordered by user, so each user's products are contiguous.
        for link in links {
            if let Some(entry) = debts.last_mut().filter(|e| e.user_id == link.user_id) {
                entry.product_ids.push(link.product_id);
                continue;
            }
            debts.push(UserDebts {
                user_id: link.user_id,
                product_ids: vec![link.product_id],
            });
        }
        Ok(debts)
    }

    /// Products `user_id` is linked to, limited to rooms `viewer_id` belongs to.
    pub fn visible_products_of_user(
        &self,
        viewer_id: i64,
        user_id: i64,
    ) -> Result<Vec<i64>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT up.product_id
                 FROM user_products up
                 JOIN products p ON p.id = up.product_id
                 JOIN user_rooms ur ON ur.room_id = p.room_id AND ur.user_id = ?1
                 WHERE up.user_id = ?2
                 ORDER BY up.product_id",
            )?;
            let ids = stmt
                .query_map(params![viewer_id, user_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_room(conn: &Connection, room_id: i64) -> Result<Option<Room>, DbError> {
    let room = conn
        .query_row(
            "SELECT r.id, r.name, r.owner_id FROM rooms r WHERE r.id = ?1",
            [room_id],
            room_from_row,
        )
        .optional()?;
    Ok(room)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
    })
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
    })
}

pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
        room_id: row.get(3)?,
    })
}

pub(crate) fn user_product_from_row(row: &Row<'_>) -> rusqlite::Result<UserProduct> {
    let status: String = row.get(3)?;
    let status = status.parse::<PaymentStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(UserProduct {
        id: row.get(0)?,
        product_id: row.get(1)?,
        user_id: row.get(2)?,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, db};

    #[test]
    fn user_lookup_returns_credentials_only() {
        let db = db();
        let id = db
            .create_user("alice", "$argon2id$stub", "Alice A.", "https://x/a.png")
            .unwrap();

        let row = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!((row.id, row.username.as_str(), row.password.as_str()), (id, "alice", "$argon2id$stub"));
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn creating_a_room_makes_the_owner_a_member() {
        let db = db();
        let owner = db.create_user("alice", "hash", "", "").unwrap();
        let room = db.create_room(owner, "Flat").unwrap();

        assert_eq!(room.owner_id, owner);
        assert_eq!(db.get_room(room.id).unwrap(), Some(room.clone()));
        assert!(!db.join_room(owner, room.id).unwrap(), "owner is already a member");
    }

    #[test]
    fn duplicate_usernames_conflict() {
        let db = db();
        db.create_user("alice", "hash", "", "").unwrap();
        let err = db.create_user("alice", "other", "", "").unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn joining_a_missing_room_is_an_invalid_reference() {
        let db = db();
        test_support::user(&db, 1);
        let err = db.join_room(1, 9999).unwrap_err();
        assert!(matches!(err, DbError::InvalidReference(_)), "{err:?}");
    }

    #[test]
    fn product_names_are_unique_per_room() {
        let db = db();
        test_support::user(&db, 1);
        test_support::room(&db, 1, 1, "a");
        test_support::room(&db, 2, 1, "b");

        db.insert_product(1, "Pizza", 1200).unwrap();
        db.insert_product(2, "Pizza", 1200).unwrap();
        let err = db.insert_product(1, "Pizza", 900).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn deleting_a_product_cascades_to_links() {
        let db = db();
        test_support::user(&db, 1);
        test_support::room(&db, 1, 1, "a");
        let product = db.insert_product(1, "Pizza", 1200).unwrap();
        db.insert_user_product(product.id, 1, PaymentStatus::Unpaid).unwrap();

        assert!(db.delete_product(product.id).unwrap());
        assert!(db.list_user_products_for_room(1).unwrap().is_empty());
        assert!(!db.delete_product(product.id).unwrap());
    }

    #[test]
    fn rooms_list_is_sorted_by_the_chosen_column() {
        let db = db();
        test_support::user(&db, 1);
        test_support::room(&db, 1, 1, "zeta");
        test_support::room(&db, 2, 1, "alpha");
        test_support::room(&db, 3, 1, "mid");

        let query = ListQuery {
            page: 1,
            limit: 2,
            order_by: RoomSort::Name,
        };
        let (rooms, total) = db.list_rooms_for_member(1, &query).unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alpha", "mid"]);

        let query = ListQuery {
            page: 2,
            limit: 2,
            order_by: RoomSort::Name,
        };
        let (rooms, _) = db.list_rooms_for_member(1, &query).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "zeta");
    }

    #[test]
    fn products_list_only_covers_linked_products() {
        let db = db();
        test_support::user(&db, 1);
        test_support::user(&db, 2);
        test_support::room(&db, 1, 1, "a");
        test_support::product(&db, 10, 1, "Beer", 500);
        test_support::product(&db, 11, 1, "Apples", 300);
        test_support::product(&db, 12, 1, "Cheese", 800);
        test_support::link(&db, 10, 2, "UNPAID");
        test_support::link(&db, 11, 2, "PAID");

        let query = ListQuery {
            order_by: ProductSort::Price,
            ..Default::default()
        };
        let (products, total) = db.list_products_for_user(2, &query).unwrap();
        assert_eq!(total, 2);
        let ids: Vec<_> = products.iter().map(|p| p.id).collect();
        assert_eq!(ids, [11, 10]);
    }

    #[test]
    fn link_status_can_be_toggled() {
        let db = db();
        test_support::user(&db, 1);
        test_support::room(&db, 1, 1, "a");
        test_support::product(&db, 10, 1, "Beer", 500);
        let link = db.insert_user_product(10, 1, PaymentStatus::Unpaid).unwrap();

        let updated = db
            .set_user_product_status(link.id, PaymentStatus::Paid)
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Paid);
        assert!(db.set_user_product_status(999, PaymentStatus::Paid).unwrap().is_none());
    }

    #[test]
    fn duplicate_links_conflict() {
        let db = db();
        test_support::user(&db, 1);
        test_support::room(&db, 1, 1, "a");
        test_support::product(&db, 10, 1, "Beer", 500);
        db.insert_user_product(10, 1, PaymentStatus::Unpaid).unwrap();

        let err = db.insert_user_product(10, 1, PaymentStatus::Paid).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn room_debts_group_products_by_user() {
        let db = db();
        test_support::user(&db, 1);
        test_support::user(&db, 2);
        test_support::room(&db, 1, 1, "a");
        test_support::product(&db, 10, 1, "Beer", 500);
        test_support::product(&db, 11, 1, "Chips", 300);
        test_support::link(&db, 10, 1, "UNPAID");
        test_support::link(&db, 10, 2, "UNPAID");
        test_support::link(&db, 11, 2, "PAID");

        let debts = db.room_debts(1).unwrap();
        assert_eq!(
            debts,
            vec![
                UserDebts { user_id: 1, product_ids: vec![10] },
                UserDebts { user_id: 2, product_ids: vec![10, 11] },
            ]
        );
    }

    #[test]
    fn visible_products_are_scoped_to_shared_rooms() {
        let db = db();
        test_support::user(&db, 1);
        test_support::user(&db, 2);
        test_support::user(&db, 3);
        test_support::room(&db, 1, 1, "shared");
        test_support::room(&db, 2, 3, "private");
        test_support::product(&db, 10, 1, "Beer", 500);
        test_support::product(&db, 20, 2, "Wine", 900);
        test_support::link(&db, 10, 2, "UNPAID");
        test_support::link(&db, 20, 2, "UNPAID");

        assert_eq!(db.visible_products_of_user(1, 2).unwrap(), vec![10]);
        assert_eq!(db.visible_products_of_user(3, 2).unwrap(), vec![20]);
    }
}
