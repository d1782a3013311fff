//! Room batch mutation engine.
//!
//! Applies a room change-set (rename, product add/edit/remove) as one
//! transaction. Either every statement commits or none do; callers only learn
//! whether the batch as a whole succeeded.
//!
//! Sections run in a fixed order: rename, add, edit, remove. Ids of products
//! created by `add` are not known to the caller, so `edit`/`remove` cannot
//! refer back to them within the same call.

use std::time::Instant;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use splitbill_types::api::{NewProduct, ProductEdit, UpdateRoomRequest};

use crate::{Database, DbError, guard};

impl Database {
    /// Applies `changes` to `room_id` on behalf of `user_id`.
    ///
    /// Ownership, then payload shape, are checked before the transaction
    /// opens. If `deadline` passes before the commit, the transaction is
    /// rolled back and [`DbError::DeadlineExceeded`] is returned.
    pub fn apply_room_update(
        &self,
        user_id: i64,
        room_id: i64,
        changes: &UpdateRoomRequest,
        deadline: Option<Instant>,
    ) -> Result<(), DbError> {
        let mut conn = self.lock()?;
        guard::room_ownership(&conn, user_id, room_id)?.require("room")?;
        validate(changes)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let batch = Batch {
            conn: &tx,
            user_id,
            room_id,
            deadline,
        };
        batch.run(changes)?;
        tx.commit()?;

        debug!(
            room_id,
            user_id,
            renamed = changes.name.is_some(),
            added = changes.product.add.len(),
            edited = changes.product.edit.len(),
            removed = changes.product.remove.len(),
            "room batch committed"
        );
        Ok(())
    }
}

fn validate(changes: &UpdateRoomRequest) -> Result<(), DbError> {
    if let Some(name) = &changes.name {
        if name.trim().is_empty() {
            return Err(DbError::Validation("room name must not be empty".into()));
        }
    }
    for add in &changes.product.add {
        check_product_fields(Some(&add.name), Some(add.price))?;
    }
    for edit in &changes.product.edit {
        check_product_fields(edit.name.as_deref(), edit.price)?;
    }
    Ok(())
}

fn check_product_fields(name: Option<&str>, price: Option<i64>) -> Result<(), DbError> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(DbError::Validation("product name must not be empty".into()));
    }
    if price.is_some_and(|p| p < 0) {
        return Err(DbError::Validation("product price must not be negative".into()));
    }
    Ok(())
}

struct Batch<'a> {
    conn: &'a Connection,
    user_id: i64,
    room_id: i64,
    deadline: Option<Instant>,
}

impl Batch<'_> {
    fn run(&self, changes: &UpdateRoomRequest) -> Result<(), DbError> {
        if let Some(name) = &changes.name {
            self.check_deadline()?;
            self.rename(name.trim())?;
        }
        for add in &changes.product.add {
            self.check_deadline()?;
            self.add(add)?;
        }
        for edit in &changes.product.edit {
            self.check_deadline()?;
            self.edit(edit)?;
        }
        for &product_id in &changes.product.remove {
            self.check_deadline()?;
            self.remove(product_id)?;
        }
        self.check_deadline()
    }

    fn check_deadline(&self) -> Result<(), DbError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// The owner predicate repeats the pre-transaction check so a room that
    /// changed hands in between is not renamed.
    fn rename(&self, name: &str) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE rooms SET name = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![name, self.room_id, self.user_id],
        )?;
        if updated == 0 {
            return Err(DbError::Forbidden("room"));
        }
        Ok(())
    }

    fn add(&self, product: &NewProduct) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO products (name, price, room_id) VALUES (?1, ?2, ?3)",
            params![product.name.trim(), product.price, self.room_id],
        )?;
        let product_id = self.conn.last_insert_rowid();

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO user_products (product_id, user_id, status) VALUES (?1, ?2, ?3)",
        )?;
        for user_id in &product.user_ids {
            stmt.execute(params![product_id, user_id, product.status.as_str()])?;
        }
        Ok(())
    }

    fn edit(&self, edit: &ProductEdit) -> Result<(), DbError> {
        let in_room = self
            .conn
            .query_row(
                "SELECT 1 FROM products WHERE id = ?1 AND room_id = ?2",
                params![edit.id, self.room_id],
                |_| Ok(()),
            )
            .optional()?;
        if in_room.is_none() {
            return Err(DbError::NotFound("product"));
        }

        if edit.name.is_some() || edit.price.is_some() {
            self.conn.execute(
                "UPDATE products
                 SET name = COALESCE(?1, name), price = COALESCE(?2, price)
                 WHERE id = ?3 AND room_id = ?4",
                params![
                    edit.name.as_deref().map(str::trim),
                    edit.price,
                    edit.id,
                    self.room_id
                ],
            )?;
        }

        // Every link of the product, not a single member's.
        if let Some(status) = edit.status {
            self.conn.execute(
                "UPDATE user_products SET status = ?1 WHERE product_id = ?2",
                params![status.as_str(), edit.id],
            )?;
        }

        for user_id in &edit.remove_user_ids {
            let deleted = self.conn.execute(
                "DELETE FROM user_products WHERE product_id = ?1 AND user_id = ?2",
                params![edit.id, user_id],
            )?;
            if deleted == 0 {
                return Err(DbError::NotFound("product member"));
            }
        }
        Ok(())
    }

    fn remove(&self, product_id: i64) -> Result<(), DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM products WHERE id = ?1 AND room_id = ?2",
            params![product_id, self.room_id],
        )?;
        if deleted == 0 {
            return Err(DbError::NotFound("product"));
        }
        Ok(())
    }
}
