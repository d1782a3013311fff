//! Wire and domain types shared by the store, the HTTP layer and the server binary.

pub mod api;
pub mod models;
