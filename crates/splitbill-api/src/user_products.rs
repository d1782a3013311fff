use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use splitbill_types::api::{
    AddUserProductRequest, RoomDebtsResponse, UpdateUserProductRequest, UserProductsResponse,
};
use splitbill_types::models::UserProduct;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::Principal;

#[derive(Debug, Deserialize)]
pub struct RoomDebtsQuery {
    pub room_id: Option<i64>,
}

/// Links a user to a product as a debtor.
pub async fn add_user_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<AddUserProductRequest>, ApiError>,
) -> Result<Json<UserProduct>, ApiError> {
    let link = run_blocking(move || {
        state
            .db
            .check_product_ownership(principal.user_id, req.product_id)?
            .require("product")?;
        state
            .db
            .insert_user_product(req.product_id, req.user_id, req.status.unwrap_or_default())
            .map_err(|e| match ApiError::conflict_as("User is already linked to this product")(e) {
                // The product was just checked, so a dangling reference is the user.
                ApiError::NotFound(_) => ApiError::NotFound("user"),
                other => other,
            })
    })
    .await?;
    Ok(Json(link))
}

pub async fn update_user_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(link_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateUserProductRequest>, ApiError>,
) -> Result<Json<UserProduct>, ApiError> {
    let link = run_blocking(move || {
        state
            .db
            .check_user_product_ownership(principal.user_id, link_id)?
            .require("user product")?;
        state
            .db
            .set_user_product_status(link_id, req.status)?
            .ok_or(ApiError::NotFound("user product"))
    })
    .await?;
    Ok(Json(link))
}

/// Who owes what in a room. Visible to every member.
pub async fn room_debts(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Query(query), _): WithRejection<Query<RoomDebtsQuery>, ApiError>,
) -> Result<Json<RoomDebtsResponse>, ApiError> {
    let room_id = query
        .room_id
        .ok_or_else(|| ApiError::validation("room_id query parameter is required"))?;

    let users = run_blocking(move || {
        state
            .db
            .check_room_membership(principal.user_id, room_id)?
            .require("room")?;
        Ok(state.db.room_debts(room_id)?)
    })
    .await?;
    Ok(Json(RoomDebtsResponse { users }))
}

/// Products another user is linked to, limited to rooms the caller shares.
pub async fn user_products(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(user_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<UserProductsResponse>, ApiError> {
    let products = run_blocking(move || {
        Ok(state
            .db
            .visible_products_of_user(principal.user_id, user_id)?)
    })
    .await?;
    Ok(Json(UserProductsResponse { products }))
}
