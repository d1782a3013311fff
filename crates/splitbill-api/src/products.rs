use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;

use splitbill_types::api::{AddProductRequest, DeletedResponse, ListQuery, ProductSort};
use splitbill_types::models::{Page, Product};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::Principal;

pub async fn add_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<AddProductRequest>, ApiError>,
) -> Result<Json<Product>, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("product name must not be empty"));
    }
    if req.price < 0 {
        return Err(ApiError::validation("price must not be negative"));
    }

    let product = run_blocking(move || {
        state
            .db
            .check_room_ownership(principal.user_id, req.room_id)?
            .require("room")?;
        state
            .db
            .insert_product(req.room_id, &name, req.price)
            .map_err(ApiError::conflict_as("Product already exists in this room"))
    })
    .await?;
    Ok(Json(product))
}

/// Products the caller is linked to, across all rooms.
pub async fn list_products(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery<ProductSort>>, ApiError>,
) -> Result<Json<Page<Product>>, ApiError> {
    let page = run_blocking(move || {
        let (products, total) = state.db.list_products_for_user(principal.user_id, &query)?;
        Ok(Page::new(products, query.page(), query.limit(), total))
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(product_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<Product>, ApiError> {
    let product = run_blocking(move || {
        state
            .db
            .check_product_ownership(principal.user_id, product_id)?
            .require("product")?;
        state
            .db
            .get_product(product_id)?
            .ok_or(ApiError::NotFound("product"))
    })
    .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(product_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<DeletedResponse>, ApiError> {
    run_blocking(move || {
        state
            .db
            .check_product_ownership(principal.user_id, product_id)?
            .require("product")?;
        if !state.db.delete_product(product_id)? {
            return Err(ApiError::NotFound("product"));
        }
        Ok(())
    })
    .await?;

    Ok(Json(DeletedResponse {
        id: product_id,
        status: "deleted".into(),
    }))
}
