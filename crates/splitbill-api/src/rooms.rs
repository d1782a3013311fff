use std::time::Instant;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use splitbill_types::api::{CreateRoomRequest, ListQuery, RoomMutationResult, RoomSort, UpdateRoomRequest};
use splitbill_types::models::{Page, Room};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::Principal;

pub async fn create_room(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<CreateRoomRequest>, ApiError>,
) -> Result<Json<Room>, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("room name must not be empty"));
    }

    let room = run_blocking(move || Ok(state.db.create_room(principal.user_id, &name)?)).await?;
    info!("user {} created room {}", principal.user_id, room.id);
    Ok(Json(room))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery<RoomSort>>, ApiError>,
) -> Result<Json<Page<Room>>, ApiError> {
    let page = run_blocking(move || {
        let (rooms, total) = state.db.list_rooms_for_member(principal.user_id, &query)?;
        Ok(Page::new(rooms, query.page(), query.limit(), total))
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_room(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(room_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<Room>, ApiError> {
    let room = run_blocking(move || {
        state
            .db
            .check_room_membership(principal.user_id, room_id)?
            .require("room")?;
        state.db.get_room(room_id)?.ok_or(ApiError::NotFound("room"))
    })
    .await?;
    Ok(Json(room))
}

/// Joining twice is not an error.
pub async fn join_room(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(room_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<Json<bool>, ApiError> {
    run_blocking(move || {
        state
            .db
            .join_room(principal.user_id, room_id)
            .map_err(|e| match ApiError::from(e) {
                ApiError::NotFound(_) => ApiError::NotFound("room"),
                other => other,
            })
    })
    .await?;
    Ok(Json(true))
}

/// Applies a whole change-set to the room in one transaction.
pub async fn update_room(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(room_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(changes), _): WithRejection<Json<UpdateRoomRequest>, ApiError>,
) -> Result<Json<RoomMutationResult>, ApiError> {
    let deadline = Instant::now()
        .checked_add(state.request_timeout)
        .ok_or_else(|| ApiError::Internal("request timeout out of range".into()))?;

    run_blocking(move || {
        Ok(state
            .db
            .apply_room_update(principal.user_id, room_id, &changes, Some(deadline))?)
    })
    .await?;

    Ok(Json(RoomMutationResult::success()))
}
