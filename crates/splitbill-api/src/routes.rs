use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{products, rooms, user_products};

/// The full HTTP surface. Everything under `/v1` needs a session.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/v1/rooms", post(rooms::create_room).get(rooms::list_rooms))
        .route("/v1/rooms/{id}", get(rooms::get_room).put(rooms::update_room))
        .route("/v1/rooms/join/{id}", post(rooms::join_room))
        .route(
            "/v1/products",
            post(products::add_product).get(products::list_products),
        )
        .route(
            "/v1/products/{id}",
            get(products::get_product).delete(products::delete_product),
        )
        .route(
            "/v1/user-products",
            post(user_products::add_user_product).get(user_products::room_debts),
        )
        .route(
            "/v1/user-products/{id}",
            put(user_products::update_user_product).get(user_products::user_products),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
