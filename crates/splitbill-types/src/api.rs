use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PaymentStatus;

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRoomRequest {
    pub name: String,
}

/// Change-set accepted by `PUT /v1/rooms/{id}`.
///
/// Every section is optional. Sections are applied in a fixed order
/// (rename, add, edit, remove) inside one transaction.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub product: ProductChanges,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductChanges {
    #[serde(default)]
    pub add: Vec<NewProduct>,
    #[serde(default)]
    pub edit: Vec<ProductEdit>,
    #[serde(default)]
    pub remove: Vec<i64>,
}

/// A product to create, with one link per listed user sharing `status`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProduct {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub user_ids: Vec<i64>,
}

/// Edits to an existing product. `status` is applied to every link of the
/// product, not to a single member.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductEdit {
    pub id: i64,
    pub name: Option<String>,
    pub price: Option<i64>,
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub remove_user_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomMutationResult {
    pub status: String,
}

impl RoomMutationResult {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

// -- Products --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddProductRequest {
    pub name: String,
    pub price: i64,
    pub room_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub id: i64,
    pub status: String,
}

// -- User products --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddUserProductRequest {
    pub product_id: i64,
    pub user_id: i64,
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserProductRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDebts {
    pub user_id: i64,
    pub product_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomDebtsResponse {
    pub users: Vec<UserDebts>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProductsResponse {
    pub products: Vec<i64>,
}

// -- Listing --

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomSort {
    #[default]
    Id,
    Name,
    OwnerId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Id,
    Name,
    Price,
    RoomId,
}

/// `?page=&limit=&order_by=` for list endpoints. Out-of-range values are
/// clamped rather than rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de> + Default"))]
pub struct ListQuery<S> {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub order_by: S,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl<S: Default> Default for ListQuery<S> {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            order_by: S::default(),
        }
    }
}

impl<S> ListQuery<S> {
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
