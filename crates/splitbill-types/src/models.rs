use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Settlement state of a single user's share of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    /// Canonical column value, also used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Paid => "PAID",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(Self::Unpaid),
            "PAID" => Ok(Self::Paid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

/// Prices are integers in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub room_id: i64,
}

/// "This user owes for this product."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProduct {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub status: PaymentStatus,
}

/// One page of a listing plus the totals needed to render a pager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total_count: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, limit: u32, total_count: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            items,
            page,
            limit,
            total_count,
            total_pages: (total_count + limit_i - 1) / limit_i,
        }
    }
}
