//! Database store module for the auction marketplace API.
//!
//! ## Design Decisions
//!
//! ### Per-item serialization
//! - **Row locks on the item row**: every operation that can change an
//!   item's price, deadline, or status (`bids::place_bid`,
//!   `bids::buy_now`, the scheduler sweeps) starts by fetching the item
//!   with `SELECT ... FOR UPDATE` inside its transaction. Two concurrent
//!   bids on the same item therefore serialize: the second transaction
//!   re-reads the row after the first commits and is validated against
//!   the post-commit price, so a stale `current_price` can never accept
//!   two bids in the same "round".
//! - **Status predicates as guards**: terminal transitions re-check the
//!   status under the lock. A buy-now racing an end sweep loses cleanly
//!   with `AuctionNotLive` instead of double-settling; the one-order-per
//!   -item unique constraint backstops this at the schema level.
//!
//! ### Time Source Dependency
//! - Functions that need current time accept a `TimeSource` parameter
//!   instead of reading the clock themselves, so time can be mocked with
//!   the `mock-time` feature.
//!
//! ### Notifications are not part of transactions
//! - Notification rows are written after the owning transaction commits,
//!   best-effort. A failed notification insert is logged and swallowed;
//!   it must never roll back a bid or a settlement.
//!
//! ### Database Triggers
//! - `updated_at` columns are maintained by triggers, so UPDATE
//!   statements don't carry the bookkeeping.

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTs;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use payloads::{
    BidId, ItemId, ItemStatus, NotificationId, NotificationKind,
    OptionalTimestamp, OrderId, PaymentStatus, Role, UserId, responses,
};

pub mod bids;
pub mod items;
pub mod notifications;
pub mod orders;
pub mod users;
pub mod watchlists;

/// A complete user row that stays in the backend.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub role: Role,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub deleted_at: Option<Timestamp>,
}

/// A type that can only exist if the interior User has been validated to
/// hold the admin role.
pub struct ValidatedAdmin(pub User);

#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub id: ItemId,
    pub seller_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub species: String,
    pub style: Option<String>,
    pub height_cm: Option<Decimal>,
    pub age_years_est: Option<i32>,
    pub status: ItemStatus,
    pub start_price: Decimal,
    pub current_price: Decimal,
    pub buy_now_price: Option<Decimal>,
    pub reserve_price: Option<Decimal>,
    pub bid_step: Decimal,
    #[sqlx(try_from = "SqlxTs")]
    pub starts_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub ends_at: Timestamp,
    pub auto_extend_minutes: i32,
    pub reject_reason: Option<String>,
    pub sweep_failure_count: i32,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub sweep_last_failed_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub deleted_at: Option<Timestamp>,
}

impl Item {
    /// Smallest bid that can still be accepted.
    pub fn minimum_bid(&self) -> Decimal {
        self.current_price + self.bid_step
    }

    pub fn into_response(self) -> responses::Item {
        responses::Item {
            item_id: self.id,
            seller_id: self.seller_id,
            title: self.title,
            description: self.description,
            species: self.species,
            style: self.style,
            height_cm: self.height_cm,
            age_years_est: self.age_years_est,
            status: self.status,
            start_price: self.start_price,
            current_price: self.current_price,
            buy_now_price: self.buy_now_price,
            bid_step: self.bid_step,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            auto_extend_minutes: self.auto_extend_minutes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Bid {
    pub id: BidId,
    pub item_id: ItemId,
    pub bidder_id: UserId,
    pub amount: Decimal,
    pub is_proxy: bool,
    pub max_proxy_amount: Option<Decimal>,
    pub is_winning: bool,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl Bid {
    pub fn into_response(self) -> responses::Bid {
        responses::Bid {
            bid_id: self.id,
            item_id: self.item_id,
            bidder_id: self.bidder_id,
            amount: self.amount,
            is_proxy: self.is_proxy,
            max_proxy_amount: self.max_proxy_amount,
            is_winning: self.is_winning,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub item_id: ItemId,
    pub buyer_id: UserId,
    pub final_price: Decimal,
    pub buyer_premium: Decimal,
    pub seller_fee: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub paid_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub canceled_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl Order {
    pub fn into_response(self) -> responses::Order {
        responses::Order {
            order_id: self.id,
            order_number: self.order_number,
            item_id: self.item_id,
            buyer_id: self.buyer_id,
            final_price: self.final_price,
            buyer_premium: self.buyer_premium,
            seller_fee: self.seller_fee,
            total_amount: self.total_amount,
            payment_status: self.payment_status,
            paid_at: self.paid_at,
            canceled_at: self.canceled_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Json<serde_json::Value>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub read_at: Option<Timestamp>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
}

impl Notification {
    pub fn into_response(self) -> responses::Notification {
        responses::Notification {
            notification_id: self.id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            data: self.data.0,
            read_at: self.read_at,
            created_at: self.created_at,
        }
    }
}

/// Fetch an item by id, without locking it.
pub(crate) async fn get_item(
    item_id: &ItemId,
    pool: &PgPool,
) -> Result<Item, StoreError> {
    sqlx::query_as::<_, Item>(
        "SELECT * FROM items WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(item_id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::ItemNotFound,
        e => StoreError::Database(e),
    })
}

/// Fetch an item and take a row lock on it for the remainder of the
/// transaction. All price/status mutations go through this, which is what
/// serializes concurrent bids, buy-nows, and sweep transitions per item.
pub(crate) async fn get_item_for_update(
    item_id: &ItemId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<Item, StoreError> {
    sqlx::query_as::<_, Item>(
        "SELECT * FROM items WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(item_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::ItemNotFound,
        e => StoreError::Database(e),
    })
}

/// Fetch a user, validating that the account still exists.
pub(crate) async fn get_validated_user(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::UserNotFound,
        e => StoreError::Database(e),
    })
}

/// Fetch a user and require the admin role.
pub(crate) async fn get_validated_admin(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<ValidatedAdmin, StoreError> {
    let user = get_validated_user(user_id, pool).await?;
    if user.role != Role::Admin {
        return Err(StoreError::RequiresAdminPermissions);
    }
    Ok(ValidatedAdmin(user))
}

/// Record an admin review action alongside the status change it is part
/// of, within the same transaction.
pub(crate) async fn create_audit_log_tx(
    actor_id: &UserId,
    action: &str,
    item_id: &ItemId,
    detail: serde_json::Value,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO audit_logs (actor_id, action, item_id, detail)
        VALUES ($1, $2, $3, $4)",
    )
    .bind(actor_id)
    .bind(action)
    .bind(item_id)
    .bind(Json(detail))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found")]
    ItemNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Order not found")]
    OrderNotFound,
    #[error("Notification not found")]
    NotificationNotFound,
    #[error("Admin permissions required")]
    RequiresAdminPermissions,
    #[error("Auction is not live")]
    AuctionNotLive,
    #[error("Auction has already ended")]
    AuctionEnded,
    #[error("You cannot bid on or buy your own item")]
    OwnItem,
    #[error("Only the seller can modify this item")]
    NotItemOwner,
    #[error("Minimum bid is {minimum}")]
    BidTooLow { minimum: Decimal },
    #[error("Bid amount must be a positive whole amount")]
    InvalidAmount,
    #[error("Proxy bids require a maximum amount")]
    MissingProxyCeiling,
    #[error("Proxy maximum must be at least the bid amount")]
    ProxyCeilingTooLow,
    #[error("Buy-now is not available for this item")]
    BuyNowUnavailable,
    #[error("Item is not awaiting review")]
    NotAwaitingReview,
    #[error("Item is not a draft")]
    NotADraft,
    #[error("Invalid listing: {reason}")]
    InvalidListing { reason: &'static str },
    #[error("Field too long")]
    FieldTooLong,
    #[error("Already watching this item")]
    AlreadyWatching,
    #[error("Order is not awaiting payment")]
    OrderNotPayable,
    #[error("Order is not refundable")]
    OrderNotRefundable,
    #[error("Unique constraint violation")]
    NotUnique(#[source] sqlx::Error),
    #[error("Database error")]
    Database(#[source] sqlx::Error),
    #[error("Unexpected error")]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return StoreError::NotUnique(e);
        }
        StoreError::Database(e)
    }
}
