use crate::{
    BidId, ItemId, ItemStatus, NotificationId, NotificationKind, OrderId,
    PaymentStatus, UserId,
};
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A listing as shown to buyers.
///
/// Deliberately carries no reserve price; whether a reserve exists (let
/// alone its amount) is never exposed to bidders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: ItemId,
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
    pub bid_step: Decimal,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub auto_extend_minutes: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Item {
    /// Smallest acceptable next bid.
    pub fn minimum_bid(&self) -> Decimal {
        self.current_price + self.bid_step
    }
}

/// One page of a filtered listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bid_id: BidId,
    pub item_id: ItemId,
    pub bidder_id: UserId,
    pub amount: Decimal,
    pub is_proxy: bool,
    pub max_proxy_amount: Option<Decimal>,
    pub is_winning: bool,
    pub created_at: Timestamp,
}

/// Result of a successful bid: the accepted bid plus the item as it now
/// stands, reflecting the new current price and any auto-extension of
/// the deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidPlaced {
    pub bid: Bid,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub order_number: String,
    pub item_id: ItemId,
    pub buyer_id: UserId,
    pub final_price: Decimal,
    pub buyer_premium: Decimal,
    pub seller_fee: Decimal,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Result of a buy-now purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyNowReceipt {
    pub bid: Bid,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
}
