//! Shared wire types for the bonsai auction marketplace.
//!
//! Typed ids, domain enums, and the request/response payloads exchanged
//! between the API and its clients. Monetary amounts are whole won,
//! represented as [`rust_decimal::Decimal`]; settlement arithmetic lives
//! here so clients can render fee breakdowns without re-deriving them.
//!
//! The `use-sqlx` feature adds sqlx derives so the API crate can read
//! these types straight from query rows.

use derive_more::Display;
use jiff::Timestamp;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::APIClient;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct UserId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct ItemId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct BidId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct OrderId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type, sqlx::FromRow))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct NotificationId(pub Uuid);

/// Platform role for a user. Any non-admin may list items and bid; the
/// review workflow requires `Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
pub enum Role {
    User,
    Seller,
    Admin,
}

/// Listing lifecycle. `Canceled` is terminal and reachable only from
/// `PendingReview` (admin rejection).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "item_status", rename_all = "snake_case")
)]
pub enum ItemStatus {
    Draft,
    PendingReview,
    Scheduled,
    Live,
    Ended,
    Canceled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Canceled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
pub enum NotificationKind {
    AuctionStart,
    AuctionWon,
    AuctionLost,
    Outbid,
    PaymentConfirmed,
    AdminMessage,
}

/// Why an auction closed without a sale. Carried in the `AUCTION_LOST`
/// notification payload; the item row itself only records `Ended`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LostReason {
    ReserveNotMet,
    NoBids,
}

/// Seller-provided listing details. `reserve_price` is only ever echoed
/// back to the seller; bidder-facing responses omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub description: Option<String>,
    pub species: String,
    pub style: Option<String>,
    pub height_cm: Option<Decimal>,
    pub age_years_est: Option<i32>,
    pub start_price: Decimal,
    pub buy_now_price: Option<Decimal>,
    pub reserve_price: Option<Decimal>,
    pub bid_step: Decimal,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    /// Sliding auto-extension window in minutes; 0 disables it.
    pub auto_extend_minutes: i32,
}

/// Platform commissions, as fractions of the hammer price.
pub fn buyer_premium_rate() -> Decimal {
    Decimal::new(7, 2)
}

pub fn seller_fee_rate() -> Decimal {
    Decimal::new(10, 2)
}

/// Commission breakdown for a settled sale.
///
/// Amounts are rounded half-up to whole won; the buyer pays
/// `total_amount`, the seller receives `final_price - seller_fee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub final_price: Decimal,
    pub buyer_premium: Decimal,
    pub seller_fee: Decimal,
    pub total_amount: Decimal,
}

impl Settlement {
    pub fn for_price(final_price: Decimal) -> Self {
        let round = |d: Decimal| {
            d.round_dp_with_strategy(
                0,
                RoundingStrategy::MidpointAwayFromZero,
            )
        };
        let buyer_premium = round(final_price * buyer_premium_rate());
        let seller_fee = round(final_price * seller_fee_rate());
        Self {
            final_price,
            buyer_premium,
            seller_fee,
            total_amount: final_price + buyer_premium,
        }
    }
}

/// Wrapper for decoding nullable timestamp columns with sqlx, for use
/// with `#[sqlx(try_from = "OptionalTimestamp")]` on
/// `Option<jiff::Timestamp>` fields.
#[cfg(feature = "use-sqlx")]
#[derive(Debug, Clone)]
pub struct OptionalTimestamp(pub Option<Timestamp>);

#[cfg(feature = "use-sqlx")]
impl From<OptionalTimestamp> for Option<Timestamp> {
    fn from(ts: OptionalTimestamp) -> Self {
        ts.0
    }
}

#[cfg(feature = "use-sqlx")]
impl sqlx::Type<sqlx::Postgres> for OptionalTimestamp {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <jiff_sqlx::Timestamp as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "use-sqlx")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OptionalTimestamp {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let ts = <Option<jiff_sqlx::Timestamp> as sqlx::Decode<
            'r,
            sqlx::Postgres,
        >>::decode(value)?;
        let ts = ts.map(Timestamp::try_from).transpose()?;
        Ok(OptionalTimestamp(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn won(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn settlement_arithmetic() {
        // 2,000,000 hammer price: 140,000 premium, 200,000 fee,
        // 2,140,000 total.
        let s = Settlement::for_price(won(2_000_000));
        assert_eq!(s.buyer_premium, won(140_000));
        assert_eq!(s.seller_fee, won(200_000));
        assert_eq!(s.total_amount, won(2_140_000));
    }

    #[test]
    fn settlement_rounds_half_up() {
        // 7% of 750 = 52.5 -> 53; 10% of 750 = 75.
        let s = Settlement::for_price(won(750));
        assert_eq!(s.buyer_premium, won(53));
        assert_eq!(s.seller_fee, won(75));
        assert_eq!(s.total_amount, won(803));

        // 7% of 55 = 3.85 -> 4; 10% of 55 = 5.5 -> 6.
        let s = Settlement::for_price(won(55));
        assert_eq!(s.buyer_premium, won(4));
        assert_eq!(s.seller_fee, won(6));
    }

    #[test]
    fn settlement_total_is_price_plus_premium() {
        for price in [1, 999, 10_000, 123_456_789] {
            let s = Settlement::for_price(won(price));
            assert_eq!(s.total_amount, s.final_price + s.buyer_premium);
        }
    }
}
