use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ItemId, ItemStatus, NotificationId, OrderId};

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 200;
pub const SPECIES_MAX_LEN: usize = 100;
pub const REJECT_REASON_MAX_LEN: usize = 1000;
/// Upper bound on the sniper-protection window, in minutes.
pub const AUTO_EXTEND_MAX_MINUTES: i32 = 10;

/// Validation result for listing details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidation {
    Valid,
    TitleTooShort,
    TitleTooLong,
    SpeciesMissing,
    NonPositivePrice,
    FractionalAmount,
    BuyNowBelowStartPrice,
    EndsBeforeStarts,
    AutoExtendOutOfRange,
}

impl ItemValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::TitleTooShort => {
                Some("Title must be at least 3 characters")
            }
            Self::TitleTooLong => {
                Some("Title must be at most 200 characters")
            }
            Self::SpeciesMissing => Some("Species is required"),
            Self::NonPositivePrice => {
                Some("Prices and the bid step must be positive")
            }
            Self::FractionalAmount => Some("Amounts must be whole won"),
            Self::BuyNowBelowStartPrice => {
                Some("Buy-now price must not be below the start price")
            }
            Self::EndsBeforeStarts => {
                Some("Auction must end after it starts")
            }
            Self::AutoExtendOutOfRange => {
                Some("Auto-extension window must be between 0 and 10 minutes")
            }
        }
    }
}

fn is_whole(amount: &Decimal) -> bool {
    amount.fract().is_zero()
}

/// Validate listing details before they reach the store.
///
/// Rules:
/// - title 3-200 characters, species non-empty
/// - start price, bid step, and the optional buy-now/reserve prices are
///   positive whole amounts
/// - buy-now price at least the start price
/// - `ends_at` strictly after `starts_at`
/// - auto-extension window within 0..=10 minutes
pub fn validate_item(item: &crate::Item) -> ItemValidation {
    if item.title.chars().count() < TITLE_MIN_LEN {
        return ItemValidation::TitleTooShort;
    }
    if item.title.chars().count() > TITLE_MAX_LEN {
        return ItemValidation::TitleTooLong;
    }
    if item.species.trim().is_empty() {
        return ItemValidation::SpeciesMissing;
    }

    let required = [&item.start_price, &item.bid_step];
    let optional = [&item.buy_now_price, &item.reserve_price];
    for amount in required
        .into_iter()
        .chain(optional.into_iter().flatten())
    {
        if !amount.is_sign_positive() || amount.is_zero() {
            return ItemValidation::NonPositivePrice;
        }
        if !is_whole(amount) {
            return ItemValidation::FractionalAmount;
        }
    }

    if let Some(buy_now) = &item.buy_now_price
        && *buy_now < item.start_price
    {
        return ItemValidation::BuyNowBelowStartPrice;
    }

    if item.ends_at <= item.starts_at {
        return ItemValidation::EndsBeforeStarts;
    }

    if !(0..=AUTO_EXTEND_MAX_MINUTES).contains(&item.auto_extend_minutes) {
        return ItemValidation::AutoExtendOutOfRange;
    }

    ItemValidation::Valid
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccount {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateItem {
    pub details: crate::Item,
    /// Keep the listing as an editable draft instead of submitting it
    /// for review.
    pub draft: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectItem {
    pub item_id: ItemId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemSort {
    Newest,
    PriceAsc,
    PriceDesc,
    EndingSoon,
}

/// Browse filters. `page` is 1-based.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListItems {
    pub status: Option<ItemStatus>,
    pub species: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub sort: ItemSort,
    pub page: i64,
    pub limit: i64,
}

impl Default for ListItems {
    fn default() -> Self {
        Self {
            status: Some(ItemStatus::Live),
            species: None,
            min_price: None,
            max_price: None,
            search: None,
            sort: ItemSort::Newest,
            page: 1,
            limit: 20,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaceBid {
    pub item_id: ItemId,
    pub amount: Decimal,
    pub is_proxy: bool,
    /// Ceiling for proxy bids; required when `is_proxy` is set.
    pub max_proxy_amount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuyNow {
    pub item_id: ItemId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkOrderPaid {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundOrder {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkNotificationRead {
    pub notification_id: NotificationId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::{Span, Timestamp};

    fn listing() -> crate::Item {
        let starts_at = Timestamp::UNIX_EPOCH;
        crate::Item {
            title: "Japanese black pine".into(),
            description: None,
            species: "Pinus thunbergii".into(),
            style: Some("moyogi".into()),
            height_cm: None,
            age_years_est: Some(25),
            start_price: Decimal::new(100_000, 0),
            buy_now_price: None,
            reserve_price: None,
            bid_step: Decimal::new(10_000, 0),
            starts_at,
            ends_at: starts_at + Span::new().hours(72),
            auto_extend_minutes: 5,
        }
    }

    #[test]
    fn accepts_a_well_formed_listing() {
        assert!(validate_item(&listing()).is_valid());
    }

    #[test]
    fn rejects_short_title() {
        let mut item = listing();
        item.title = "소".into();
        assert_eq!(validate_item(&item), ItemValidation::TitleTooShort);
    }

    #[test]
    fn rejects_non_positive_and_fractional_amounts() {
        let mut item = listing();
        item.start_price = Decimal::ZERO;
        assert_eq!(validate_item(&item), ItemValidation::NonPositivePrice);

        let mut item = listing();
        item.bid_step = Decimal::new(5, 1); // 0.5
        assert_eq!(validate_item(&item), ItemValidation::FractionalAmount);

        let mut item = listing();
        item.reserve_price = Some(Decimal::new(-1, 0));
        assert_eq!(validate_item(&item), ItemValidation::NonPositivePrice);
    }

    #[test]
    fn rejects_buy_now_below_start_price() {
        let mut item = listing();
        item.buy_now_price = Some(Decimal::new(50_000, 0));
        assert_eq!(
            validate_item(&item),
            ItemValidation::BuyNowBelowStartPrice
        );
    }

    #[test]
    fn rejects_inverted_schedule() {
        let mut item = listing();
        item.ends_at = item.starts_at;
        assert_eq!(validate_item(&item), ItemValidation::EndsBeforeStarts);
    }

    #[test]
    fn rejects_out_of_range_auto_extension() {
        let mut item = listing();
        item.auto_extend_minutes = 11;
        assert_eq!(
            validate_item(&item),
            ItemValidation::AutoExtendOutOfRange
        );

        item.auto_extend_minutes = -1;
        assert_eq!(
            validate_item(&item),
            ItemValidation::AutoExtendOutOfRange
        );
    }
}
