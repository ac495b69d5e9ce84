//! Bid acceptance and buy-now: the only two paths that move an item's
//! price while it is live.
//!
//! Both run as a single transaction that locks the item row first, so
//! concurrent bids serialize per item: whichever commits second is
//! validated against the price the first one wrote. A bid that loses
//! that race fails `BidTooLow` against the new minimum and the client
//! must resubmit.

use anyhow::Context;
use jiff::{Span, Timestamp};
use jiff_sqlx::ToSqlx;
use payloads::{ItemId, ItemStatus, UserId, requests, responses};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use super::*;
use crate::telemetry::log_error;
use crate::time::TimeSource;

/// Validate a bid against a locked item snapshot.
fn check_bid(
    item: &Item,
    bidder_id: &UserId,
    details: &requests::PlaceBid,
    now: Timestamp,
) -> Result<(), StoreError> {
    if item.status != ItemStatus::Live {
        return Err(StoreError::AuctionNotLive);
    }
    if item.seller_id == *bidder_id {
        return Err(StoreError::OwnItem);
    }
    // Redundant with the status check, but guards against sweep lag: an
    // item can still read `live` after its deadline if the end sweep
    // hasn't caught up yet.
    if now > item.ends_at {
        return Err(StoreError::AuctionEnded);
    }

    let amount = details.amount;
    if amount <= Decimal::ZERO || !amount.fract().is_zero() {
        return Err(StoreError::InvalidAmount);
    }

    let minimum = item.minimum_bid();
    if amount < minimum {
        return Err(StoreError::BidTooLow { minimum });
    }

    if details.is_proxy {
        match details.max_proxy_amount {
            None => return Err(StoreError::MissingProxyCeiling),
            Some(ceiling) if ceiling < amount => {
                return Err(StoreError::ProxyCeilingTooLow);
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Sliding-window auto-extension. A bid landing after
/// `ends_at - window` pushes the deadline to `now + window`; repeated
/// late bids keep re-anchoring the deadline at bid time rather than
/// accumulating onto the original one. Returns `None` when the deadline
/// stands.
fn extended_ends_at(
    item: &Item,
    now: Timestamp,
) -> anyhow::Result<Option<Timestamp>> {
    if item.auto_extend_minutes <= 0 {
        return Ok(None);
    }
    let window = Span::new().minutes(i64::from(item.auto_extend_minutes));
    let threshold = item.ends_at.checked_sub(window)?;
    if now > threshold {
        Ok(Some(now.checked_add(window)?))
    } else {
        Ok(None)
    }
}

/// Accept a bid on a live item.
///
/// Atomically: demotes the previous winning bid, inserts the new bid as
/// winning, raises `current_price`, and applies auto-extension. Outbid
/// bidders are notified best-effort after the transaction commits.
#[instrument(skip(pool, time_source))]
pub async fn place_bid(
    details: &requests::PlaceBid,
    bidder_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::BidPlaced, StoreError> {
    let _ = get_validated_user(bidder_id, pool).await?;

    let mut tx = pool.begin().await?;

    let item = get_item_for_update(&details.item_id, &mut tx).await?;
    let now = time_source.now();
    check_bid(&item, bidder_id, details, now)?;

    // Demote before inserting the successor; the partial unique index
    // permits only one winning row per item at a time.
    let outbid = sqlx::query_scalar::<_, UserId>(
        "UPDATE bids SET is_winning = FALSE
        WHERE item_id = $1 AND is_winning
        RETURNING bidder_id",
    )
    .bind(details.item_id)
    .fetch_all(&mut *tx)
    .await?;

    let max_proxy_amount = if details.is_proxy {
        details.max_proxy_amount
    } else {
        None
    };

    let bid = sqlx::query_as::<_, Bid>(
        "INSERT INTO bids (
            item_id,
            bidder_id,
            amount,
            is_proxy,
            max_proxy_amount,
            is_winning,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6) RETURNING *",
    )
    .bind(details.item_id)
    .bind(bidder_id)
    .bind(details.amount)
    .bind(details.is_proxy)
    .bind(max_proxy_amount)
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await?;

    let new_ends_at = extended_ends_at(&item, now)
        .context("computing auto-extension")?;

    let item = sqlx::query_as::<_, Item>(
        "UPDATE items
        SET current_price = $1,
            ends_at = COALESCE($2::timestamptz, ends_at)
        WHERE id = $3
        RETURNING *",
    )
    .bind(details.amount)
    .bind(new_ends_at.map(|t| t.to_sqlx()))
    .bind(details.item_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    for user_id in outbid.into_iter().filter(|u| u != bidder_id) {
        let _ = notifications::outbid(&item, &user_id, pool)
            .await
            .map_err(log_error);
    }

    Ok(responses::BidPlaced {
        bid: bid.into_response(),
        item: item.into_response(),
    })
}

/// Immediate purchase at the seller's fixed price.
///
/// Ends the auction on the spot: the buy-now bid bypasses the minimum
/// increment rule, the item jumps to `Ended`, and the order is created
/// in the same transaction. An end sweep racing this call finds the
/// status no longer `live` and skips the item.
#[instrument(skip(pool, time_source))]
pub async fn buy_now(
    details: &requests::BuyNow,
    buyer_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::BuyNowReceipt, StoreError> {
    let _ = get_validated_user(buyer_id, pool).await?;

    let mut tx = pool.begin().await?;

    let item = get_item_for_update(&details.item_id, &mut tx).await?;
    if item.status != ItemStatus::Live {
        return Err(StoreError::AuctionNotLive);
    }
    let Some(price) = item.buy_now_price else {
        return Err(StoreError::BuyNowUnavailable);
    };
    if item.seller_id == *buyer_id {
        return Err(StoreError::OwnItem);
    }

    // The standing high bid, if any, is superseded by the purchase.
    sqlx::query(
        "UPDATE bids SET is_winning = FALSE
        WHERE item_id = $1 AND is_winning",
    )
    .bind(details.item_id)
    .execute(&mut *tx)
    .await?;

    let now = time_source.now();
    let bid = sqlx::query_as::<_, Bid>(
        "INSERT INTO bids (
            item_id,
            bidder_id,
            amount,
            is_winning,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, TRUE, $4, $4) RETURNING *",
    )
    .bind(details.item_id)
    .bind(buyer_id)
    .bind(price)
    .bind(now.to_sqlx())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE items SET status = $1, current_price = $2 WHERE id = $3",
    )
    .bind(ItemStatus::Ended)
    .bind(price)
    .bind(details.item_id)
    .execute(&mut *tx)
    .await?;

    let order =
        orders::create_order_tx(&item.id, buyer_id, price, &mut tx, now)
            .await?;

    tx.commit().await?;

    Ok(responses::BuyNowReceipt {
        bid: bid.into_response(),
        order: order.into_response(),
    })
}

/// Bid history for an item, highest first.
pub async fn list_item_bids(
    item_id: &ItemId,
    pool: &PgPool,
) -> Result<Vec<responses::Bid>, StoreError> {
    let _ = get_item(item_id, pool).await?;

    let bids = sqlx::query_as::<_, Bid>(
        "SELECT * FROM bids WHERE item_id = $1
        ORDER BY amount DESC, created_at DESC",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(bids.into_iter().map(Bid::into_response).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use payloads::ItemId;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn won(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn live_item() -> Item {
        let starts_at = Timestamp::UNIX_EPOCH;
        let ends_at = starts_at + Span::new().hours(72);
        Item {
            id: ItemId(Uuid::new_v4()),
            seller_id: UserId(Uuid::new_v4()),
            title: "곰솔 분재".into(),
            description: None,
            species: "Pinus thunbergii".into(),
            style: None,
            height_cm: None,
            age_years_est: None,
            status: ItemStatus::Live,
            start_price: won(100_000),
            current_price: won(100_000),
            buy_now_price: None,
            reserve_price: None,
            bid_step: won(10_000),
            starts_at,
            ends_at,
            auto_extend_minutes: 5,
            reject_reason: None,
            sweep_failure_count: 0,
            sweep_last_failed_at: None,
            created_at: starts_at,
            updated_at: starts_at,
            deleted_at: None,
        }
    }

    fn bid(item: &Item, amount: Decimal) -> requests::PlaceBid {
        requests::PlaceBid {
            item_id: item.id,
            amount,
            is_proxy: false,
            max_proxy_amount: None,
        }
    }

    fn other_bidder() -> UserId {
        UserId(Uuid::new_v4())
    }

    #[test]
    fn bid_below_minimum_is_rejected_with_the_minimum() {
        let item = live_item();
        let result = check_bid(
            &item,
            &other_bidder(),
            &bid(&item, won(105_000)),
            item.starts_at,
        );
        match result {
            Err(StoreError::BidTooLow { minimum }) => {
                assert_eq!(minimum, won(110_000));
            }
            other => panic!("expected BidTooLow, got {other:?}"),
        }
    }

    #[test]
    fn bid_at_exactly_the_minimum_is_accepted() {
        let item = live_item();
        assert!(
            check_bid(
                &item,
                &other_bidder(),
                &bid(&item, won(110_000)),
                item.starts_at,
            )
            .is_ok()
        );
    }

    #[test]
    fn seller_cannot_bid_on_own_item() {
        let item = live_item();
        let seller = item.seller_id;
        // Even a generous bid is refused.
        let result = check_bid(
            &item,
            &seller,
            &bid(&item, won(500_000)),
            item.starts_at,
        );
        assert!(matches!(result, Err(StoreError::OwnItem)));
    }

    #[test]
    fn bids_require_a_live_auction() {
        for status in [
            ItemStatus::Draft,
            ItemStatus::PendingReview,
            ItemStatus::Scheduled,
            ItemStatus::Ended,
            ItemStatus::Canceled,
        ] {
            let mut item = live_item();
            item.status = status;
            let result = check_bid(
                &item,
                &other_bidder(),
                &bid(&item, won(110_000)),
                item.starts_at,
            );
            assert!(matches!(result, Err(StoreError::AuctionNotLive)));
        }
    }

    #[test]
    fn bids_after_the_deadline_are_expired_despite_live_status() {
        let item = live_item();
        let result = check_bid(
            &item,
            &other_bidder(),
            &bid(&item, won(110_000)),
            item.ends_at + Span::new().seconds(1),
        );
        assert!(matches!(result, Err(StoreError::AuctionEnded)));
    }

    #[test]
    fn fractional_and_non_positive_amounts_are_invalid() {
        let item = live_item();
        for amount in [Decimal::new(1_100_005, 1), won(0), won(-10_000)] {
            let result = check_bid(
                &item,
                &other_bidder(),
                &bid(&item, amount),
                item.starts_at,
            );
            assert!(matches!(result, Err(StoreError::InvalidAmount)));
        }
    }

    #[test]
    fn proxy_bids_require_a_ceiling_of_at_least_the_amount() {
        let item = live_item();
        let mut details = bid(&item, won(110_000));
        details.is_proxy = true;

        let result = check_bid(
            &item,
            &other_bidder(),
            &details,
            item.starts_at,
        );
        assert!(matches!(result, Err(StoreError::MissingProxyCeiling)));

        details.max_proxy_amount = Some(won(100_000));
        let result = check_bid(
            &item,
            &other_bidder(),
            &details,
            item.starts_at,
        );
        assert!(matches!(result, Err(StoreError::ProxyCeilingTooLow)));

        // A ceiling equal to the bid amount is allowed.
        details.max_proxy_amount = Some(won(110_000));
        assert!(
            check_bid(&item, &other_bidder(), &details, item.starts_at)
                .is_ok()
        );
    }

    #[test]
    fn late_bid_slides_the_deadline_forward_from_bid_time() {
        let item = live_item();
        // Three minutes before the deadline, inside the 5 minute window:
        // the deadline becomes bid time + 5 minutes (T + 2 minutes).
        let now = item.ends_at - Span::new().minutes(3);
        let extended = extended_ends_at(&item, now).unwrap();
        assert_eq!(extended, Some(now + Span::new().minutes(5)));
    }

    #[test]
    fn bid_at_the_window_boundary_does_not_extend() {
        let item = live_item();
        let window = Span::new().minutes(5);

        // Exactly at ends_at - window, and a second earlier: no change.
        let now = item.ends_at - window;
        assert_eq!(extended_ends_at(&item, now).unwrap(), None);
        let now = now - Span::new().seconds(1);
        assert_eq!(extended_ends_at(&item, now).unwrap(), None);

        // A second inside the window: deadline re-anchors at bid time.
        let now = item.ends_at - window + Span::new().seconds(1);
        assert_eq!(
            extended_ends_at(&item, now).unwrap(),
            Some(now + window)
        );
    }

    #[test]
    fn auto_extension_disabled_when_window_is_zero() {
        let mut item = live_item();
        item.auto_extend_minutes = 0;
        let now = item.ends_at - Span::new().seconds(1);
        assert_eq!(extended_ends_at(&item, now).unwrap(), None);
    }
}
