//! Top-level orchestration of the time-based auction lifecycle.
//!
//! The scheduler ticks on an interval and runs two sweeps: starting
//! scheduled auctions whose start time has arrived, and ending live
//! auctions whose deadline has passed. Ending is where settlement
//! happens.
//!
//! ```text
//!   starts_at                ends_at      (possibly pushed forward by
//!       v                       v          late bids, sniper protection)
//! ------|-----------------------|------>
//!       ^                       ^
//!       | start sweep:          | end sweep: status -> ended; if the
//!       | status -> live,       | highest bid clears the reserve,
//!       | current = start price | create the order and flag the
//!       |                       | winning bid, else notify watchers
//! ```
//!
//! Each sweep locks one item at a time with a transaction-scoped
//! advisory lock, then does the actual work in a separate transaction
//! that re-validates the item under a row lock. Multiple scheduler
//! instances can therefore run concurrently without processing an item
//! twice, and an item that keeps failing backs off exponentially
//! instead of being retried every tick.

use anyhow::Context;
use jiff_sqlx::ToSqlx;
use payloads::{ItemStatus, LostReason, UserId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time;

use crate::{store, telemetry::log_error, time::TimeSource};

pub struct Scheduler {
    pool: PgPool,
    time_source: TimeSource,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(
        pool: PgPool,
        time_source: TimeSource,
        tick_interval: Duration,
    ) -> Self {
        Self {
            pool,
            time_source,
            tick_interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            let _ = schedule_tick(&self.pool, &self.time_source)
                .await
                .map_err(log_error);
        }
    }
}

/// Run both sweeps once right now.
#[tracing::instrument(skip(pool, time_source))]
pub async fn schedule_tick(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<()> {
    let started = start_scheduled_auctions(pool, time_source).await?;
    if started > 0 {
        tracing::info!(started, "started scheduled auctions");
    }

    let ended = end_expired_auctions(pool, time_source).await?;
    if ended > 0 {
        tracing::info!(ended, "ended expired auctions");
    }

    Ok(())
}

/// Move every scheduled item whose start time has arrived to `live`.
/// Returns the number of items transitioned. Idempotent across sweeps:
/// the status predicate excludes items that are already live.
#[tracing::instrument(skip(pool, time_source))]
pub async fn start_scheduled_auctions(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<usize> {
    let mut started = 0;
    loop {
        match start_next_due_item(pool, time_source).await {
            Ok(Some(true)) => started += 1,
            Ok(Some(false)) => continue, // locked but no longer eligible
            Ok(None) => break,           // no more items to process
            Err(e) => {
                // Log and move on; the failed item is now backing off
                // and won't be re-selected this pass.
                tracing::error!("Failed to start auction: {:#}", e);
                continue;
            }
        }
    }
    Ok(started)
}

/// Close every live item whose deadline has passed, settling the ones
/// with a qualifying winning bid. Returns the number of items
/// transitioned.
#[tracing::instrument(skip(pool, time_source))]
pub async fn end_expired_auctions(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<usize> {
    let mut ended = 0;
    loop {
        match end_next_expired_item(pool, time_source).await {
            Ok(Some(true)) => ended += 1,
            Ok(Some(false)) => continue,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to end auction: {:#}", e);
                continue;
            }
        }
    }
    Ok(ended)
}

/// Lock and start the next due item. `None` means nothing is left to
/// process; `Some(transitioned)` reports whether the item actually
/// moved to `live` (it may have been re-checked and skipped).
async fn start_next_due_item(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<Option<bool>> {
    // This transaction is ONLY used to hold the advisory lock for
    // coordination; the work happens in its own transaction.
    let mut coordination_tx = pool.begin().await?;

    let item = match lock_next_item(
        &mut coordination_tx,
        ItemStatus::Scheduled,
        "starts_at",
        "auction_start",
        time_source,
    )
    .await?
    {
        Some(item) => item,
        None => return Ok(None),
    };

    let item_id = item.id;

    match process_item_start(&item, pool, time_source).await {
        Ok(transitioned) => {
            coordination_tx.commit().await?;
            Ok(Some(transitioned))
        }
        Err(e) => {
            let _ = record_sweep_failure(item_id, pool, time_source)
                .await
                .context("Failed to record sweep failure")
                .map_err(log_error);
            let _ = coordination_tx.commit().await;
            Err(e)
        }
    }
}

/// Lock and end the next expired item; same contract as
/// [`start_next_due_item`].
async fn end_next_expired_item(
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<Option<bool>> {
    let mut coordination_tx = pool.begin().await?;

    let item = match lock_next_item(
        &mut coordination_tx,
        ItemStatus::Live,
        "ends_at",
        "auction_end",
        time_source,
    )
    .await?
    {
        Some(item) => item,
        None => return Ok(None),
    };

    let item_id = item.id;

    match process_item_end(&item, pool, time_source).await {
        Ok(transitioned) => {
            coordination_tx.commit().await?;
            Ok(Some(transitioned))
        }
        Err(e) => {
            let _ = record_sweep_failure(item_id, pool, time_source)
                .await
                .context("Failed to record sweep failure")
                .map_err(log_error);
            let _ = coordination_tx.commit().await;
            Err(e)
        }
    }
}

/// Select one item due for a lifecycle transition and take a
/// transaction-scoped advisory lock on it, skipping items another
/// scheduler instance holds and items in failure backoff.
/// Exponential backoff: 5 minutes * 2^failure_count, capped at 5
/// failures (max backoff ~2.5 hours).
async fn lock_next_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    status: ItemStatus,
    due_column: &str,
    lock_scope: &str,
    time_source: &TimeSource,
) -> anyhow::Result<Option<store::Item>> {
    sqlx::query_as::<_, store::Item>(&format!(
        "SELECT * FROM items
        WHERE status = $1
            AND deleted_at IS NULL
            AND {due_column} <= $2
            AND (
                sweep_failure_count = 0
                OR sweep_last_failed_at IS NULL
                OR $2 > sweep_last_failed_at +
                    INTERVAL '5 minutes' * POW(2, LEAST(sweep_failure_count, 5))
            )
            -- Try to take a transaction-scoped advisory lock for this item
            AND pg_try_advisory_xact_lock(
                hashtextextended('{lock_scope}:' || items.id::text, 0)
            )
        ORDER BY random()
        LIMIT 1",
    ))
    .bind(status)
    .bind(time_source.now().to_sqlx())
    .fetch_optional(&mut **tx)
    .await
    .map_err(Into::into)
}

async fn record_sweep_failure(
    item_id: payloads::ItemId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE items
        SET sweep_failure_count = sweep_failure_count + 1,
            sweep_last_failed_at = $1
        WHERE id = $2",
    )
    .bind(time_source.now().to_sqlx())
    .bind(item_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Start a single locked item in its own transaction. Re-validates
/// eligibility under the row lock; returns whether the item
/// transitioned.
#[tracing::instrument(skip(item, pool, time_source), fields(item_id = %item.id))]
async fn process_item_start(
    item: &store::Item,
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let item = store::get_item_for_update(&item.id, &mut tx)
        .await
        .context("re-fetching item for start")?;

    let now = time_source.now();
    if item.status != ItemStatus::Scheduled || now < item.starts_at {
        // Someone else got here first, or the schedule changed.
        return Ok(false);
    }

    let item = sqlx::query_as::<_, store::Item>(
        "UPDATE items
        SET status = $1,
            current_price = start_price,
            sweep_failure_count = 0,
            sweep_last_failed_at = NULL
        WHERE id = $2
        RETURNING *",
    )
    .bind(ItemStatus::Live)
    .bind(item.id)
    .fetch_one(&mut *tx)
    .await
    .context("transitioning item to live")?;

    tx.commit().await?;

    let _ = store::notifications::auction_started(&item, pool)
        .await
        .map_err(log_error);

    Ok(true)
}

/// How a finished auction settles: a winner, or no sale plus the reason
/// watchers are given.
fn losing_reason(
    reserve_price: Option<Decimal>,
    highest_bid: Option<Decimal>,
) -> Option<LostReason> {
    match highest_bid {
        None => Some(LostReason::NoBids),
        Some(amount) => match reserve_price {
            Some(reserve) if amount < reserve => {
                Some(LostReason::ReserveNotMet)
            }
            _ => None,
        },
    }
}

enum EndResult {
    Sold {
        winner: UserId,
        final_price: Decimal,
        order_number: String,
    },
    Unsold(LostReason),
}

/// End a single locked item in its own transaction: status, winning-bid
/// flag, and order creation are all-or-nothing. Notifications go out
/// after the commit, best-effort.
#[tracing::instrument(skip(item, pool, time_source), fields(item_id = %item.id))]
async fn process_item_end(
    item: &store::Item,
    pool: &PgPool,
    time_source: &TimeSource,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let item = store::get_item_for_update(&item.id, &mut tx)
        .await
        .context("re-fetching item for end")?;

    let now = time_source.now();
    if item.status != ItemStatus::Live || item.ends_at > now {
        // Already terminated by a buy-now or a concurrent sweep, or the
        // deadline moved forward via auto-extension after selection.
        return Ok(false);
    }

    let highest = sqlx::query_as::<_, store::Bid>(
        "SELECT * FROM bids WHERE item_id = $1
        ORDER BY amount DESC, created_at ASC
        LIMIT 1",
    )
    .bind(item.id)
    .fetch_optional(&mut *tx)
    .await
    .context("fetching highest bid")?;

    let item = sqlx::query_as::<_, store::Item>(
        "UPDATE items
        SET status = $1,
            sweep_failure_count = 0,
            sweep_last_failed_at = NULL
        WHERE id = $2
        RETURNING *",
    )
    .bind(ItemStatus::Ended)
    .bind(item.id)
    .fetch_one(&mut *tx)
    .await
    .context("transitioning item to ended")?;

    let reason =
        losing_reason(item.reserve_price, highest.as_ref().map(|b| b.amount));

    let result = match (highest, reason) {
        (Some(bid), None) => {
            sqlx::query("UPDATE bids SET is_winning = TRUE WHERE id = $1")
                .bind(bid.id)
                .execute(&mut *tx)
                .await
                .context("flagging winning bid")?;

            let order = store::orders::create_order_tx(
                &item.id,
                &bid.bidder_id,
                bid.amount,
                &mut tx,
                now,
            )
            .await
            .context("creating settlement order")?;

            EndResult::Sold {
                winner: bid.bidder_id,
                final_price: bid.amount,
                order_number: order.order_number,
            }
        }
        (_, Some(reason)) => EndResult::Unsold(reason),
        (None, None) => EndResult::Unsold(LostReason::NoBids),
    };

    tx.commit().await?;

    match result {
        EndResult::Sold {
            winner,
            final_price,
            order_number,
        } => {
            let _ = store::notifications::auction_won(
                &item,
                &winner,
                final_price,
                &order_number,
                pool,
            )
            .await
            .map_err(log_error);
        }
        EndResult::Unsold(reason) => {
            let _ = store::notifications::auction_lost(&item, reason, pool)
                .await
                .map_err(log_error);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::losing_reason;
    use payloads::LostReason;
    use rust_decimal::Decimal;

    fn won(n: i64) -> Option<Decimal> {
        Some(Decimal::new(n, 0))
    }

    #[test]
    fn no_reserve_and_any_bid_sells() {
        assert_eq!(losing_reason(None, won(110_000)), None);
    }

    #[test]
    fn bid_meeting_the_reserve_sells() {
        assert_eq!(losing_reason(won(800_000), won(800_000)), None);
        assert_eq!(losing_reason(won(800_000), won(950_000)), None);
    }

    #[test]
    fn bid_under_the_reserve_is_reserve_not_met() {
        assert_eq!(
            losing_reason(won(800_000), won(750_000)),
            Some(LostReason::ReserveNotMet)
        );
    }

    #[test]
    fn no_bids_is_no_bids_even_with_a_reserve() {
        assert_eq!(losing_reason(None, None), Some(LostReason::NoBids));
        assert_eq!(
            losing_reason(won(800_000), None),
            Some(LostReason::NoBids)
        );
    }
}
