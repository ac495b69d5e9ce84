//! Settlement records. Orders are only ever created by the engine (end
//! sweep win or buy-now); afterwards the item is never mutated again and
//! only the order's payment status moves.

use jiff::Timestamp;
use jiff_sqlx::ToSqlx;
use payloads::{
    ItemId, OrderId, PaymentStatus, Settlement, UserId, requests, responses,
};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::*;
use crate::telemetry::log_error;
use crate::time::TimeSource;

/// Human-referenceable order number, unique by construction (millisecond
/// timestamp plus a random suffix) and additionally enforced unique by
/// the schema.
fn generate_order_number(now: Timestamp) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(9)
        .collect();
    format!("ORD-{}-{}", now.as_millisecond(), suffix)
}

/// Create the settlement order for an item, within the transaction that
/// ends its auction. One order per item, enforced by the unique
/// constraint on `item_id`.
pub(crate) async fn create_order_tx(
    item_id: &ItemId,
    buyer_id: &UserId,
    final_price: rust_decimal::Decimal,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    now: Timestamp,
) -> Result<Order, StoreError> {
    let settlement = Settlement::for_price(final_price);
    let order_number = generate_order_number(now);

    let order = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (
            order_number,
            item_id,
            buyer_id,
            final_price,
            buyer_premium,
            seller_fee,
            total_amount,
            payment_status,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) RETURNING *",
    )
    .bind(&order_number)
    .bind(item_id)
    .bind(buyer_id)
    .bind(settlement.final_price)
    .bind(settlement.buyer_premium)
    .bind(settlement.seller_fee)
    .bind(settlement.total_amount)
    .bind(PaymentStatus::Pending)
    .bind(now.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;

    Ok(order)
}

/// Fetch an order. Visible to the buyer, the item's seller, and admins.
pub async fn read_order(
    order_id: &OrderId,
    user_id: &UserId,
    pool: &PgPool,
) -> Result<responses::Order, StoreError> {
    let order = get_order(order_id, pool).await?;

    if order.buyer_id != *user_id {
        let seller_id = sqlx::query_scalar::<_, UserId>(
            "SELECT seller_id FROM items WHERE id = $1",
        )
        .bind(order.item_id)
        .fetch_one(pool)
        .await?;

        if seller_id != *user_id {
            let _ = get_validated_admin(user_id, pool).await?;
        }
    }

    Ok(order.into_response())
}

/// Orders where the given user is the buyer, newest first.
pub async fn list_orders(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<responses::Order>, StoreError> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(orders.into_iter().map(Order::into_response).collect())
}

/// Record a completed payment: `PENDING -> PAID`. The payment itself is
/// captured by the external gateway; this is the downstream status
/// write, restricted to admins.
#[instrument(skip(pool, time_source))]
pub async fn mark_order_paid(
    details: &requests::MarkOrderPaid,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::Order, StoreError> {
    let _ = get_validated_admin(user_id, pool).await?;

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_status = $1, paid_at = $2
        WHERE id = $3 AND payment_status = $4
        RETURNING *",
    )
    .bind(PaymentStatus::Paid)
    .bind(time_source.now().to_sqlx())
    .bind(details.order_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(pool)
    .await?;

    let order = match order {
        Some(order) => order,
        None => {
            // Distinguish a missing order from one in the wrong state.
            let _ = get_order(&details.order_id, pool).await?;
            return Err(StoreError::OrderNotPayable);
        }
    };

    let _ = notifications::payment_confirmed(&order, pool)
        .await
        .map_err(log_error);

    Ok(order.into_response())
}

/// Refund a paid order: `PAID -> REFUNDED`.
#[instrument(skip(pool, time_source))]
pub async fn refund_order(
    details: &requests::RefundOrder,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::Order, StoreError> {
    let _ = get_validated_admin(user_id, pool).await?;

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_status = $1, canceled_at = $2
        WHERE id = $3 AND payment_status = $4
        RETURNING *",
    )
    .bind(PaymentStatus::Refunded)
    .bind(time_source.now().to_sqlx())
    .bind(details.order_id)
    .bind(PaymentStatus::Paid)
    .fetch_optional(pool)
    .await?;

    match order {
        Some(order) => Ok(order.into_response()),
        None => {
            let _ = get_order(&details.order_id, pool).await?;
            Err(StoreError::OrderNotRefundable)
        }
    }
}

/// Cancel an unpaid order: `PENDING -> CANCELED`.
#[instrument(skip(pool, time_source))]
pub async fn cancel_order(
    details: &requests::CancelOrder,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::Order, StoreError> {
    let _ = get_validated_admin(user_id, pool).await?;

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET payment_status = $1, canceled_at = $2
        WHERE id = $3 AND payment_status = $4
        RETURNING *",
    )
    .bind(PaymentStatus::Canceled)
    .bind(time_source.now().to_sqlx())
    .bind(details.order_id)
    .bind(PaymentStatus::Pending)
    .fetch_optional(pool)
    .await?;

    match order {
        Some(order) => Ok(order.into_response()),
        None => {
            let _ = get_order(&details.order_id, pool).await?;
            Err(StoreError::OrderNotPayable)
        }
    }
}

async fn get_order(
    order_id: &OrderId,
    pool: &PgPool,
) -> Result<Order, StoreError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::OrderNotFound,
            e => StoreError::Database(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_are_prefixed_and_distinct() {
        let now = Timestamp::UNIX_EPOCH;
        let a = generate_order_number(now);
        let b = generate_order_number(now);
        assert!(a.starts_with("ORD-0-"));
        assert_ne!(a, b);
        // "ORD-" + millis + "-" + 9 random characters
        assert_eq!(a.rsplit('-').next().unwrap().len(), 9);
    }
}
