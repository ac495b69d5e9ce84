//! Notification records and the message copy for each engine event.
//!
//! All of these are best-effort side effects: callers invoke them after
//! their own transaction has committed and log failures instead of
//! propagating them. Delivery (push, email) is a downstream consumer's
//! concern; the engine only persists the rows.

use jiff_sqlx::ToSqlx;
use payloads::{
    LostReason, NotificationKind, UserId, requests, responses,
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use sqlx::types::Json;

use super::*;
use crate::time::TimeSource;

async fn create(
    user_id: &UserId,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: serde_json::Value,
    pool: &PgPool,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO notifications (user_id, kind, title, message, data)
        VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(kind)
    .bind(title)
    .bind(message)
    .bind(Json(data))
    .execute(pool)
    .await?;

    Ok(())
}

/// Format a whole-won amount with thousands separators, the way prices
/// appear in user-facing copy.
fn format_won(amount: &Decimal) -> String {
    let digits = amount.trunc().abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Tell every watcher that the auction has gone live.
pub(crate) async fn auction_started(
    item: &Item,
    pool: &PgPool,
) -> anyhow::Result<()> {
    let watchers = watchlists::watcher_ids(&item.id, pool).await?;
    for user_id in watchers {
        create(
            &user_id,
            NotificationKind::AuctionStart,
            "경매 시작",
            &format!(
                "관심 상품 \"{}\"의 경매가 시작되었습니다.",
                item.title
            ),
            json!({
                "itemId": item.id,
                "itemTitle": item.title,
            }),
            pool,
        )
        .await?;
    }
    Ok(())
}

/// Congratulate the winning bidder and point them at their order.
pub(crate) async fn auction_won(
    item: &Item,
    winner: &UserId,
    final_price: Decimal,
    order_number: &str,
    pool: &PgPool,
) -> anyhow::Result<()> {
    create(
        winner,
        NotificationKind::AuctionWon,
        "낙찰 축하합니다!",
        &format!(
            "\"{}\" 낙찰을 축하합니다. 24시간 이내에 결제를 완료해주세요.",
            item.title
        ),
        json!({
            "itemId": item.id,
            "itemTitle": item.title,
            "finalPrice": final_price,
            "orderNumber": order_number,
        }),
        pool,
    )
    .await?;
    Ok(())
}

/// Tell watchers the auction closed without a sale, and why.
pub(crate) async fn auction_lost(
    item: &Item,
    reason: LostReason,
    pool: &PgPool,
) -> anyhow::Result<()> {
    let watchers = watchlists::watcher_ids(&item.id, pool).await?;
    for user_id in watchers {
        create(
            &user_id,
            NotificationKind::AuctionLost,
            "경매 종료",
            &format!("\"{}\" 경매가 유찰되었습니다.", item.title),
            json!({
                "itemId": item.id,
                "itemTitle": item.title,
                "reason": reason,
            }),
            pool,
        )
        .await?;
    }
    Ok(())
}

/// Tell a superseded bidder they are no longer winning.
pub(crate) async fn outbid(
    item: &Item,
    user_id: &UserId,
    pool: &PgPool,
) -> anyhow::Result<()> {
    create(
        user_id,
        NotificationKind::Outbid,
        "상위 입찰 알림",
        &format!(
            "\"{}\"에 더 높은 입찰이 등록되었습니다. 현재가는 {}원입니다.",
            item.title,
            format_won(&item.current_price),
        ),
        json!({
            "itemId": item.id,
            "itemTitle": item.title,
            "currentPrice": item.current_price,
        }),
        pool,
    )
    .await?;
    Ok(())
}

pub(crate) async fn item_approved(
    item: &Item,
    pool: &PgPool,
) -> anyhow::Result<()> {
    create(
        &item.seller_id,
        NotificationKind::AdminMessage,
        "상품 승인 완료",
        &format!("상품 \"{}\"이 승인되었습니다.", item.title),
        json!({
            "itemId": item.id,
            "itemTitle": item.title,
        }),
        pool,
    )
    .await?;
    Ok(())
}

pub(crate) async fn item_rejected(
    item: &Item,
    reason: &str,
    pool: &PgPool,
) -> anyhow::Result<()> {
    create(
        &item.seller_id,
        NotificationKind::AdminMessage,
        "상품 거부됨",
        &format!(
            "상품 \"{}\"이 거부되었습니다. 사유: {}",
            item.title, reason
        ),
        json!({
            "itemId": item.id,
            "itemTitle": item.title,
            "reason": reason,
        }),
        pool,
    )
    .await?;
    Ok(())
}

pub(crate) async fn payment_confirmed(
    order: &Order,
    pool: &PgPool,
) -> anyhow::Result<()> {
    create(
        &order.buyer_id,
        NotificationKind::PaymentConfirmed,
        "결제 완료",
        &format!("주문 {}의 결제가 완료되었습니다.", order.order_number),
        json!({
            "orderId": order.id,
            "orderNumber": order.order_number,
            "totalAmount": order.total_amount,
        }),
        pool,
    )
    .await?;
    Ok(())
}

/// The user's notifications, newest first.
pub async fn list_notifications(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<responses::Notification>, StoreError> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 100",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(notifications
        .into_iter()
        .map(Notification::into_response)
        .collect())
}

/// Mark one notification read. Re-reading keeps the original read time.
pub async fn mark_notification_read(
    details: &requests::MarkNotificationRead,
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = COALESCE(read_at, $1)
        WHERE id = $2 AND user_id = $3",
    )
    .bind(time_source.now().to_sqlx())
    .bind(details.notification_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotificationNotFound);
    }

    Ok(())
}

pub async fn mark_all_notifications_read(
    user_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE notifications SET read_at = $1
        WHERE user_id = $2 AND read_at IS NULL",
    )
    .bind(time_source.now().to_sqlx())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::format_won;
    use rust_decimal::Decimal;

    #[test]
    fn formats_prices_with_thousands_separators() {
        let f = |n: i64| format_won(&Decimal::new(n, 0));
        assert_eq!(f(0), "0");
        assert_eq!(f(999), "999");
        assert_eq!(f(1_000), "1,000");
        assert_eq!(f(110_000), "110,000");
        assert_eq!(f(2_140_000), "2,140,000");
        assert_eq!(f(1_234_567_890), "1,234,567,890");
    }
}
