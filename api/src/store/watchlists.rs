//! Watchlists: a user's interest markers. Watchers are who the engine
//! notifies when an auction starts or closes without a sale.

use payloads::{ItemId, UserId, responses};
use sqlx::PgPool;

use super::*;

pub async fn watch_item(
    item_id: &ItemId,
    user_id: &UserId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    let _ = get_item(item_id, pool).await?;

    sqlx::query(
        "INSERT INTO watchlists (user_id, item_id) VALUES ($1, $2)",
    )
    .bind(user_id)
    .bind(item_id)
    .execute(pool)
    .await
    .map_err(|e| match StoreError::from(e) {
        StoreError::NotUnique(_) => StoreError::AlreadyWatching,
        e => e,
    })?;

    Ok(())
}

/// Remove an item from the watchlist. Removing an item that was never
/// watched is a no-op.
pub async fn unwatch_item(
    item_id: &ItemId,
    user_id: &UserId,
    pool: &PgPool,
) -> Result<(), StoreError> {
    sqlx::query(
        "DELETE FROM watchlists WHERE user_id = $1 AND item_id = $2",
    )
    .bind(user_id)
    .bind(item_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// The user's watched items, most recently watched first.
pub async fn list_watchlist(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<responses::Item>, StoreError> {
    let items = sqlx::query_as::<_, Item>(
        "SELECT items.* FROM items
        JOIN watchlists ON watchlists.item_id = items.id
        WHERE watchlists.user_id = $1 AND items.deleted_at IS NULL
        ORDER BY watchlists.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(items.into_iter().map(Item::into_response).collect())
}

/// Everyone watching an item.
pub(crate) async fn watcher_ids(
    item_id: &ItemId,
    pool: &PgPool,
) -> Result<Vec<UserId>, StoreError> {
    let watchers = sqlx::query_scalar::<_, UserId>(
        "SELECT user_id FROM watchlists WHERE item_id = $1",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(watchers)
}
