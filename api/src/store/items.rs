//! Listing creation, browsing, and the admin review workflow.
//!
//! Listings are created as drafts or submitted straight for review; an
//! admin approves them into `Scheduled` (from where the start sweep
//! takes over) or rejects them into the terminal `Canceled` state. Both
//! review decisions are recorded in the audit log within the same
//! transaction as the status change.

use jiff_sqlx::ToSqlx;
use payloads::requests::{self, REJECT_REASON_MAX_LEN};
use payloads::{ItemId, ItemStatus, UserId, responses};
use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;

use super::*;
use crate::telemetry::log_error;
use crate::time::TimeSource;

pub async fn create_item(
    details: &requests::CreateItem,
    seller_id: &UserId,
    pool: &PgPool,
    time_source: &TimeSource,
) -> Result<responses::Item, StoreError> {
    let _ = get_validated_user(seller_id, pool).await?;

    let validation = requests::validate_item(&details.details);
    if let Some(reason) = validation.error_message() {
        return Err(StoreError::InvalidListing { reason });
    }

    let listing = &details.details;
    let status = if details.draft {
        ItemStatus::Draft
    } else {
        ItemStatus::PendingReview
    };

    let item = sqlx::query_as::<_, Item>(
        "INSERT INTO items (
            seller_id,
            title,
            description,
            species,
            style,
            height_cm,
            age_years_est,
            status,
            start_price,
            current_price,
            buy_now_price,
            reserve_price,
            bid_step,
            starts_at,
            ends_at,
            auto_extend_minutes,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, $11, $12,
            $13, $14, $15, $16, $16)
        RETURNING *",
    )
    .bind(seller_id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(&listing.species)
    .bind(&listing.style)
    .bind(listing.height_cm)
    .bind(listing.age_years_est)
    .bind(status)
    .bind(listing.start_price)
    .bind(listing.buy_now_price)
    .bind(listing.reserve_price)
    .bind(listing.bid_step)
    .bind(listing.starts_at.to_sqlx())
    .bind(listing.ends_at.to_sqlx())
    .bind(listing.auto_extend_minutes)
    .bind(time_source.now().to_sqlx())
    .fetch_one(pool)
    .await?;

    Ok(item.into_response())
}

/// Submit a draft for admin review.
pub async fn submit_item(
    item_id: &ItemId,
    seller_id: &UserId,
    pool: &PgPool,
) -> Result<responses::Item, StoreError> {
    let mut tx = pool.begin().await?;

    let item = get_item_for_update(item_id, &mut tx).await?;
    if item.seller_id != *seller_id {
        return Err(StoreError::NotItemOwner);
    }
    if item.status != ItemStatus::Draft {
        return Err(StoreError::NotADraft);
    }

    let item = sqlx::query_as::<_, Item>(
        "UPDATE items SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(ItemStatus::PendingReview)
    .bind(item_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(item.into_response())
}

/// Fetch a single listing. Drafts and listings still under review are
/// only visible to their seller.
pub async fn read_item(
    item_id: &ItemId,
    viewer: Option<&UserId>,
    pool: &PgPool,
) -> Result<responses::Item, StoreError> {
    let item = get_item(item_id, pool).await?;

    let hidden = matches!(
        item.status,
        ItemStatus::Draft | ItemStatus::PendingReview
    );
    if hidden && viewer != Some(&item.seller_id) {
        return Err(StoreError::ItemNotFound);
    }

    Ok(item.into_response())
}

/// Browse listings with optional filters, sorted and paginated.
pub async fn list_items(
    filters: &requests::ListItems,
    pool: &PgPool,
) -> Result<responses::ItemPage, StoreError> {
    let limit = filters.limit.clamp(1, 100);
    let page = filters.page.max(1);
    let offset = (page - 1) * limit;

    let order_clause = match filters.sort {
        requests::ItemSort::Newest => "created_at DESC",
        requests::ItemSort::PriceAsc => "current_price ASC",
        requests::ItemSort::PriceDesc => "current_price DESC",
        requests::ItemSort::EndingSoon => "ends_at ASC",
    };

    const FILTER_CLAUSE: &str = "deleted_at IS NULL
        AND ($1::item_status IS NULL OR status = $1)
        AND ($2::text IS NULL OR species ILIKE '%' || $2 || '%')
        AND ($3::numeric IS NULL OR current_price >= $3)
        AND ($4::numeric IS NULL OR current_price <= $4)
        AND ($5::text IS NULL
            OR title ILIKE '%' || $5 || '%'
            OR description ILIKE '%' || $5 || '%')";

    let items = sqlx::query_as::<_, Item>(&format!(
        "SELECT * FROM items WHERE {FILTER_CLAUSE}
        ORDER BY {order_clause}
        LIMIT $6 OFFSET $7",
    ))
    .bind(filters.status)
    .bind(&filters.species)
    .bind(filters.min_price)
    .bind(filters.max_price)
    .bind(&filters.search)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM items WHERE {FILTER_CLAUSE}",
    ))
    .bind(filters.status)
    .bind(&filters.species)
    .bind(filters.min_price)
    .bind(filters.max_price)
    .bind(&filters.search)
    .fetch_one(pool)
    .await?;

    Ok(responses::ItemPage {
        items: items.into_iter().map(Item::into_response).collect(),
        total,
        page,
        limit,
    })
}

/// The admin review queue, oldest submission first.
pub async fn list_items_for_review(
    user_id: &UserId,
    pool: &PgPool,
) -> Result<Vec<responses::Item>, StoreError> {
    let _ = get_validated_admin(user_id, pool).await?;

    let items = sqlx::query_as::<_, Item>(
        "SELECT * FROM items
        WHERE status = $1 AND deleted_at IS NULL
        ORDER BY created_at",
    )
    .bind(ItemStatus::PendingReview)
    .fetch_all(pool)
    .await?;

    Ok(items.into_iter().map(Item::into_response).collect())
}

/// Approve a reviewed listing, scheduling its auction.
#[instrument(skip(pool))]
pub async fn approve_item(
    item_id: &ItemId,
    user_id: &UserId,
    pool: &PgPool,
) -> Result<responses::Item, StoreError> {
    let admin = get_validated_admin(user_id, pool).await?;

    let mut tx = pool.begin().await?;

    let item = get_item_for_update(item_id, &mut tx).await?;
    if item.status != ItemStatus::PendingReview {
        return Err(StoreError::NotAwaitingReview);
    }

    let item = sqlx::query_as::<_, Item>(
        "UPDATE items SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(ItemStatus::Scheduled)
    .bind(item_id)
    .fetch_one(&mut *tx)
    .await?;

    create_audit_log_tx(
        &admin.0.id,
        "item_approved",
        item_id,
        json!({
            "status": { "from": "PENDING_REVIEW", "to": "SCHEDULED" },
        }),
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    let _ = notifications::item_approved(&item, pool)
        .await
        .map_err(log_error);

    Ok(item.into_response())
}

/// Reject a reviewed listing. The listing becomes `Canceled`, which is
/// terminal; the seller has to relist from scratch.
#[instrument(skip(pool))]
pub async fn reject_item(
    details: &requests::RejectItem,
    user_id: &UserId,
    pool: &PgPool,
) -> Result<responses::Item, StoreError> {
    let admin = get_validated_admin(user_id, pool).await?;

    if details.reason.trim().is_empty() {
        return Err(StoreError::InvalidListing {
            reason: "A rejection reason is required",
        });
    }
    if details.reason.len() > REJECT_REASON_MAX_LEN {
        return Err(StoreError::FieldTooLong);
    }

    let mut tx = pool.begin().await?;

    let item = get_item_for_update(&details.item_id, &mut tx).await?;
    if item.status != ItemStatus::PendingReview {
        return Err(StoreError::NotAwaitingReview);
    }

    let item = sqlx::query_as::<_, Item>(
        "UPDATE items SET status = $1, reject_reason = $2
        WHERE id = $3 RETURNING *",
    )
    .bind(ItemStatus::Canceled)
    .bind(&details.reason)
    .bind(details.item_id)
    .fetch_one(&mut *tx)
    .await?;

    create_audit_log_tx(
        &admin.0.id,
        "item_rejected",
        &details.item_id,
        json!({
            "status": { "from": "PENDING_REVIEW", "to": "CANCELED" },
            "reason": details.reason,
        }),
        &mut tx,
    )
    .await?;

    tx.commit().await?;

    let _ = notifications::item_rejected(&item, &details.reason, pool)
        .await
        .map_err(log_error);

    Ok(item.into_response())
}
