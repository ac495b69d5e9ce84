use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::{ItemId, requests};
use sqlx::PgPool;

use crate::routes::{APIError, get_user_id};
use crate::{store, time::TimeSource};

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/place_bid")]
pub async fn place_bid(
    request: HttpRequest,
    details: web::Json<requests::PlaceBid>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let placed =
        store::bids::place_bid(&details, &user_id, &pool, &time_source)
            .await?;
    Ok(HttpResponse::Ok().json(placed))
}

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/buy_now")]
pub async fn buy_now(
    request: HttpRequest,
    details: web::Json<requests::BuyNow>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let receipt =
        store::bids::buy_now(&details, &user_id, &pool, &time_source).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/item_bids")]
pub async fn list_item_bids(
    item_id: web::Json<ItemId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let bids = store::bids::list_item_bids(&item_id, &pool).await?;
    Ok(HttpResponse::Ok().json(bids))
}
