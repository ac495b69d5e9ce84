use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::{OrderId, requests};
use sqlx::PgPool;

use crate::routes::{APIError, get_user_id};
use crate::{store, time::TimeSource};

#[tracing::instrument(skip(request, pool), ret)]
#[post("/order")]
pub async fn get_order(
    request: HttpRequest,
    order_id: web::Json<OrderId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let order = store::orders::read_order(&order_id, &user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(order))
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/orders")]
pub async fn list_orders(
    request: HttpRequest,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let orders = store::orders::list_orders(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(orders))
}

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/mark_order_paid")]
pub async fn mark_order_paid(
    request: HttpRequest,
    details: web::Json<requests::MarkOrderPaid>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let order = store::orders::mark_order_paid(
        &details,
        &user_id,
        &pool,
        &time_source,
    )
    .await?;
    Ok(HttpResponse::Ok().json(order))
}

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/refund_order")]
pub async fn refund_order(
    request: HttpRequest,
    details: web::Json<requests::RefundOrder>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let order =
        store::orders::refund_order(&details, &user_id, &pool, &time_source)
            .await?;
    Ok(HttpResponse::Ok().json(order))
}

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/cancel_order")]
pub async fn cancel_order(
    request: HttpRequest,
    details: web::Json<requests::CancelOrder>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let order =
        store::orders::cancel_order(&details, &user_id, &pool, &time_source)
            .await?;
    Ok(HttpResponse::Ok().json(order))
}
