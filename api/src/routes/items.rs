use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::{ItemId, requests};
use sqlx::PgPool;

use crate::routes::{APIError, get_user_id, maybe_user_id};
use crate::{store, time::TimeSource};

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/create_item")]
pub async fn create_item(
    request: HttpRequest,
    details: web::Json<requests::CreateItem>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let item =
        store::items::create_item(&details, &user_id, &pool, &time_source)
            .await?;
    Ok(HttpResponse::Ok().json(item))
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/submit_item")]
pub async fn submit_item(
    request: HttpRequest,
    item_id: web::Json<ItemId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let item = store::items::submit_item(&item_id, &user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/item")]
pub async fn get_item(
    request: HttpRequest,
    item_id: web::Json<ItemId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let viewer = maybe_user_id(&request);
    let item =
        store::items::read_item(&item_id, viewer.as_ref(), &pool).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[tracing::instrument(skip(pool), ret)]
#[post("/items")]
pub async fn list_items(
    filters: web::Json<requests::ListItems>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let page = store::items::list_items(&filters, &pool).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/items_for_review")]
pub async fn list_items_for_review(
    request: HttpRequest,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let items = store::items::list_items_for_review(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(items))
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/approve_item")]
pub async fn approve_item(
    request: HttpRequest,
    item_id: web::Json<ItemId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let item = store::items::approve_item(&item_id, &user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/reject_item")]
pub async fn reject_item(
    request: HttpRequest,
    details: web::Json<requests::RejectItem>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let item = store::items::reject_item(&details, &user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(item))
}
