use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::ItemId;
use sqlx::PgPool;

use crate::routes::{APIError, get_user_id};
use crate::store;

#[tracing::instrument(skip(request, pool), ret)]
#[post("/watch_item")]
pub async fn watch_item(
    request: HttpRequest,
    item_id: web::Json<ItemId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    store::watchlists::watch_item(&item_id, &user_id, &pool).await?;
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/unwatch_item")]
pub async fn unwatch_item(
    request: HttpRequest,
    item_id: web::Json<ItemId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    store::watchlists::unwatch_item(&item_id, &user_id, &pool).await?;
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(request, pool), ret)]
#[post("/watchlist")]
pub async fn get_watchlist(
    request: HttpRequest,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let items = store::watchlists::list_watchlist(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(items))
}
