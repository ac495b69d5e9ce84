use actix_web::{HttpRequest, HttpResponse, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::routes::{APIError, get_user_id};
use crate::{store, time::TimeSource};

#[tracing::instrument(skip(request, pool), ret)]
#[post("/notifications")]
pub async fn list_notifications(
    request: HttpRequest,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    let notifications =
        store::notifications::list_notifications(&user_id, &pool).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/mark_notification_read")]
pub async fn mark_notification_read(
    request: HttpRequest,
    details: web::Json<requests::MarkNotificationRead>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    store::notifications::mark_notification_read(
        &details,
        &user_id,
        &pool,
        &time_source,
    )
    .await?;
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(skip(request, pool, time_source), ret)]
#[post("/mark_all_notifications_read")]
pub async fn mark_all_notifications_read(
    request: HttpRequest,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let user_id = get_user_id(&request)?;
    store::notifications::mark_all_notifications_read(
        &user_id,
        &pool,
        &time_source,
    )
    .await?;
    Ok(HttpResponse::Ok().finish())
}
