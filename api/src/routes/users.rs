use actix_web::{HttpResponse, post, web};
use sqlx::PgPool;

use crate::routes::APIError;
use crate::store;

#[tracing::instrument(skip(pool), ret)]
#[post("/create_account")]
pub async fn create_account(
    details: web::Json<payloads::requests::CreateAccount>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let user_id = store::users::create_account(&details, &pool).await?;
    Ok(HttpResponse::Ok().json(user_id))
}
