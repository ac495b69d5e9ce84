//! Account provisioning. Authentication itself lives in the fronting
//! gateway; the marketplace only keeps the identity rows that listings,
//! bids, and orders reference.

use payloads::{UserId, requests};
use sqlx::PgPool;

use super::*;

pub const EMAIL_MAX_LEN: usize = 255;
pub const USERNAME_MAX_LEN: usize = 30;

pub async fn create_account(
    details: &requests::CreateAccount,
    pool: &PgPool,
) -> Result<UserId, StoreError> {
    if details.email.len() > EMAIL_MAX_LEN
        || details.username.len() > USERNAME_MAX_LEN
    {
        return Err(StoreError::FieldTooLong);
    }

    let user_id = sqlx::query_as::<_, UserId>(
        "INSERT INTO users (email, username) VALUES ($1, $2) RETURNING id",
    )
    .bind(&details.email)
    .bind(&details.username)
    .fetch_one(pool)
    .await?;

    Ok(user_id)
}
