pub mod bids;
pub mod items;
pub mod notifications;
pub mod orders;
pub mod users;
pub mod watchlists;

use actix_web::{
    HttpRequest, HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, web,
};
use uuid::Uuid;

use crate::store::StoreError;

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(users::create_account)
        .service(items::create_item)
        .service(items::submit_item)
        .service(items::get_item)
        .service(items::list_items)
        .service(items::list_items_for_review)
        .service(items::approve_item)
        .service(items::reject_item)
        .service(bids::place_bid)
        .service(bids::buy_now)
        .service(bids::list_item_bids)
        .service(orders::get_order)
        .service(orders::list_orders)
        .service(orders::mark_order_paid)
        .service(orders::refund_order)
        .service(orders::cancel_order)
        .service(watchlists::watch_item)
        .service(watchlists::unwatch_item)
        .service(watchlists::get_watchlist)
        .service(notifications::list_notifications)
        .service(notifications::mark_notification_read)
        .service(notifications::mark_all_notifications_read)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Permission denied")]
    Forbidden(#[source] anyhow::Error),
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::AuthError(e) => {
                HttpResponse::Unauthorized().body(format!("{self}: {e}"))
            }
            Self::Forbidden(e) => {
                HttpResponse::Forbidden().body(format!("{self}: {e}"))
            }
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) => APIError::UnexpectedError(e.into()),
            StoreError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::ItemNotFound => APIError::NotFound(e.into()),
            StoreError::UserNotFound => APIError::NotFound(e.into()),
            StoreError::OrderNotFound => APIError::NotFound(e.into()),
            StoreError::NotificationNotFound => APIError::NotFound(e.into()),
            StoreError::OwnItem => APIError::Forbidden(e.into()),
            StoreError::NotItemOwner => APIError::Forbidden(e.into()),
            StoreError::RequiresAdminPermissions => {
                APIError::Forbidden(e.into())
            }
            _ => APIError::BadRequest(e.into()),
        }
    }
}

/// The acting user, as placed in the `x-user-id` header by the fronting
/// gateway. Authentication itself happens there; the API only needs the
/// request-scoped identity.
fn get_user_id(request: &HttpRequest) -> Result<payloads::UserId, APIError> {
    let raw = request
        .headers()
        .get("x-user-id")
        .ok_or_else(|| {
            APIError::AuthError(anyhow::anyhow!("Missing x-user-id header"))
        })?
        .to_str()
        .map_err(|e| {
            APIError::AuthError(
                anyhow::Error::from(e).context("Invalid identity header"),
            )
        })?;
    // special case: since this is used in so many routes, the user_id is
    // recorded here, but attaches to the span for the api route itself
    tracing::Span::current().record("user_id", tracing::field::display(raw));
    Ok(payloads::UserId(Uuid::parse_str(raw).map_err(|e| {
        APIError::AuthError(
            anyhow::Error::from(e).context("Invalid identity header"),
        )
    })?))
}

/// Identity for routes that serve both anonymous and logged-in callers.
fn maybe_user_id(request: &HttpRequest) -> Option<payloads::UserId> {
    get_user_id(request).ok()
}
