use crate::{ItemId, OrderId, UserId, requests, responses};
use reqwest::StatusCode;
use serde::Serialize;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the backend.
///
/// Authentication is handled by the fronting gateway; this client
/// forwards the acting user via the `x-user-id` header, matching what
/// the gateway would inject.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
    pub acting_user: Option<UserId>,
}

/// Helper methods for http actions
impl APIClient {
    pub fn new(address: String) -> Self {
        Self {
            address,
            inner_client: reqwest::Client::new(),
            acting_user: None,
        }
    }

    /// Make subsequent requests on behalf of the given user.
    pub fn act_as(&mut self, user_id: UserId) {
        self.acting_user = Some(user_id);
    }

    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    fn with_identity(
        &self,
        request: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        match &self.acting_user {
            Some(user_id) => {
                request.header("x-user-id", user_id.to_string())
            }
            None => request,
        }
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        let request = self.inner_client.post(self.format_url(path)).json(body);
        self.with_identity(request).send().await
    }

    async fn empty_post(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.post(self.format_url(path));
        self.with_identity(request).send().await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.get(self.format_url(path));
        self.with_identity(request).send().await
    }
}

/// Methods on the backend API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn create_account(
        &self,
        details: &requests::CreateAccount,
    ) -> Result<UserId, ClientError> {
        let response = self.post("create_account", details).await?;
        ok_body(response).await
    }

    /// Create a listing, either as a draft or submitted for review.
    pub async fn create_item(
        &self,
        details: &requests::CreateItem,
    ) -> Result<responses::Item, ClientError> {
        let response = self.post("create_item", details).await?;
        ok_body(response).await
    }

    /// Submit a draft listing for admin review.
    pub async fn submit_item(
        &self,
        item_id: &ItemId,
    ) -> Result<responses::Item, ClientError> {
        let response = self.post("submit_item", item_id).await?;
        ok_body(response).await
    }

    pub async fn get_item(
        &self,
        item_id: &ItemId,
    ) -> Result<responses::Item, ClientError> {
        let response = self.post("item", item_id).await?;
        ok_body(response).await
    }

    pub async fn list_items(
        &self,
        filters: &requests::ListItems,
    ) -> Result<responses::ItemPage, ClientError> {
        let response = self.post("items", filters).await?;
        ok_body(response).await
    }

    /// Listings awaiting review, oldest first (admin only).
    pub async fn list_items_for_review(
        &self,
    ) -> Result<Vec<responses::Item>, ClientError> {
        let response = self.empty_post("items_for_review").await?;
        ok_body(response).await
    }

    /// Approve a reviewed listing, scheduling its auction (admin only).
    pub async fn approve_item(
        &self,
        item_id: &ItemId,
    ) -> Result<responses::Item, ClientError> {
        let response = self.post("approve_item", item_id).await?;
        ok_body(response).await
    }

    /// Reject a reviewed listing with a reason (admin only).
    pub async fn reject_item(
        &self,
        details: &requests::RejectItem,
    ) -> Result<responses::Item, ClientError> {
        let response = self.post("reject_item", details).await?;
        ok_body(response).await
    }

    pub async fn place_bid(
        &self,
        details: &requests::PlaceBid,
    ) -> Result<responses::BidPlaced, ClientError> {
        let response = self.post("place_bid", details).await?;
        ok_body(response).await
    }

    pub async fn buy_now(
        &self,
        details: &requests::BuyNow,
    ) -> Result<responses::BuyNowReceipt, ClientError> {
        let response = self.post("buy_now", details).await?;
        ok_body(response).await
    }

    /// Bid history for an item, newest first.
    pub async fn list_item_bids(
        &self,
        item_id: &ItemId,
    ) -> Result<Vec<responses::Bid>, ClientError> {
        let response = self.post("item_bids", item_id).await?;
        ok_body(response).await
    }

    pub async fn get_order(
        &self,
        order_id: &OrderId,
    ) -> Result<responses::Order, ClientError> {
        let response = self.post("order", order_id).await?;
        ok_body(response).await
    }

    /// Orders where the acting user is the buyer.
    pub async fn list_orders(
        &self,
    ) -> Result<Vec<responses::Order>, ClientError> {
        let response = self.empty_post("orders").await?;
        ok_body(response).await
    }

    pub async fn mark_order_paid(
        &self,
        details: &requests::MarkOrderPaid,
    ) -> Result<responses::Order, ClientError> {
        let response = self.post("mark_order_paid", details).await?;
        ok_body(response).await
    }

    pub async fn refund_order(
        &self,
        details: &requests::RefundOrder,
    ) -> Result<responses::Order, ClientError> {
        let response = self.post("refund_order", details).await?;
        ok_body(response).await
    }

    pub async fn cancel_order(
        &self,
        details: &requests::CancelOrder,
    ) -> Result<responses::Order, ClientError> {
        let response = self.post("cancel_order", details).await?;
        ok_body(response).await
    }

    pub async fn watch_item(
        &self,
        item_id: &ItemId,
    ) -> Result<(), ClientError> {
        let response = self.post("watch_item", item_id).await?;
        ok_empty(response).await
    }

    pub async fn unwatch_item(
        &self,
        item_id: &ItemId,
    ) -> Result<(), ClientError> {
        let response = self.post("unwatch_item", item_id).await?;
        ok_empty(response).await
    }

    pub async fn get_watchlist(
        &self,
    ) -> Result<Vec<responses::Item>, ClientError> {
        let response = self.empty_post("watchlist").await?;
        ok_body(response).await
    }

    pub async fn list_notifications(
        &self,
    ) -> Result<Vec<responses::Notification>, ClientError> {
        let response = self.empty_post("notifications").await?;
        ok_body(response).await
    }

    pub async fn mark_notification_read(
        &self,
        details: &requests::MarkNotificationRead,
    ) -> Result<(), ClientError> {
        let response = self.post("mark_notification_read", details).await?;
        ok_empty(response).await
    }

    pub async fn mark_all_notifications_read(
        &self,
    ) -> Result<(), ClientError> {
        let response = self.empty_post("mark_all_notifications_read").await?;
        ok_empty(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
