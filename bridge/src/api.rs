//! Non-streaming backend endpoints: config read/write/reset, document
//! folder selection, and document listing.

use serde_json::json;
use shared_types::{BackendConfig, ConfigUpdate, DbState, ErrorDetail, MessageResponse};
use tracing::debug;

use crate::error::TransportError;
use crate::transport::SessionTransport;

/// Thin client over the backend's request/response endpoints, sharing the
/// transport's loopback-pinned HTTP client.
#[derive(Debug, Clone)]
pub struct BackendApi {
    transport: SessionTransport,
}

impl BackendApi {
    pub fn new(transport: SessionTransport) -> Self {
        Self { transport }
    }

    /// `GET /config`
    pub async fn get_config(&self) -> Result<BackendConfig, TransportError> {
        let response = self
            .transport
            .client()
            .get(self.transport.url("/config"))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `POST /config`; a 4xx carries `{detail}` explaining the rejection.
    pub async fn update_config(&self, update: &ConfigUpdate) -> Result<(), TransportError> {
        let response = self
            .transport
            .client()
            .post(self.transport.url("/config"))
            .json(update)
            .send()
            .await?;
        check_status(response).await?;
        debug!("backend config updated");
        Ok(())
    }

    /// `POST /config/reset`
    pub async fn reset_config(&self) -> Result<(), TransportError> {
        let response = self
            .transport
            .client()
            .post(self.transport.url("/config/reset"))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// `POST /set-folder`; returns the backend's acknowledgement message.
    pub async fn set_folder(&self, path: &str) -> Result<String, TransportError> {
        let response = self
            .transport
            .client()
            .post(self.transport.url("/set-folder"))
            .json(&json!({ "path": path }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let ack: MessageResponse = response.json().await?;
        Ok(ack.message)
    }

    /// `GET /documents`
    pub async fn list_documents(&self) -> Result<Vec<String>, TransportError> {
        let response = self
            .transport
            .client()
            .get(self.transport.url("/documents"))
            .send()
            .await?;
        let response = check_status(response).await?;
        let list: shared_types::DocumentList = response.json().await?;
        Ok(list.documents)
    }

    /// `GET /db-state`; diagnostic view of the index contents.
    pub async fn db_state(&self) -> Result<DbState, TransportError> {
        let response = self
            .transport
            .client()
            .get(self.transport.url("/db-state"))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `GET /refresh-documents`
    pub async fn refresh_documents(&self) -> Result<String, TransportError> {
        let response = self
            .transport
            .client()
            .get(self.transport.url("/refresh-documents"))
            .send()
            .await?;
        let response = check_status(response).await?;
        let ack: MessageResponse = response.json().await?;
        Ok(ack.message)
    }
}

/// Map a non-2xx response to `TransportError::Status`, preferring the
/// backend's `{detail}` message as the body when it parses.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<ErrorDetail>(&body) {
        Ok(detail) => detail.detail,
        Err(_) => body,
    };
    Err(TransportError::Status { status, body })
}
