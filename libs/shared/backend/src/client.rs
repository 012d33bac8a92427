use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::BackendError;
use crate::idempotency::{IdempotencyKey, IDEMPOTENCY_HEADER};
use crate::session::SessionContext;

/// REST client for the booking backend (users, appointments, schedules).
pub struct BookingApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionContext>,
}

impl BookingApiClient {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionContext>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.booking_api_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    fn get_headers(&self, idempotency_key: Option<&IdempotencyKey>) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.session.access_token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| BackendError::Unauthorized("Access token is not a valid header value".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        if let Some(key) = idempotency_key {
            let value = HeaderValue::from_str(key.as_str())
                .map_err(|_| BackendError::Rejected("Idempotency key is not a valid header value".to_string()))?;
            headers.insert(IDEMPOTENCY_HEADER, value);
        }

        Ok(headers)
    }

    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.get_headers(idempotency_key)?);

        if let Some(body_data) = body {
            req = req.json(body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Booking API error ({}): {}", status, text);
            return Err(BackendError::from_status(status.as_u16(), text));
        }

        // Mutations may answer with an empty body.
        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(payload)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.request::<T, ()>(Method::GET, path, None, None).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B, key: &IdempotencyKey) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Some(body), Some(key)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: Option<&B>, key: &IdempotencyKey) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, body, Some(key)).await
    }
}
