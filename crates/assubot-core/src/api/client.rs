use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::envelope;
use super::error::ApiError;

/// REST client for the AssuBot backend.
///
/// Cheap to clone; clones share the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear_token(&self) {
        *self.token.write() = None;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.get_value(path, &[]).await?;
        decode(value)
    }

    pub async fn get_value(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        self.execute(Method::GET, path, query, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let value = self.post_value(path, body).await?;
        decode(value)
    }

    pub async fn post_value<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(ApiError::decode)?;
        self.execute(Method::POST, path, &[], Some(body)).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(ApiError::decode)?;
        let value = self.execute(Method::PATCH, path, &[], Some(body)).await?;
        decode(value)
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.execute(Method::DELETE, path, &[], None).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        tracing::debug!(%method, path, "api request");

        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(ApiError::from_transport)?;

        let result = envelope::normalize(status, &text);
        if let Err(e) = &result {
            tracing::warn!(%method, path, status, error = %e, "api call failed");
        }
        result
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(ApiError::decode)
}
