// src/client.rs

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::auth::{AuthConfig, AuthProvider};
use crate::config::KronosConfig;
use crate::error::{extract_api_error, KronosError};

pub const API_PREFIX: &str = "/api/v1";

/// Transport wrapper for the remote KRONOS API: joins URLs under `/api/v1`,
/// attaches the bearer token, deserializes typed responses, and implements
/// the reactive 401-refresh-and-retry-once policy. No caching and no other
/// automatic retries live at this layer.
pub struct KronosClient {
    http: Client,
    base_url: String,
    auth: AuthProvider,
}

impl KronosClient {
    pub fn new(config: KronosConfig) -> Result<Arc<Self>, KronosError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let auth = AuthProvider::new(http.clone(), AuthConfig::from_config(&config));
        Ok(Arc::new(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth,
        }))
    }

    #[cfg(test)]
    pub(crate) fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    fn url(&self, path: &str) -> Result<String, KronosError> {
        let url = format!("{}{}{}", self.base_url, API_PREFIX, path);
        Url::parse(&url)?;
        Ok(url)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, KronosError> {
        self.send(Method::GET, path, &[], None).await
    }

    pub(crate) async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, KronosError> {
        self.send(Method::GET, path, query, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, KronosError> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub(crate) async fn post_no_body<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, KronosError> {
        self.send(Method::POST, path, &[], None).await
    }

    pub(crate) async fn post_no_content(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(), KronosError> {
        self.send_raw(Method::POST, path, &[], body).await.map(|_| ())
    }

    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, KronosError> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), KronosError> {
        self.send_raw(Method::DELETE, path, &[], None).await.map(|_| ())
    }

    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, KronosError> {
        let text = self.send_raw(method, path, query, body).await?;
        serde_json::from_str::<T>(&text).map_err(|e| {
            error!("JSON deserialization failed for '{}': {}", path, e);
            KronosError::Json(e)
        })
    }

    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, KronosError> {
        let url = self.url(path)?;
        let mut retried = false;
        loop {
            let bearer = if retried {
                self.auth.force_refresh().await?
            } else {
                self.auth.bearer().await?
            };

            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bearer {}", bearer))
                .header(ACCEPT, "application/json");
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            debug!("{} {} -> {}", method, url, status);

            if status == StatusCode::UNAUTHORIZED && !retried {
                info!("Received 401 for {}, refreshing token and retrying once", url);
                retried = true;
                continue;
            }

            let text = response.text().await?;
            if status.is_success() {
                return Ok(text);
            }

            error!(
                "API error response: Status={}, Body='{}' for URL: {}",
                status, text, url
            );
            return Err(extract_api_error(status, &text));
        }
    }
}
