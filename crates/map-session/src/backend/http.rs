//! `reqwest` implementation of [`MapBackend`].

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{MapBackend, Result};
use crate::config::SessionConfig;
use crate::error::BackendError;
use crate::wire::{
    KnowledgeMap, Memo, MemoId, PersistedMap, SuggestedNode, TemporalQuery,
    TemporalRelatedNodes,
};

#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl From<&SessionConfig> for HttpBackendConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
            timeout: config.request_timeout,
        }
    }
}

#[derive(Serialize)]
struct CreateMemoBody<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct UpdateMapBody<'a> {
    map_data: &'a PersistedMap,
}

#[derive(Serialize)]
struct SuggestBody<'a> {
    label: &'a str,
}

/// Error body the API returns on failure. Either key may carry the message.
#[derive(Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Client for the knowledge-map REST API. No automatic retries.
pub struct HttpBackend {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_path(memo_id: &MemoId) -> String {
        format!("/memos/{}/map", memo_id)
    }

    async fn get_json<R: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<R> {
        let text = self.send::<()>(reqwest::Method::GET, path, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let text = self.send(reqwest::Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Issue one request and return the response body on success.
    async fn send<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "Backend request");

        let mut req = self.http.request(method, &url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.text().await?);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound);
        }

        let message = match resp.json::<ApiErrorResponse>().await {
            Ok(e) => e
                .message
                .or(e.detail)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            Err(_) => format!("HTTP {}", status.as_u16()),
        };
        Err(BackendError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

impl MapBackend for HttpBackend {
    fn list_memos(&self) -> BoxFuture<'_, Result<Vec<Memo>>> {
        Box::pin(self.get_json("/memos"))
    }

    fn create_memo<'a>(&'a self, content: &'a str) -> BoxFuture<'a, Result<Memo>> {
        Box::pin(async move { self.post_json("/memos", &CreateMemoBody { content }).await })
    }

    fn fetch_map<'a>(&'a self, memo_id: &'a MemoId) -> BoxFuture<'a, Result<KnowledgeMap>> {
        Box::pin(async move { self.get_json(&Self::map_path(memo_id)).await })
    }

    fn generate_map<'a>(&'a self, memo_id: &'a MemoId) -> BoxFuture<'a, Result<KnowledgeMap>> {
        Box::pin(async move {
            let path = format!("{}/generate", Self::map_path(memo_id));
            self.post_json(&path, &serde_json::json!({})).await
        })
    }

    fn update_map<'a>(
        &'a self,
        memo_id: &'a MemoId,
        map: &'a PersistedMap,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let body = UpdateMapBody { map_data: map };
            self.send(reqwest::Method::PUT, &Self::map_path(memo_id), Some(&body))
                .await
                .map(|_| ())
        })
    }

    fn suggest_related_nodes<'a>(
        &'a self,
        label: &'a str,
    ) -> BoxFuture<'a, Result<Vec<SuggestedNode>>> {
        Box::pin(async move { self.post_json("/nodes/suggest", &SuggestBody { label }).await })
    }

    fn suggest_temporal_related_nodes<'a>(
        &'a self,
        anchor: &'a TemporalQuery,
    ) -> BoxFuture<'a, Result<TemporalRelatedNodes>> {
        Box::pin(async move { self.post_json("/nodes/suggest-temporal", anchor).await })
    }
}
