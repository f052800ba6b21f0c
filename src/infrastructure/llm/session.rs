//! HTTP client for the ephemeral session lifecycle endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use crate::domain::errors::TransportError;
use crate::domain::ports::{CreateSessionRequest, SessionClient, SessionInfo};
use crate::infrastructure::llm::client::LlmClientConfig;

pub struct HttpSessionClient {
    http: ReqwestClient,
    config: LlmClientConfig,
}

impl HttpSessionClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, TransportError> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn create(&self, request: CreateSessionRequest) -> Result<SessionInfo, TransportError> {
        let url = self.endpoint("/v1/sessions");
        debug!(%url, model = %request.model_id, "creating session");
        let response = self.authorize(self.http.post(&url).json(&request)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let info: SessionInfo = response.json().await?;
        Ok(info)
    }

    async fn delete(&self, session_id: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&format!("/v1/sessions/{session_id}"));
        debug!(%url, "deleting session");
        let response = self.authorize(self.http.delete(&url)).send().await?;
        let status = response.status();
        // Idempotent: a session already gone is a successful delete.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Http {
            status: status.as_u16(),
            body,
        })
    }
}
