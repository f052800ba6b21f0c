//! HTTP client for the streaming chat-completion endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use tracing::debug;

use crate::domain::errors::TransportError;
use crate::domain::ports::{ChatClient, ChatRequest, ChunkStream};
use crate::infrastructure::llm::streaming::SseChunkStream;

/// Connection settings for the inference server.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

pub struct HttpChatClient {
    http: ReqwestClient,
    config: LlmClientConfig,
}

impl HttpChatClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, TransportError> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
        let url = self.endpoint("/v1/chat/completions");
        debug!(%url, session = %request.session_id, "sending chat request");

        let mut builder = self.http.post(&url).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Box::pin(SseChunkStream::new(response.bytes_stream())))
    }
}
