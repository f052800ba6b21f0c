//! Server-Sent Events parsing for the streaming chat endpoint.
//!
//! The endpoint emits `data: {json}\n\n` frames terminated by a
//! `data: [DONE]` sentinel. Each frame carries one chat-completion chunk.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tracing::{debug, warn};

use crate::domain::errors::TransportError;
use crate::domain::ports::ChatCompletionChunk;

/// Parses a raw byte stream into chat-completion chunks.
pub struct SseChunkStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    done: bool,
}

impl SseChunkStream {
    pub fn new(stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            buffer: String::new(),
            done: false,
        }
    }

    /// Parse one SSE frame. Returns `None` for frames that carry no chunk
    /// (comments, keepalives, the `[DONE]` sentinel).
    fn parse_frame(frame: &str, done: &mut bool) -> Option<Result<ChatCompletionChunk, TransportError>> {
        for line in frame.lines() {
            let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))
            else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                *done = true;
                return None;
            }
            return match serde_json::from_str::<ChatCompletionChunk>(data) {
                Ok(chunk) => Some(Ok(chunk)),
                Err(err) => {
                    warn!(error = %err, "unparseable SSE chunk");
                    Some(Err(TransportError::Decode(err)))
                }
            };
        }
        None
    }
}

impl Stream for SseChunkStream {
    type Item = Result<ChatCompletionChunk, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            // Drain complete frames from the buffer first.
            if let Some(frame_end) = self.buffer.find("\n\n") {
                let frame = self.buffer[..frame_end].to_string();
                self.buffer.drain(..frame_end + 2);
                let mut done = false;
                let parsed = Self::parse_frame(&frame, &mut done);
                self.done = done;
                if let Some(item) = parsed {
                    return Poll::Ready(Some(item));
                }
                continue;
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(Err(TransportError::Network(err))));
                }
                Poll::Ready(None) => {
                    if !self.buffer.trim().is_empty() {
                        debug!(remainder = %self.buffer, "stream ended with unparsed data");
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    async fn collect(body: &str) -> Vec<Result<ChatCompletionChunk, TransportError>> {
        let bytes = Bytes::copy_from_slice(body.as_bytes());
        SseChunkStream::new(stream::iter(vec![Ok(bytes)]))
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_data_frames_until_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let chunks = collect(body).await;
        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.choices[0].delta.content.as_deref(), Some("Hel"));
    }

    #[tokio::test]
    async fn reassembles_frames_split_across_network_chunks() {
        let part1 = Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"con");
        let part2 = Bytes::from_static(b"tent\":\"hi\"}}]}\n\ndata: [DONE]\n\n");
        let chunks: Vec<_> = SseChunkStream::new(stream::iter(vec![Ok(part1), Ok(part2)]))
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].as_ref().unwrap().choices[0].delta.content.as_deref(),
            Some("hi")
        );
    }

    #[tokio::test]
    async fn carries_usage_block() {
        let body = concat!(
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"output_tokens\":34,",
            "\"tokens_per_second\":55.5,\"time_to_first_token_ms\":120.0}}\n\n",
            "data: [DONE]\n\n",
        );
        let chunks = collect(body).await;
        let usage = chunks[0].as_ref().unwrap().usage.unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.tokens_per_second, Some(55.5));
    }

    #[tokio::test]
    async fn invalid_json_surfaces_as_decode_error() {
        let body = "data: {not json}\n\ndata: [DONE]\n\n";
        let chunks = collect(body).await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Err(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn ignores_comments_and_blank_frames() {
        let body = ": keepalive\n\ndata: {\"choices\":[]}\n\ndata: [DONE]\n\n";
        let chunks = collect(body).await;
        assert_eq!(chunks.len(), 1);
    }
}
