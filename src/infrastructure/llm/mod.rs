pub mod client;
pub mod session;
pub mod streaming;

pub use client::{HttpChatClient, LlmClientConfig};
pub use session::HttpSessionClient;
pub use streaming::SseChunkStream;
