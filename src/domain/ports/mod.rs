//! Ports: trait seams between the engine and its collaborators.

pub mod chat;
pub mod history;
pub mod session;

pub use chat::{
    ChatClient, ChatCompletionChunk, ChatRequest, ChoiceDelta, ChunkChoice, ChunkStream,
    FunctionDelta, ToolCallDelta, ToolDefinition,
};
pub use history::HistoryRepository;
pub use session::{
    CreateSessionRequest, EffectiveConfig, SessionClient, SessionInfo, TemplateMode,
};
