pub mod chat;
pub mod error;
pub mod model;

pub use chat::{
    ChatMessage, ChatMessageBuilder, ChatProvider, ChatResponse, ChatRole, ChatStream,
    FinishReason, FunctionCall, FunctionTool, ImageMime, MessageType, ParameterProperty,
    ParametersSchema, ReasoningEffort, StreamChunk, Tool, ToolCall, ToolChoice, ToolResultPayload,
    Usage,
};
pub use error::LLMError;
pub use model::{ModelCapabilities, ModelConstraints, ModelInfo, ModelPricing, ProviderInfo};
