// src/llm/mod.rs
// LLM module exports and submodule declarations

pub mod credentials;
pub mod gateway;
pub mod provider;
pub mod types;

pub use credentials::RotatingCredentialSet;
pub use gateway::{CompletionGateway, GatewayError};
pub use provider::{CompletionOptions, CompletionTransport, OpenAiCompatibleTransport, Provider, TransportError};
pub use types::{Capabilities, LlmMessage, MessageKind, Role, ToolCall, WorkMode};
