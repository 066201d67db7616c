//! Model abstraction layer for Atelier.
//!
//! This module defines the core traits and types for interacting with
//! tool-calling chat-completion models.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when interacting with an AI model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request,
    /// or a stream that terminated before signalling completion).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The model returned an error (e.g., invalid input, server-side failure).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Provider quota exceeded or rate limit hit (hard stop error).
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// What sampling temperature to use, between 0 and 2.
    /// Higher values mean the model will take more risks.
    pub temperature: Option<f32>,

    /// An alternative to sampling with temperature, called nucleus sampling,
    /// where the model considers the results of the tokens with `top_p` probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate in the chat completion.
    pub max_tokens: Option<u32>,

    /// Up to 4 sequences where the API will stop generating further tokens.
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: Some(1.0),
            max_tokens: Some(512),
            stop_sequences: None,
        }
    }
}

/// A function tool the model is instructed to call, carrying the JSON schema
/// its arguments must conform to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The function name the model will call.
    pub name: String,
    /// Human-readable description of what the tool produces.
    pub description: Option<String>,
    /// JSON schema constraining the tool-call arguments.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Creates a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self { name: name.into(), description: Some(description.into()), parameters }
    }
}

/// One event on a streamed tool-call completion.
///
/// Fragments carry verbatim chunks of the tool-call argument text in arrival
/// order; their concatenation equals the model's full raw output. Exactly one
/// `Done` terminates a healthy stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental chunk of tool-call argument text.
    Fragment(String),
    /// The model finished generating.
    Done,
}

/// A live stream of tool-call events terminated by `Done` or a terminal error.
pub type ToolCallStream = BoxStream<'static, Result<StreamEvent, ModelError>>;

/// A trait for models that support streamed tool-call completions.
///
/// All models must be `Send + Sync` to allow concurrent use across threads.
#[async_trait]
pub trait ToolCallModel: Send + Sync {
    /// Opens a streamed completion request instructing the model to call `tool`.
    ///
    /// The returned stream yields tool-call argument fragments as they arrive,
    /// followed by exactly one [`StreamEvent::Done`]. A transport disconnect
    /// before the done signal surfaces as a terminal stream error.
    ///
    /// # Arguments
    /// * `messages` - The conversation turns, in order
    /// * `tool` - The function tool the model must call
    /// * `parameters` - Optional parameters to control generation
    ///
    /// # Errors
    /// Returns a `ModelError` if the request cannot be opened.
    async fn stream_tool_call(
        &self,
        messages: &[ChatMessage],
        tool: &ToolDefinition,
        parameters: Option<ModelParameters>,
    ) -> Result<ToolCallStream, ModelError>;

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;
}
