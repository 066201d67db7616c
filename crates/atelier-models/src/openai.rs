//! OpenAI tool-calling model implementation.
//!
//! This module provides an implementation of the `ToolCallModel` trait for
//! OpenAI's Chat Completions API and any server implementing the same
//! specification (vLLM, LocalAI, LM Studio, Ollama's compatible endpoint).
//!
//! # Constructor Patterns
//!
//! - `new()` - Loads API key from the `OPENAI_API_KEY` env var
//! - `with_api_key()` - Explicit API key
//! - `without_auth()` - No authentication, custom base URL (local servers, tests)
//!
//! # Streaming
//!
//! `stream_tool_call()` opens an SSE stream and yields the tool-call argument
//! text fragment by fragment, exactly as the server produced it, terminated by
//! a single [`StreamEvent::Done`]. A disconnect before the done signal is a
//! terminal [`ModelError::RequestError`], not a silently-short stream.

use async_trait::async_trait;
use atelier_abstraction::{
    ChatMessage, ModelError, ModelParameters, StreamEvent, ToolCallModel, ToolCallStream,
    ToolDefinition,
};
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::env;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, error};

/// Model used when the caller does not pick one explicitly.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI-compatible tool-calling model implementation.
#[derive(Debug, Clone)]
pub struct OpenAIModel {
    /// The model identifier (e.g., "gpt-4o").
    model_id: String,
    /// Base URL for the API endpoint.
    base_url: String,
    /// Optional API key (compatible local servers don't require auth).
    api_key: Option<String>,
    /// HTTP client for requests.
    client: Client,
}

impl OpenAIModel {
    /// Creates a new `OpenAIModel` with the given model ID.
    ///
    /// The API key is loaded from the `OPENAI_API_KEY` environment variable.
    ///
    /// # Errors
    /// Returns a `ModelError` if `OPENAI_API_KEY` is not set. For servers that
    /// don't require authentication, use `without_auth()` instead.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "OPENAI_API_KEY environment variable not set. \
                 Use without_auth() for servers that don't require authentication."
                    .to_string(),
            )
        })?;

        Ok(Self {
            model_id,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: Some(api_key),
            client: build_client()?,
        })
    }

    /// Creates a new `OpenAIModel` with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: Some(api_key),
            client: build_client().unwrap_or_else(|_| Client::new()),
        }
    }

    /// Creates a new `OpenAIModel` without authentication.
    ///
    /// Use this constructor for local OpenAI-compatible servers that don't
    /// require API keys.
    #[must_use]
    pub fn without_auth(model_id: String, base_url: String) -> Self {
        Self {
            model_id,
            base_url,
            api_key: None,
            client: build_client().unwrap_or_else(|_| Client::new()),
        }
    }

    /// Overrides the base URL (e.g., for a proxy or a compatible server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Converts our ChatMessage role to OpenAI API role format.
    fn role_to_openai(role: &str) -> String {
        match role {
            "assistant" => "assistant".to_string(),
            "system" => "system".to_string(),
            "user" => "user".to_string(),
            _ => role.to_string(),
        }
    }

    /// Maps a non-success HTTP status to the corresponding `ModelError`.
    fn status_error(status: reqwest::StatusCode, error_text: String) -> ModelError {
        if status == 401 || status == 403 {
            return ModelError::UnsupportedModelProvider(format!(
                "Authentication failed ({}): {}",
                status, error_text
            ));
        }

        if status == 402 || status == 429 {
            return ModelError::QuotaExceeded {
                provider: "openai".to_string(),
                message: Some(error_text),
            };
        }

        if (500..=599).contains(&status.as_u16()) {
            return ModelError::ModelResponseError(format!(
                "Server error ({}): {}",
                status, error_text
            ));
        }

        ModelError::ModelResponseError(format!("API error ({}): {}", status, error_text))
    }
}

fn build_client() -> Result<Client, ModelError> {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(|e| ModelError::RequestError(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl ToolCallModel for OpenAIModel {
    async fn stream_tool_call(
        &self,
        messages: &[ChatMessage],
        tool: &ToolDefinition,
        parameters: Option<ModelParameters>,
    ) -> Result<ToolCallStream, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            tool = %tool.name,
            "OpenAIModel opening streamed tool call"
        );

        let url = format!("{}/chat/completions", self.base_url);

        let openai_messages: Vec<OpenAIMessage> = messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: Self::role_to_openai(&msg.role),
                content: msg.content.clone(),
            })
            .collect();

        let mut request_body = OpenAIStreamingRequest {
            model: self.model_id.clone(),
            messages: openai_messages,
            tools: vec![OpenAITool {
                tool_type: "function".to_string(),
                function: OpenAIFunction {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.parameters.clone(),
                },
            }],
            stream: true,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
        };

        if let Some(params) = parameters {
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            request_body.max_tokens = params.max_tokens;
            request_body.stop = params.stop_sequences;
        }

        let mut request = self.client.post(&url).json(&request_body);

        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(
                error = %e,
                url = %url,
                "Failed to send streaming tool-call request"
            );
            ModelError::RequestError(format!("Network error: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                url = %url,
                "OpenAI-compatible API returned error status for tool-call request"
            );
            return Err(Self::status_error(status, error_text));
        }

        Ok(Box::pin(SseToolCallStream::new(response)))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// SSE parser turning the raw byte stream into tool-call argument fragments.
struct SseToolCallStream {
    stream: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: VecDeque<Result<StreamEvent, ModelError>>,
    saw_done: bool,
    terminated: bool,
}

impl SseToolCallStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
            pending: VecDeque::new(),
            saw_done: false,
            terminated: false,
        }
    }

    /// Extracts all complete SSE events (separated by `\n\n`) from the buffer
    /// and queues the stream events they carry.
    fn drain_buffer(&mut self) {
        while let Some(end_idx) = self.buffer.find("\n\n") {
            let event = self.buffer[..end_idx].to_string();
            self.buffer = self.buffer[end_idx + 2..].to_string();
            self.process_event(&event);
        }
    }

    /// Parses one SSE event and queues fragments / the done signal.
    fn process_event(&mut self, event: &str) {
        let Some(data) = event.strip_prefix("data: ") else {
            return;
        };

        if data.trim() == "[DONE]" {
            self.queue_done();
            return;
        }

        match serde_json::from_str::<OpenAIStreamingResponse>(data) {
            Ok(streaming_response) => {
                if let Some(choice) = streaming_response.choices.first() {
                    if let Some(arguments) = choice
                        .delta
                        .tool_calls
                        .as_ref()
                        .and_then(|calls| calls.first())
                        .and_then(|call| call.function.as_ref())
                        .and_then(|function| function.arguments.as_ref())
                    {
                        if !arguments.is_empty() {
                            self.pending
                                .push_back(Ok(StreamEvent::Fragment(arguments.clone())));
                        }
                    }
                    if choice.finish_reason.is_some() {
                        self.queue_done();
                    }
                }
            }
            Err(e) => {
                // Skip malformed chunks (some servers send empty keep-alive events)
                debug!("Failed to parse SSE chunk: {}", e);
            }
        }
    }

    /// Queues the single terminal done event. The server may signal both a
    /// finish_reason and `[DONE]`; only the first counts.
    fn queue_done(&mut self) {
        if !self.saw_done {
            self.saw_done = true;
            self.pending.push_back(Ok(StreamEvent::Done));
        }
    }
}

impl Stream for SseToolCallStream {
    type Item = Result<StreamEvent, ModelError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(item) = this.pending.pop_front() {
                // A terminal item ends the stream; anything queued behind it
                // is dropped.
                if matches!(item, Ok(StreamEvent::Done) | Err(_)) {
                    this.terminated = true;
                }
                return Poll::Ready(Some(item));
            }

            if this.terminated {
                return Poll::Ready(None);
            }

            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(chunk) => {
                        this.buffer.push_str(&chunk);
                        this.drain_buffer();
                    }
                    Err(e) => {
                        this.pending.push_back(Err(ModelError::SerializationError(format!(
                            "Failed to decode SSE chunk: {}",
                            e
                        ))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    this.pending
                        .push_back(Err(ModelError::RequestError(format!("Stream error: {}", e))));
                }
                Poll::Ready(None) => {
                    // Transport closed - flush whatever complete events remain,
                    // then require that a done signal was seen.
                    this.drain_buffer();
                    if !this.saw_done {
                        this.pending.push_back(Err(ModelError::RequestError(
                            "Stream ended before completion signal".to_string(),
                        )));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// OpenAI-compatible API request/response structures
// These match the OpenAI API specification and can be used with any compatible server

#[derive(Debug, Serialize)]
struct OpenAIStreamingRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    tools: Vec<OpenAITool>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

// Streaming response structures
#[derive(Debug, Deserialize)]
struct OpenAIStreamingResponse {
    choices: Vec<OpenAIStreamingChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamingChoice {
    delta: OpenAIStreamingDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamingDelta {
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallDelta {
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionDelta {
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn design_tool() -> ToolDefinition {
        ToolDefinition::new(
            "design_new_component_api",
            "generate the required design details to create a new component",
            json!({"type": "object"}),
        )
    }

    fn user_message(content: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(content)]
    }

    async fn collect_events(
        mut stream: ToolCallStream,
    ) -> Vec<Result<StreamEvent, ModelError>> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_openai_model_with_api_key() {
        let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "test-key".to_string());
        assert_eq!(model.model_id(), "gpt-4o");
    }

    #[test]
    fn test_openai_model_without_auth() {
        let model = OpenAIModel::without_auth(
            "test-model".to_string(),
            "http://localhost:8000/v1".to_string(),
        );
        assert_eq!(model.model_id(), "test-model");
    }

    #[test]
    fn test_with_base_url_override() {
        let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "key".to_string())
            .with_base_url("http://proxy.internal/v1".to_string());
        assert_eq!(model.base_url, "http://proxy.internal/v1");
    }

    #[test]
    fn test_role_to_openai() {
        assert_eq!(OpenAIModel::role_to_openai("user"), "user");
        assert_eq!(OpenAIModel::role_to_openai("assistant"), "assistant");
        assert_eq!(OpenAIModel::role_to_openai("system"), "system");
        assert_eq!(OpenAIModel::role_to_openai("custom"), "custom");
    }

    #[tokio::test]
    async fn test_stream_tool_call_fragments_and_done() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        // Tool-call argument deltas exactly as OpenAI streams them
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"name\":\"design_new_component_api\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"arguments\":\"{\\\"new\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"arguments\":\"_component\\\":1}\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: [DONE]\n\n",
        );

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let stream = model
            .stream_tool_call(&user_message("a login form"), &design_tool(), None)
            .await
            .unwrap();

        let events = collect_events(stream).await;
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();

        // Empty-arguments chunk yields no fragment; [DONE] after finish_reason
        // does not yield a second Done.
        assert_eq!(
            events,
            vec![
                StreamEvent::Fragment("{\"new".to_string()),
                StreamEvent::Fragment("_component\":1}".to_string()),
                StreamEvent::Done,
            ]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_request_body() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{
                    "model": "gpt-4o",
                    "stream": true,
                    "tools": [{
                        "type": "function",
                        "function": {"name": "design_new_component_api"}
                    }]
                }"#
                .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: [DONE]\n\n")
            .create_async()
            .await;

        let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "test-key".to_string())
            .with_base_url(base_url);

        let stream = model
            .stream_tool_call(&user_message("a pricing table"), &design_tool(), None)
            .await
            .unwrap();
        let events = collect_events(stream).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::Done);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_eof_without_done_is_error() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        // Two fragments, then the body just ends - no finish_reason, no [DONE]
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"arguments\":\"{\\\"a\\\":\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"arguments\":\"1\"}}]},\"finish_reason\":null}]}\n\n",
        );

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let stream = model
            .stream_tool_call(&user_message("a nav bar"), &design_tool(), None)
            .await
            .unwrap();

        let events = collect_events(stream).await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Fragment("{\"a\":".to_string())
        );
        assert_eq!(events[1].as_ref().unwrap(), &StreamEvent::Fragment("1".to_string()));
        match &events[2] {
            Err(ModelError::RequestError(msg)) => {
                assert!(msg.contains("before completion"));
            }
            other => panic!("Expected RequestError, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_skips_non_tool_deltas() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        // Role announcement and plain-content deltas carry no tool arguments
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"thinking\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"arguments\":\"{}\"}}]},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
        );

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let stream = model
            .stream_tool_call(&user_message("a badge"), &design_tool(), None)
            .await
            .unwrap();

        let events = collect_events(stream).await;
        let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![StreamEvent::Fragment("{}".to_string()), StreamEvent::Done]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_error_401() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": "Unauthorized"}"#)
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let result = model
            .stream_tool_call(&user_message("a card"), &design_tool(), None)
            .await;

        assert!(result.is_err());
        match result.err().unwrap() {
            ModelError::UnsupportedModelProvider(msg) => {
                assert!(msg.contains("Authentication failed"));
            }
            other => panic!("Expected UnsupportedModelProvider, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_error_429() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body(r#"{"error": "Rate limit exceeded"}"#)
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let result = model
            .stream_tool_call(&user_message("a modal"), &design_tool(), None)
            .await;

        assert!(result.is_err());
        match result.err().unwrap() {
            ModelError::QuotaExceeded { provider, .. } => {
                assert_eq!(provider, "openai");
            }
            other => panic!("Expected QuotaExceeded, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_error_500() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body(r#"{"error": "Internal server error"}"#)
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let result = model
            .stream_tool_call(&user_message("a table"), &design_tool(), None)
            .await;

        assert!(result.is_err());
        match result.err().unwrap() {
            ModelError::ModelResponseError(msg) => {
                assert!(msg.contains("Server error"));
            }
            other => panic!("Expected ModelResponseError, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_tool_call_with_parameters() {
        let mut server = mockito::Server::new_async().await;
        let base_url = format!("{}/v1", server.url());

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"model":"test-model","temperature":0.2,"max_tokens":2048}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: [DONE]\n\n")
            .create_async()
            .await;

        let model = OpenAIModel::without_auth("test-model".to_string(), base_url);
        let params = ModelParameters {
            temperature: Some(0.2),
            top_p: None,
            max_tokens: Some(2048),
            stop_sequences: None,
        };

        let stream = model
            .stream_tool_call(&user_message("a footer"), &design_tool(), Some(params))
            .await
            .unwrap();
        let _events = collect_events(stream).await;

        mock.assert_async().await;
    }

    #[test]
    #[allow(clippy::disallowed_methods, unsafe_code)]
    fn test_openai_model_new_without_env_var() {
        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
        }
        let model = OpenAIModel::new("gpt-4o".to_string());
        assert!(model.is_err());
    }
}
