//! Model implementations for Atelier.
//!
//! This crate provides concrete implementations of the `ToolCallModel` trait.
//!
//! # Supported Providers
//!
//! - **OpenAI**: OpenAI's GPT models (API key required), plus any server
//!   implementing the OpenAI Chat Completions API (vLLM, LocalAI, LM Studio,
//!   Ollama's compatible endpoint) via `without_auth`.

pub mod openai;

pub use openai::OpenAIModel;
