//! Generator trait — the abstraction over text-generation backends.
//!
//! A Generator maps a fully assembled prompt plus sampling options to
//! generated text, either as a complete string or as a finite stream of
//! chunks. Everything upstream of this call (memory, assembly) and
//! downstream of it (post-processing) is backend-agnostic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::GeneratorError;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature (below 1.0 = more deterministic, above 1.0 = more creative)
    pub temperature: f32,

    /// Maximum new tokens to generate
    pub max_tokens: u32,

    /// Penalty applied to already-generated tokens
    pub repetition_penalty: f32,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32, repetition_penalty: f32) -> Self {
        Self {
            temperature,
            max_tokens,
            repetition_penalty,
        }
    }

    /// Return a copy with a different temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_tokens: 512,
            repetition_penalty: 1.1,
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The assembled prompt text
    pub prompt: String,

    /// Sampling options
    pub options: GenerationOptions,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, options: GenerationOptions) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            stop: Vec::new(),
        }
    }

    /// Add a stop sequence.
    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

/// A complete (non-streaming) generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// The raw generated text (not yet post-processed)
    pub text: String,

    /// Which model actually responded
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core Generator trait.
///
/// Every text-generation backend implements this trait. The chat engine
/// calls `generate()` or `stream()` without knowing which backend is used.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this generator (e.g., "openai", "llama.cpp").
    fn name(&self) -> &str;

    /// Send a prompt and get the complete generated text.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GeneratorError>;

    /// Send a prompt and get a finite, forward-only stream of chunks.
    ///
    /// Default implementation calls `generate()` and wraps the result as a single chunk.
    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, GeneratorError>>,
        GeneratorError,
    > {
        let response = self.generate(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(StreamChunk {
                content: Some(response.text),
                done: true,
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}
