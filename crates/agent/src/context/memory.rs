//! Conversation memory — how much of the log a prompt gets to see.
//!
//! Two independent policies implement [`ConversationMemory`]:
//!
//! - [`BufferMemory`] keeps the last `buffer_len` turns verbatim.
//! - [`SummaryBufferMemory`] keeps the same verbatim buffer and condenses
//!   everything older into a summary with one generator call.
//!
//! Both first drop a trailing user turn, so the query being answered never
//! shows up in its own history.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use versa_core::error::{ConfigurationError, Result};
use versa_core::template::{self, HISTORY, TemplateValues};
pub use versa_core::MemoryKind;
use versa_core::{
    ConversationLog, GenerationOptions, GenerationRequest, Generator, Role, Turn, render_history,
};

use crate::context::assembler;
use crate::postprocess::postprocess;

/// A validated memory policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPolicy {
    pub kind: MemoryKind,
    /// Most recent turns kept verbatim. Counts individual turns, not pairs.
    pub buffer_len: usize,
}

impl MemoryPolicy {
    /// Build a policy, rejecting a negative buffer length.
    pub fn new(kind: MemoryKind, buffer_len: i64) -> std::result::Result<Self, ConfigurationError> {
        let buffer_len = usize::try_from(buffer_len)
            .map_err(|_| ConfigurationError::NegativeBufferLen(buffer_len))?;
        Ok(Self { kind, buffer_len })
    }

    pub fn buffer(buffer_len: usize) -> Self {
        Self {
            kind: MemoryKind::Buffer,
            buffer_len,
        }
    }

    pub fn summary_buffer(buffer_len: usize) -> Self {
        Self {
            kind: MemoryKind::SummaryBuffer,
            buffer_len,
        }
    }

    /// Parse the `[memory]` config values.
    pub fn from_config(config: &versa_config::MemoryConfig) -> std::result::Result<Self, ConfigurationError> {
        Self::new(config.kind.parse()?, config.buffer_len)
    }
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self::summary_buffer(12)
    }
}

/// What a memory policy hands to the prompt assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryView {
    /// Condensed older history. `None` for buffer-only memory.
    pub summary: Option<String>,
    /// The most recent turns, rendered verbatim.
    pub buffer: String,
}

/// A conversation memory policy.
#[async_trait]
pub trait ConversationMemory: Send + Sync {
    fn kind(&self) -> MemoryKind;

    /// Compute the history view for the next prompt from `log`.
    async fn view(&self, log: &ConversationLog) -> Result<MemoryView>;
}

/// The turns that may appear in history: the whole log minus a trailing
/// user turn.
pub fn eligible_turns(turns: &[Turn]) -> &[Turn] {
    match turns.split_last() {
        Some((last, rest)) if last.role() == Role::User => {
            debug!(turns = turns.len(), "Dropping trailing user turn from history");
            rest
        }
        _ => turns,
    }
}

/// Split eligible turns into (older, recent) with `recent.len() == min(buffer_len, len)`.
fn split_window(turns: &[Turn], buffer_len: usize) -> (&[Turn], &[Turn]) {
    let n = buffer_len.min(turns.len());
    turns.split_at(turns.len() - n)
}

// ── Buffer ────────────────────────────────────────────────────────────────

/// Keeps only the last `buffer_len` turns.
pub struct BufferMemory {
    buffer_len: usize,
    separator: String,
}

impl BufferMemory {
    pub fn new(buffer_len: usize, separator: impl Into<String>) -> Self {
        Self {
            buffer_len,
            separator: separator.into(),
        }
    }
}

#[async_trait]
impl ConversationMemory for BufferMemory {
    fn kind(&self) -> MemoryKind {
        MemoryKind::Buffer
    }

    async fn view(&self, log: &ConversationLog) -> Result<MemoryView> {
        let (_, recent) = split_window(eligible_turns(log.turns()), self.buffer_len);
        Ok(MemoryView {
            summary: None,
            buffer: render_history(recent, &self.separator),
        })
    }
}

// ── Summary + buffer ──────────────────────────────────────────────────────

/// Keeps the last `buffer_len` turns and summarizes the rest.
pub struct SummaryBufferMemory {
    generator: Arc<dyn Generator>,
    summarization_template: String,
    options: GenerationOptions,
    stop_marker: String,
    buffer_len: usize,
    separator: String,
}

impl SummaryBufferMemory {
    pub fn new(
        generator: Arc<dyn Generator>,
        summarization_template: impl Into<String>,
        buffer_len: usize,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            summarization_template: summarization_template.into(),
            options: GenerationOptions::default().with_temperature(0.2),
            stop_marker: "</s>".into(),
            buffer_len,
            separator: separator.into(),
        }
    }

    /// Sampling options for the summarization call.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Marker stripped from the generated summary.
    pub fn with_stop_marker(mut self, stop_marker: impl Into<String>) -> Self {
        self.stop_marker = stop_marker.into();
        self
    }

    async fn summarize(&self, older: &[Turn]) -> Result<String> {
        let rendered = render_history(older, &self.separator);
        let prompt_template = assembler::generate(&self.summarization_template, false, true, false);
        let values = TemplateValues::from([(HISTORY, rendered.as_str())]);
        let prompt = template::render(&prompt_template, &values)?;

        debug!(
            turns = older.len(),
            prompt_chars = prompt.len(),
            "Summarizing older conversation"
        );

        let mut request = GenerationRequest::new(prompt, self.options);
        if !self.stop_marker.is_empty() {
            request = request.with_stop(self.stop_marker.clone());
        }
        let response = self.generator.generate(request).await?;
        Ok(postprocess(&response.text, &self.stop_marker))
    }
}

#[async_trait]
impl ConversationMemory for SummaryBufferMemory {
    fn kind(&self) -> MemoryKind {
        MemoryKind::SummaryBuffer
    }

    async fn view(&self, log: &ConversationLog) -> Result<MemoryView> {
        let (older, recent) = split_window(eligible_turns(log.turns()), self.buffer_len);

        let summary = if older.is_empty() {
            String::new()
        } else {
            self.summarize(older).await?
        };

        Ok(MemoryView {
            summary: Some(summary),
            buffer: render_history(recent, &self.separator),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
