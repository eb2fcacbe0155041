//! Prompt assembly — the core of the context pipeline.
//!
//! A prompt is the persona's base template followed by up to three
//! delimited sections, always in this order:
//!
//! | Section | Included when | Placeholder |
//! |---------|---------------|-------------|
//! | Summary | memory produced a non-empty summary | `{summary}` |
//! | Conversation History | the history buffer is non-empty | `{history}` |
//! | Question | always | `{query}` |
//!
//! Document-grounded personas embed `{context}` in their base template
//! instead of getting an appended section.
//!
//! # Determinism
//!
//! Identical inputs always produce identical prompts. Nothing here reads
//! the clock, the environment, or a random source.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use versa_core::error::ConfigurationError;
use versa_core::template::{self, CONTEXT, HISTORY, QUERY, SUMMARY, TemplateValues};
use versa_core::{Persona, PersonaTemplate};

use crate::context::memory::MemoryView;
use crate::context::token;

// ── Sections ──────────────────────────────────────────────────────────────

pub const SUMMARY_SECTION: &str = "\n---\n**Summary of the conversation so far:**\n{summary}";
pub const HISTORY_SECTION: &str = "\n---\n**Conversation History:**\n{history}";
pub const QUERY_SECTION: &str = "\n---\n**Question:**\n{query}";

/// Append the requested sections to `base`, in the fixed order
/// summary → history → query. Unrequested sections are left out entirely.
pub fn generate(
    base: &str,
    include_summary: bool,
    include_history: bool,
    include_query: bool,
) -> String {
    let mut out = String::from(base);
    if include_summary {
        out.push_str(SUMMARY_SECTION);
    }
    if include_history {
        out.push_str(HISTORY_SECTION);
    }
    if include_query {
        out.push_str(QUERY_SECTION);
    }
    out
}

// ── Types ─────────────────────────────────────────────────────────────────

/// All inputs for one prompt.
pub struct AssemblyInput<'a> {
    /// The persona's validated base template.
    pub template: &'a PersonaTemplate,
    /// Summary and history computed by the memory policy.
    pub view: &'a MemoryView,
    /// Formatted retrieval block. Only used by grounded personas.
    pub context: Option<&'a str>,
    /// The live user query.
    pub query: &'a str,
}

/// The assembled prompt, ready for a generator call.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub prompt: String,
    pub metadata: AssemblyMetadata,
}

/// What went into a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub persona: Persona,
    /// Estimated tokens of the final prompt.
    pub total_tokens: usize,
    /// Per-section statistics, in prompt order. Omitted sections are absent.
    pub sections: Vec<SectionStats>,
}

impl AssemblyMetadata {
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStats {
    pub name: String,
    pub tokens: usize,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The prompt assembler. Stateless apart from its size warning threshold.
pub struct ContextAssembler {
    warn_above_tokens: usize,
}

impl ContextAssembler {
    pub fn new(warn_above_tokens: usize) -> Self {
        Self { warn_above_tokens }
    }

    /// Decide which sections to include, then expand every placeholder.
    ///
    /// `{summary}`, `{history}` and `{query}` always have a value (possibly
    /// empty) so base templates may reference them directly. `{context}` has
    /// a value only for grounded personas.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> Result<AssembledPrompt, ConfigurationError> {
        let persona = input.template.persona;
        let summary = input.view.summary.as_deref().unwrap_or("");
        let history = input.view.buffer.as_str();
        let context = if persona.is_grounded() {
            input.context
        } else {
            None
        };

        let include_summary = !summary.is_empty();
        let include_history = !history.is_empty();

        let full_template = generate(&input.template.text, include_summary, include_history, true);

        let mut values = TemplateValues::from([
            (SUMMARY, summary),
            (HISTORY, history),
            (QUERY, input.query),
        ]);
        if let Some(context) = context {
            values.insert(CONTEXT, context);
        }

        let prompt = template::render(&full_template, &values)?;

        let mut sections = vec![SectionStats {
            name: "base".into(),
            tokens: token::estimate_tokens(&input.template.text),
        }];
        if let Some(context) = context {
            sections.push(Self::stats(CONTEXT, context));
        }
        if include_summary {
            sections.push(Self::stats(SUMMARY, summary));
        }
        if include_history {
            sections.push(Self::stats(HISTORY, history));
        }
        sections.push(Self::stats(QUERY, input.query));

        let total_tokens = token::estimate_tokens(&prompt);
        if total_tokens > self.warn_above_tokens {
            warn!(
                persona = %persona,
                total_tokens,
                threshold = self.warn_above_tokens,
                "Assembled prompt is larger than expected"
            );
        }

        let metadata = AssemblyMetadata {
            persona,
            total_tokens,
            sections,
        };
        debug!(
            persona = %persona,
            total_tokens,
            sections = ?metadata.section_names(),
            "Prompt assembled"
        );

        Ok(AssembledPrompt { prompt, metadata })
    }

    fn stats(name: &str, text: &str) -> SectionStats {
        SectionStats {
            name: name.into(),
            tokens: token::estimate_tokens(text),
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(4096)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
