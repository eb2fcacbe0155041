//! Persona system — chatbot personalities and their base prompt templates.
//!
//! Each [`Persona`] maps to exactly one base instruction template. The
//! [`PersonaRegistry`] is built once at startup and then shared read-only
//! (behind an `Arc`) by every session:
//!
//! 1. **Built-in templates** — compiled into the binary
//! 2. **Template directory** — `<persona>.md` files (optional, e.g. `~/.versa/personas/`)
//! 3. **Inline overrides** — from the `[personas]` config table
//!
//! Later layers replace earlier ones. Every template is validated when it
//! enters the registry, so a bad template fails at startup rather than on
//! the first conversation turn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ConfigurationError;
use crate::template::{self, CONTEXT, HISTORY, QUERY, SUMMARY};

/// File name (without extension) used for the summarization template.
pub const SUMMARIZATION_FILE: &str = "summarization";

/// The closed set of chatbot personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Persona {
    Therapist,
    Comedian,
    Child,
    Expert,
    Default,
    /// Answers from retrieved documents. Only valid with a knowledge source.
    DocBot,
}

impl Persona {
    /// Every persona, in display order.
    pub const ALL: [Persona; 6] = [
        Persona::Default,
        Persona::Therapist,
        Persona::Comedian,
        Persona::Expert,
        Persona::Child,
        Persona::DocBot,
    ];

    /// The personas a user can pick for free-form chat (DocBot excluded).
    pub fn selectable() -> &'static [Persona] {
        const SELECTABLE: [Persona; 5] = [
            Persona::Default,
            Persona::Therapist,
            Persona::Comedian,
            Persona::Expert,
            Persona::Child,
        ];
        &SELECTABLE
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Therapist => "Therapist",
            Persona::Comedian => "Comedian",
            Persona::Child => "Child",
            Persona::Expert => "Expert",
            Persona::Default => "Default",
            Persona::DocBot => "DocBot",
        }
    }

    /// Whether answers are grounded in retrieved passages.
    pub fn is_grounded(&self) -> bool {
        matches!(self, Persona::DocBot)
    }

    /// Display avatar.
    pub fn avatar(&self) -> &'static str {
        match self {
            Persona::Therapist => "🧑‍⚕️",
            Persona::Comedian => "🎭",
            Persona::Child => "🍭",
            Persona::Expert => "💡",
            Persona::Default => "🤖",
            Persona::DocBot => "📂",
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Persona {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigurationError::UnknownPersona(s.to_string()))
    }
}

impl TryFrom<String> for Persona {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Persona> for String {
    fn from(persona: Persona) -> Self {
        persona.as_str().to_string()
    }
}

/// A validated base template for one persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaTemplate {
    pub persona: Persona,

    /// Template text; may reference `{summary}`, `{history}`, `{query}`,
    /// and (DocBot only) `{context}`.
    pub text: String,

    /// Where the template came from (`<builtin>`, a file path, or `<config>`)
    pub source: String,
}

/// Immutable persona → template mapping.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    templates: BTreeMap<Persona, PersonaTemplate>,
    summarization: String,
}

impl PersonaRegistry {
    /// The registry with every built-in template.
    pub fn builtin() -> Self {
        let templates = Persona::ALL
            .iter()
            .map(|&persona| {
                (
                    persona,
                    PersonaTemplate {
                        persona,
                        text: builtin_template(persona).to_string(),
                        source: "<builtin>".into(),
                    },
                )
            })
            .collect();

        Self {
            templates,
            summarization: SUMMARIZATION_TEMPLATE.to_string(),
        }
    }

    /// Replace one persona's template, validating it first.
    pub fn with_template(
        mut self,
        persona: Persona,
        text: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let text = text.into();
        Self::validate(persona, &text)?;
        self.templates.insert(
            persona,
            PersonaTemplate {
                persona,
                text,
                source: source.into(),
            },
        );
        Ok(self)
    }

    /// Replace the summarization template, validating it first.
    pub fn with_summarization_template(
        mut self,
        text: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let text = text.into();
        for name in template::placeholders(&text) {
            if name != HISTORY {
                return Err(ConfigurationError::UnknownPlaceholder {
                    persona: "summarization".into(),
                    placeholder: name,
                });
            }
        }
        self.summarization = text;
        Ok(self)
    }

    /// Overlay templates from a directory of `<persona>.md` / `.txt` files.
    ///
    /// Missing files are skipped. A file that exists but holds an invalid
    /// template is an error.
    pub fn load_dir(mut self, dir: &Path) -> Result<Self, ConfigurationError> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Persona template directory not found, using built-ins");
            return Ok(self);
        }

        for persona in Persona::ALL {
            let stem = persona.as_str().to_lowercase();
            if let Some((path, content)) = Self::read_template_file(dir, &stem) {
                debug!(persona = %persona, file = %path, "Loaded persona template");
                self = self.with_template(persona, content, path)?;
            }
        }

        if let Some((path, content)) = Self::read_template_file(dir, SUMMARIZATION_FILE) {
            debug!(file = %path, "Loaded summarization template");
            self = self.with_summarization_template(content)?;
        }

        Ok(self)
    }

    fn read_template_file(dir: &Path, stem: &str) -> Option<(String, String)> {
        for ext in ["md", "txt"] {
            let path = dir.join(format!("{stem}.{ext}"));
            match std::fs::read_to_string(&path) {
                Ok(content) if !content.trim().is_empty() => {
                    return Some((path.display().to_string(), content));
                }
                Ok(_) => warn!(file = %path.display(), "Ignoring empty persona template"),
                Err(_) => {}
            }
        }
        None
    }

    /// Check which placeholders a persona's template may use.
    pub fn validate(persona: Persona, text: &str) -> Result<(), ConfigurationError> {
        let names = template::placeholders(text);
        for name in &names {
            let allowed = match name.as_str() {
                SUMMARY | HISTORY | QUERY => true,
                CONTEXT => persona.is_grounded(),
                _ => false,
            };
            if !allowed {
                return Err(ConfigurationError::UnknownPlaceholder {
                    persona: persona.to_string(),
                    placeholder: name.clone(),
                });
            }
        }

        if persona.is_grounded() && !names.iter().any(|n| n == CONTEXT) {
            return Err(ConfigurationError::MissingPlaceholder {
                placeholder: CONTEXT.into(),
            });
        }

        Ok(())
    }

    /// Look up a persona's template.
    pub fn template(&self, persona: Persona) -> Result<&PersonaTemplate, ConfigurationError> {
        self.templates
            .get(&persona)
            .ok_or_else(|| ConfigurationError::UnknownPersona(persona.to_string()))
    }

    /// The template used to summarize the older tail of a conversation.
    pub fn summarization_template(&self) -> &str {
        &self.summarization
    }

    /// Estimate the token count of a persona's template (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self, persona: Persona) -> usize {
        self.templates
            .get(&persona)
            .map(|t| t.text.len() / 4)
            .unwrap_or(0)
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_template(persona: Persona) -> &'static str {
    match persona {
        Persona::Default => DEFAULT_TEMPLATE,
        Persona::Therapist => THERAPIST_TEMPLATE,
        Persona::Comedian => COMEDIAN_TEMPLATE,
        Persona::Child => CHILD_TEMPLATE,
        Persona::Expert => EXPERT_TEMPLATE,
        Persona::DocBot => DOCBOT_TEMPLATE,
    }
}

const DEFAULT_TEMPLATE: &str = "\
You are Versa, a friendly and knowledgeable AI companion. Using the knowledge you have, \
give a helpful answer to the question.
Respond only to the question asked; keep the response concise and relevant.
Provide an honest, truthful and non-hurtful answer.
If you are not able to understand the question, ask for clarification instead of guessing.
For greetings, greet back warmly.";

const THERAPIST_TEMPLATE: &str = "\
You are Versa, a calm and empathetic listener with the manner of a supportive therapist.
Acknowledge the user's feelings before offering perspective, ask gentle follow-up questions, \
and suggest practical coping ideas where they fit.
Never diagnose, and encourage the user to reach out to a qualified professional or local \
emergency services if they describe being in danger.
Keep the response warm, non-judgemental and concise.";

const COMEDIAN_TEMPLATE: &str = "\
You are Versa, a human knowledge library who has a great sense of humor. Using the knowledge \
you have, give a comprehensive answer to the question with a taste of good humor.
Respond only to the question asked; keep the response concise and relevant.
Provide an honest, truthful and non-hurtful answer; jokes must never be at the user's expense.
For greetings, greet back with a sense of humor.";

const CHILD_TEMPLATE: &str = "\
You are Versa, answering the way a curious and cheerful eight-year-old would.
Use short sentences and simple words, show excitement about new things, and it is fine to \
admit when something is too grown-up to understand.
Stay kind and truthful, and keep the answer short.";

const EXPERT_TEMPLATE: &str = "\
You are Versa, a domain expert who answers with precision and depth.
Explain the reasoning behind the answer, name important caveats or trade-offs, and use \
correct terminology while keeping the explanation accessible.
If the question is outside what can be answered reliably, say so rather than speculating.
Be thorough but do not pad the response.";

const DOCBOT_TEMPLATE: &str = "\
You are Versa, an AI professor trained to answer the given question in a comprehensive and \
informative way.
**Relevant Context:**
{context}
---
Based on the question and provided context, answer the user's question in a clear and concise manner.
If you cannot find an answer within the context, say that the answer is not available in the \
provided context.
If the question seems to be small talk, respond accordingly in a cheerful manner.

**Additionally:**
* Strive to remain objective in your responses.
* Focus on providing factual information from the documents.
* Respond only to the question asked; keep the response concise and relevant.
* Do not mention the provided context itself.";

const SUMMARIZATION_TEMPLATE: &str = "\
Please summarize the following conversation in a concise and objective manner, staying true to \
the content without adding any extraneous information or personal opinions. Strive for a neutral \
and factual representation of the key points exchanged between the user and the assistant.
Remember to include any entity that might be important.";
