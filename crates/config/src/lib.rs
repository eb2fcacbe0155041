//! Configuration loading, validation, and management for Versa.
//!
//! Loads configuration from `~/.versa/config.toml` with environment
//! variable overrides. Validates all settings at startup so that a bad
//! persona name or buffer length never reaches a conversation turn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use versa_core::{GenerationOptions, MemoryKind, Persona, PersonaRegistry};

/// The root configuration structure.
///
/// Maps directly to `~/.versa/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Which endpoint shape to call
    #[serde(default)]
    pub api_style: ApiStyle,

    /// Persona used when none is given on the command line
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Sampling profiles
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversation memory policy
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Knowledge source settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Persona template overrides
    #[serde(default)]
    pub personas: PersonasConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_persona() -> String {
    Persona::Default.to_string()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_style", &self.api_style)
            .field("persona", &self.persona)
            .field("generation", &self.generation)
            .field("memory", &self.memory)
            .field("retrieval", &self.retrieval)
            .field("personas", &self.personas)
            .finish()
    }
}

/// Endpoint shape of the generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    /// `POST /chat/completions` with the prompt as a single user message
    #[default]
    Chat,
    /// `POST /completions` with the raw prompt
    Completions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Temperature for free-form persona chat
    #[serde(default = "default_creative_temperature")]
    pub creative_temperature: f32,

    /// Temperature for DocBot answers and history summarization
    #[serde(default = "default_deterministic_temperature")]
    pub deterministic_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Marker stripped from the tail of every generated text
    #[serde(default = "default_stop_marker")]
    pub stop_marker: String,
}

fn default_creative_temperature() -> f32 {
    1.1
}
fn default_deterministic_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    512
}
fn default_repetition_penalty() -> f32 {
    1.1
}
fn default_stop_marker() -> String {
    "</s>".into()
}

impl GenerationConfig {
    /// Options for free-form persona chat.
    pub fn creative(&self) -> GenerationOptions {
        self.options(self.creative_temperature)
    }

    /// Options for grounded answers and summarization.
    pub fn deterministic(&self) -> GenerationOptions {
        self.options(self.deterministic_temperature)
    }

    fn options(&self, temperature: f32) -> GenerationOptions {
        GenerationOptions::new(temperature, self.max_tokens, self.repetition_penalty)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            creative_temperature: default_creative_temperature(),
            deterministic_temperature: default_deterministic_temperature(),
            max_tokens: default_max_tokens(),
            repetition_penalty: default_repetition_penalty(),
            stop_marker: default_stop_marker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// `buffer` or `summary_buffer`
    #[serde(default = "default_memory_kind")]
    pub kind: String,

    /// Number of most recent turns kept verbatim
    #[serde(default = "default_buffer_len")]
    pub buffer_len: i64,

    /// Separator written after each rendered turn
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_memory_kind() -> String {
    "summary_buffer".into()
}
fn default_buffer_len() -> i64 {
    12
}
fn default_separator() -> String {
    "\n".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            kind: default_memory_kind(),
            buffer_len: default_buffer_len(),
            separator: default_separator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages retrieved per DocBot query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonasConfig {
    /// Directory of `<persona>.md` template files (default: `~/.versa/personas`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Inline template overrides keyed by persona name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.versa/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `VERSA_API_KEY`, then `OPENAI_API_KEY` (only if no key in the file)
    /// - `VERSA_API_URL`
    /// - `VERSA_MODEL`
    /// - `VERSA_PERSONA`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("VERSA_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(url) = std::env::var("VERSA_API_URL") {
            self.api_url = url;
        }

        if let Ok(model) = std::env::var("VERSA_MODEL") {
            self.model = model;
        }

        if let Ok(persona) = std::env::var("VERSA_PERSONA") {
            self.persona = persona;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".versa")
    }

    /// Directory searched for persona template files.
    pub fn personas_dir(&self) -> PathBuf {
        self.personas
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("personas"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        for (name, value) in [
            ("creative_temperature", g.creative_temperature),
            ("deterministic_temperature", g.deterministic_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "generation.{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if g.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tokens must be > 0".into(),
            ));
        }

        if self.memory.buffer_len < 0 {
            return Err(versa_core::ConfigurationError::NegativeBufferLen(self.memory.buffer_len).into());
        }

        self.memory.kind.parse::<MemoryKind>()?;

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }

        self.default_persona()?;
        for (name, text) in &self.personas.templates {
            let persona: Persona = name.parse()?;
            PersonaRegistry::validate(persona, text)?;
        }

        Ok(())
    }

    /// The configured default persona.
    pub fn default_persona(&self) -> Result<Persona, ConfigError> {
        Ok(self.persona.parse()?)
    }

    /// Build the persona registry: built-ins, then the template directory,
    /// then inline overrides.
    pub fn persona_registry(&self) -> Result<PersonaRegistry, ConfigError> {
        let mut registry = PersonaRegistry::builtin().load_dir(&self.personas_dir())?;
        for (name, text) in &self.personas.templates {
            let persona: Persona = name.parse()?;
            registry = registry.with_template(persona, text.clone(), "<config>")?;
        }
        Ok(registry)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            api_style: ApiStyle::default(),
            persona: default_persona(),
            generation: GenerationConfig::default(),
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            personas: PersonasConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Domain(#[from] versa_core::ConfigurationError),
}
