//! # Versa Core
//!
//! Domain types, traits, and error definitions for the Versa conversational
//! agent. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The collaborators the agent talks to (text generator, document retriever)
//! are defined as traits here. Implementations live in their respective
//! crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod generator;
pub mod memory;
pub mod persona;
pub mod retriever;
pub mod template;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{ConfigurationError, Error, GeneratorError, Result, RetrieverError};
pub use generator::{
    GenerationOptions, GenerationRequest, GenerationResponse, Generator, StreamChunk, Usage,
};
pub use memory::MemoryKind;
pub use persona::{Persona, PersonaRegistry, PersonaTemplate};
pub use retriever::{Passage, Retriever};
pub use template::TemplateValues;
pub use turn::{ConversationId, ConversationLog, Role, Turn, render_history};
