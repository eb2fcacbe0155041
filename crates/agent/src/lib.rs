//! The Versa conversation engine.
//!
//! Each turn follows the same pipeline:
//!
//! 1. **Window** the existing log through the memory policy (buffer, or
//!    summary + buffer)
//! 2. **Retrieve** passages when the persona is document-grounded
//! 3. **Assemble** the persona template with summary, history, context and query
//! 4. **Generate** with the configured backend
//! 5. **Post-process** the output and append both turns to the log

pub mod context;
pub mod postprocess;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    AssembledPrompt, AssemblyMetadata, ContextAssembler, ConversationMemory, MemoryKind,
    MemoryPolicy, MemoryView, format_context,
};
pub use postprocess::{StreamCleaner, postprocess};
pub use session::{ChatEngine, ChatSession, EngineSettings, ResponseMessage};
