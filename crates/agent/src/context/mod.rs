//! Conversation-context assembly pipeline.
//!
//! Turns a conversation log, an optional set of retrieved passages, and a
//! persona template into one bounded prompt.
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | 1. Memory | [`memory`] | summary + verbatim history buffer |
//! | 2. Retrieval formatting | [`retrieval`] | `{context}` block (grounded personas) |
//! | 3. Assembly | [`assembler`] | base template + sections, placeholders expanded |

pub mod assembler;
pub mod memory;
pub mod retrieval;
pub mod token;

pub use assembler::{
    AssembledPrompt, AssemblyInput, AssemblyMetadata, ContextAssembler, SectionStats, generate,
};
pub use memory::{
    BufferMemory, ConversationMemory, MemoryKind, MemoryPolicy, MemoryView, SummaryBufferMemory,
    eligible_turns,
};
pub use retrieval::format_context;
