//! Knowledge sources for Versa.
//!
//! Every source implements `versa_core::Retriever`; the agent only ever
//! sees ranked passages.

pub mod in_memory;

pub use in_memory::InMemoryKnowledgeBase;
