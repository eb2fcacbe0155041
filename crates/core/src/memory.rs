//! Memory policy selection.
//!
//! Parsed from `[memory] kind` in the config file and from `--memory` on the
//! command line, so both accept the same spellings.

use crate::error::ConfigurationError;

/// Which conversation memory policy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemoryKind {
    /// Recent turns only
    Buffer,
    /// Summary of older turns plus recent turns
    #[default]
    SummaryBuffer,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Buffer => "buffer",
            MemoryKind::SummaryBuffer => "summary_buffer",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; `-` and `_` are interchangeable.
impl std::str::FromStr for MemoryKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "buffer" => Ok(MemoryKind::Buffer),
            "summary_buffer" => Ok(MemoryKind::SummaryBuffer),
            _ => Err(ConfigurationError::UnknownMemoryKind(s.to_string())),
        }
    }
}
