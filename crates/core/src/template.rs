//! Named placeholder substitution for prompt templates.
//!
//! Placeholders are `{identifier}`; `{{` and `}}` produce literal braces.
//! Substitution is a single pass over the template, so supplied values are
//! never re-scanned for placeholders. A placeholder with no supplied value is
//! an error, never an empty string.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::ConfigurationError;

/// Placeholder for the summarized older tail of the conversation.
pub const SUMMARY: &str = "summary";
/// Placeholder for the verbatim recent-history buffer.
pub const HISTORY: &str = "history";
/// Placeholder for the formatted retrieved documents.
pub const CONTEXT: &str = "context";
/// Placeholder for the live user query.
pub const QUERY: &str = "query";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Values supplied for one template expansion.
pub type TemplateValues<'a> = HashMap<&'a str, &'a str>;

/// Names of all placeholders in `template`, in first-occurrence order, deduplicated.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.as_str().to_string());
            }
        }
    }
    names
}

/// Expand every placeholder in `template` with its value.
pub fn render(template: &str, values: &TemplateValues<'_>) -> Result<String, ConfigurationError> {
    let mut out = String::with_capacity(template.len() + values.values().map(|v| v.len()).sum::<usize>());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);

        match caps.get(1) {
            Some(name) => {
                let value = values.get(name.as_str()).ok_or_else(|| {
                    ConfigurationError::MissingPlaceholder {
                        placeholder: name.as_str().to_string(),
                    }
                })?;
                out.push_str(value);
            }
            // `{{` or `}}`
            None => out.push_str(&whole.as_str()[..1]),
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}
