//! Retrieval context formatting for document-grounded personas.

use versa_core::Passage;

/// Render retrieved passages as the labelled block substituted for `{context}`.
///
/// Output is `"<sep>Extracted documents:<sep>"` followed by
/// `"Document <i>:::<sep><text>"` for each passage, in retrieval order and
/// with nothing between entries. An empty slice gives just the header.
pub fn format_context<P: AsRef<str>>(passages: &[P], separator: &str) -> String {
    let mut out = format!("{separator}Extracted documents:{separator}");
    for (i, passage) in passages.iter().enumerate() {
        out.push_str(&format!("Document {i}:::{separator}{}", passage.as_ref()));
    }
    out
}

/// Join passage texts for logging.
pub(crate) fn preview(passages: &[Passage], max_chars: usize) -> String {
    let joined: String = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    match joined.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &joined[..idx]),
        None => joined,
    }
}
