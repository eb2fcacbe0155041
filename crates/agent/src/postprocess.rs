//! Response post-processing.

/// Clean raw generator output: strip a trailing stop marker, then
/// surrounding whitespace, until neither applies.
///
/// Markers inside the text are left alone. An empty marker only trims.
/// The result never ends with `stop_marker`, and running it twice gives
/// the same text as running it once.
pub fn postprocess(raw: &str, stop_marker: &str) -> String {
    let mut text = raw;
    loop {
        let before = text.len();
        if !stop_marker.is_empty() {
            if let Some(stripped) = text.strip_suffix(stop_marker) {
                text = stripped;
            }
        }
        text = text.trim();
        if text.len() == before {
            break;
        }
    }
    text.to_string()
}

/// Incremental [`postprocess`] for streamed output.
///
/// Text that may still turn out to be a trailing stop marker or trailing
/// whitespace is held back until more output arrives. The pieces returned
/// by [`push`](Self::push) and [`finish`](Self::finish), concatenated, equal
/// `postprocess` of the full text.
#[derive(Debug, Clone)]
pub struct StreamCleaner {
    stop_marker: String,
    raw: String,
    emitted: usize,
}

impl StreamCleaner {
    pub fn new(stop_marker: impl Into<String>) -> Self {
        Self {
            stop_marker: stop_marker.into(),
            raw: String::new(),
            emitted: 0,
        }
    }

    /// Add one chunk and return the text that is now safe to show.
    pub fn push(&mut self, chunk: &str) -> &str {
        self.raw.push_str(chunk);
        let held = self.raw.len() - self.partial_marker_len();
        let end = trailing_end(&self.raw[..held], &self.stop_marker);
        self.take_until(end)
    }

    /// End of stream: return the rest of the cleaned text.
    pub fn finish(&mut self) -> &str {
        let end = trailing_end(&self.raw, &self.stop_marker);
        self.take_until(end)
    }

    /// Everything received so far, uncleaned.
    pub fn into_raw(self) -> String {
        self.raw
    }

    fn take_until(&mut self, end: usize) -> &str {
        let leading = self.raw.len() - self.raw.trim_start().len();
        let start = self.emitted.max(leading);
        if end <= start {
            return "";
        }
        self.emitted = end;
        &self.raw[start..end]
    }

    /// Length of the longest proper prefix of the marker that ends the text.
    fn partial_marker_len(&self) -> usize {
        self.stop_marker
            .char_indices()
            .skip(1)
            .map(|(i, _)| i)
            .filter(|&i| self.raw.ends_with(&self.stop_marker[..i]))
            .max()
            .unwrap_or(0)
    }
}

/// Where `text` ends once trailing markers and whitespace are removed.
fn trailing_end(text: &str, stop_marker: &str) -> usize {
    let mut text = text;
    loop {
        let before = text.len();
        if !stop_marker.is_empty() {
            if let Some(stripped) = text.strip_suffix(stop_marker) {
                text = stripped;
            }
        }
        text = text.trim_end();
        if text.len() == before {
            return text.len();
        }
    }
}
