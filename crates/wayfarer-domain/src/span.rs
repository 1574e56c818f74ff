//! Spans - delimiter-bounded place mentions inside a turn

/// A span that is still accumulating text
///
/// Created when an opening delimiter is recognised and grown with every chunk
/// until the closing delimiter arrives. Sealing consumes it, so a sealed span
/// can never be appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    id: u32,
    content: String,
}

impl Span {
    /// Open a new, empty span
    pub fn open(id: u32) -> Self {
        Self {
            id,
            content: String::new(),
        }
    }

    /// Append text to the open span
    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Span identity, increasing within a turn
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of characters accumulated so far
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Close the span
    pub fn seal(self) -> SealedSpan {
        SealedSpan {
            id: self.id,
            content: self.content,
        }
    }
}

/// An immutable, completed span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSpan {
    /// Span identity
    pub id: u32,
    /// Exact text between the delimiters
    pub content: String,
}

impl SealedSpan {
    /// The entity name used for enrichment lookups (surrounding whitespace removed)
    pub fn entity(&self) -> &str {
        self.content.trim()
    }
}
