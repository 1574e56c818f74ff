//! Fragments - the unit of text delivered by a fragment source

/// One incremental chunk of generated text
///
/// Fragments arrive strictly in order and are never revisited. The terminal
/// fragment carries the complete text of the turn as the source saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// An intermediate chunk
    Delta(String),

    /// Completion signal with the full accumulated text
    Done {
        /// Complete turn text, delimiters included
        content: String,
    },
}

impl Fragment {
    /// Create an intermediate chunk
    pub fn delta(text: impl Into<String>) -> Self {
        Fragment::Delta(text.into())
    }

    /// Create the completion signal
    pub fn done(content: impl Into<String>) -> Self {
        Fragment::Done {
            content: content.into(),
        }
    }

    /// Whether this is the completion signal
    pub fn is_final(&self) -> bool {
        matches!(self, Fragment::Done { .. })
    }

    /// Text carried by the fragment
    pub fn text(&self) -> &str {
        match self {
            Fragment::Delta(text) => text,
            Fragment::Done { content } => content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_kinds() {
        let delta = Fragment::delta("Par");
        let done = Fragment::done("Paris");

        assert!(!delta.is_final());
        assert!(done.is_final());
        assert_eq!(delta.text(), "Par");
        assert_eq!(done.text(), "Paris");
    }
}
