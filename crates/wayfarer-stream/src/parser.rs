//! Delta parser: recognises delimiter-bounded spans in a stream of fragments
//!
//! The parser never matches a delimiter against a single fragment in
//! isolation. Every call works on the carried-over tail of the previous
//! fragment plus the new one, and any suffix that could still grow into a
//! delimiter is held back until the next fragment (or the end of the turn)
//! decides it. Output is therefore identical however the text is split.
//!
//! ```text
//!   PLAIN ──open──▶ SPAN_OPEN ──close──▶ SPAN_CLOSED
//!                       │                   ▲
//!                       └──runaway──────────┘
//! ```

use crate::config::StreamConfig;
use tracing::{debug, warn};
use wayfarer_domain::{SealedSpan, Span};

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No span seen yet
    Plain,
    /// Accumulating span text
    SpanOpen,
    /// The turn's span is done; later delimiters are stripped
    SpanClosed,
}

/// Decisions for the output multiplexer, in the order they must be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Plain content for the text channel
    Text(String),
    /// An opening delimiter was recognised
    SpanOpened {
        /// Span identity
        id: u32,
    },
    /// A closing delimiter completed the span
    SpanSealed(SealedSpan),
    /// The open span was dropped (source ended or span ran away)
    SpanDiscarded {
        /// Span identity
        id: u32,
    },
}

/// Finite-state parser for one turn
#[derive(Debug)]
pub struct DeltaParser {
    open: String,
    close: String,
    max_span_chars: usize,
    state: ParserState,
    carry: String,
    span: Option<Span>,
    next_span_id: u32,
    finished: bool,
}

impl DeltaParser {
    /// Create a parser using the configured delimiters
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            open: config.open_delimiter.clone(),
            close: config.close_delimiter.clone(),
            max_span_chars: config.max_span_chars,
            state: ParserState::Plain,
            carry: String::new(),
            span: None,
            next_span_id: 0,
            finished: false,
        }
    }

    /// Current state
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Whether a span was opened at any point in the turn
    pub fn span_opened(&self) -> bool {
        self.next_span_id > 0
    }

    /// Consume one fragment
    pub fn feed(&mut self, delta: &str) -> Vec<ParseEvent> {
        if self.finished {
            warn!("Fragment received after the parser finished; ignoring");
            return Vec::new();
        }

        let mut input = std::mem::take(&mut self.carry);
        input.push_str(delta);

        let mut events = Vec::new();
        let mut rest = input.as_str();

        loop {
            match self.state {
                ParserState::Plain => match rest.find(self.open.as_str()) {
                    Some(at) => {
                        push_text(&mut events, &rest[..at]);
                        let id = self.next_span_id;
                        self.next_span_id += 1;
                        self.span = Some(Span::open(id));
                        self.state = ParserState::SpanOpen;
                        debug!(span = id, "Span opened");
                        events.push(ParseEvent::SpanOpened { id });
                        rest = &rest[at + self.open.len()..];
                    }
                    None => {
                        let (emit, hold) = rest.split_at(rest.len() - held_back(rest, &[&self.open]));
                        push_text(&mut events, emit);
                        self.carry.push_str(hold);
                        break;
                    }
                },

                ParserState::SpanOpen => match rest.find(self.close.as_str()) {
                    Some(at) => {
                        if let Some(span) = self.span.as_mut() {
                            span.append(&rest[..at]);
                        }
                        if self.span_is_runaway() {
                            self.abandon_span(&mut events);
                        } else if let Some(span) = self.span.take() {
                            let sealed = span.seal();
                            debug!(span = sealed.id, text = %sealed.content, "Span sealed");
                            events.push(ParseEvent::SpanSealed(sealed));
                        }
                        self.state = self.after_seal();
                        rest = &rest[at + self.close.len()..];
                    }
                    None => {
                        let (inside, hold) =
                            rest.split_at(rest.len() - held_back(rest, &[&self.close]));
                        if let Some(span) = self.span.as_mut() {
                            span.append(inside);
                        }
                        self.carry.push_str(hold);
                        if self.span_is_runaway() {
                            self.abandon_span(&mut events);
                        }
                        break;
                    }
                },

                ParserState::SpanClosed => {
                    let mut out = String::new();
                    while let Some((at, len)) = find_first(rest, &self.open, &self.close) {
                        out.push_str(&rest[..at]);
                        rest = &rest[at + len..];
                    }
                    let (emit, hold) =
                        rest.split_at(rest.len() - held_back(rest, &[&self.open, &self.close]));
                    out.push_str(emit);
                    self.carry.push_str(hold);
                    push_text(&mut events, &out);
                    break;
                }
            }
        }

        events
    }

    /// End of the turn: flush held-back text and drop an unclosed span
    ///
    /// Also used when the source aborts. Calling it twice is a no-op.
    pub fn finish(&mut self) -> Vec<ParseEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.finished = true;

        let carry = std::mem::take(&mut self.carry);
        match self.state {
            ParserState::Plain | ParserState::SpanClosed => push_text(&mut events, &carry),
            ParserState::SpanOpen => {
                if let Some(span) = self.span.take() {
                    debug!(span = span.id(), "Unclosed span discarded at end of turn");
                    events.push(ParseEvent::SpanDiscarded { id: span.id() });
                }
                self.state = ParserState::SpanClosed;
            }
        }

        events
    }

    /// State entered once a span is sealed.
    ///
    /// One span per turn: later delimiters are stripped. Returning `Plain`
    /// here is the hook for allowing several spans in one turn.
    fn after_seal(&self) -> ParserState {
        ParserState::SpanClosed
    }

    fn span_is_runaway(&self) -> bool {
        self.span
            .as_ref()
            .is_some_and(|span| span.char_len() > self.max_span_chars)
    }

    /// Give up on a span that grew too long: its text becomes plain content
    fn abandon_span(&mut self, events: &mut Vec<ParseEvent>) {
        if let Some(span) = self.span.take() {
            warn!(
                span = span.id(),
                chars = span.char_len(),
                max = self.max_span_chars,
                "Span exceeded maximum length; treating it as plain text"
            );
            events.push(ParseEvent::SpanDiscarded { id: span.id() });
            let raw = span.seal().content;
            let mut stripped = String::with_capacity(raw.len());
            let mut rest = raw.as_str();
            while let Some((at, len)) = find_first(rest, &self.open, &self.close) {
                stripped.push_str(&rest[..at]);
                rest = &rest[at + len..];
            }
            stripped.push_str(rest);
            push_text(events, &stripped);
        }
        self.state = ParserState::SpanClosed;
    }
}

/// Text of a complete turn as the text channel would carry it
///
/// Runs a fresh parser over the whole text at once; used to cross-check the
/// streamed result against the source's own completion text.
pub fn strip_markup(text: &str, config: &StreamConfig) -> String {
    let mut parser = DeltaParser::new(config);
    let mut events = parser.feed(text);
    events.extend(parser.finish());

    events
        .into_iter()
        .filter_map(|event| match event {
            ParseEvent::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}

fn push_text(events: &mut Vec<ParseEvent>, text: &str) {
    if !text.is_empty() {
        events.push(ParseEvent::Text(text.to_string()));
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of a delimiter
fn held_back(text: &str, delimiters: &[&str]) -> usize {
    delimiters
        .iter()
        .map(|delimiter| {
            (1..delimiter.len())
                .rev()
                .find(|&k| delimiter.is_char_boundary(k) && text.ends_with(&delimiter[..k]))
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Earliest occurrence of either delimiter as (position, delimiter length)
fn find_first(text: &str, open: &str, close: &str) -> Option<(usize, usize)> {
    let open_at = text.find(open).map(|at| (at, open.len()));
    let close_at = text.find(close).map(|at| (at, close.len()));
    match (open_at, close_at) {
        (Some(o), Some(c)) => Some(if o.0 <= c.0 { o } else { c }),
        (o, c) => o.or(c),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn split_at_points(text: &str, mut points: Vec<usize>) -> Vec<String> {
        points.retain(|p| *p < text.len());
        points.sort_unstable();
        points.dedup();

        let mut pieces = Vec::new();
        let mut start = 0;
        for point in points {
            pieces.push(text[start..point].to_string());
            start = point;
        }
        pieces.push(text[start..].to_string());
        pieces
    }

    fn parse_pieces(pieces: &[String]) -> (String, Vec<String>) {
        let mut parser = DeltaParser::new(&StreamConfig::default());
        let mut events = Vec::new();
        for piece in pieces {
            events.extend(parser.feed(piece));
        }
        events.extend(parser.finish());

        let mut text = String::new();
        let mut spans = Vec::new();
        for event in events {
            match event {
                ParseEvent::Text(t) => text.push_str(&t),
                ParseEvent::SpanSealed(span) => spans.push(span.content),
                _ => {}
            }
        }
        (text, spans)
    }

    proptest! {
        /// Without an opening delimiter the text channel carries the input byte for byte
        #[test]
        fn test_no_delimiter_passthrough(
            text in "[a-z .,\\]]{0,60}",
            points in proptest::collection::vec(0usize..60, 0..8),
        ) {
            let pieces = split_at_points(&text, points);
            let (out, spans) = parse_pieces(&pieces);
            prop_assert_eq!(out, text);
            prop_assert!(spans.is_empty());
        }

        /// Span and text are recovered exactly wherever the fragments are cut
        #[test]
        fn test_split_invariance(
            before in "[a-z ,.]{0,20}",
            place in "[A-Za-z ]{0,15}",
            after in "[a-z ,.]{0,20}",
            points in proptest::collection::vec(0usize..64, 0..10),
        ) {
            let text = format!("{}[[{}]]{}", before, place, after);
            let pieces = split_at_points(&text, points);
            let (out, spans) = parse_pieces(&pieces);
            prop_assert_eq!(out, format!("{}{}", before, after));
            prop_assert_eq!(spans, vec![place]);
        }

        /// Streaming agrees with parsing the completed text in one go
        #[test]
        fn test_streaming_matches_strip_markup(
            text in "[a-z \\[\\]]{0,50}",
            points in proptest::collection::vec(0usize..50, 0..8),
        ) {
            let pieces = split_at_points(&text, points);
            let (out, _) = parse_pieces(&pieces);
            prop_assert_eq!(out, strip_markup(&text, &StreamConfig::default()));
        }
    }
}
