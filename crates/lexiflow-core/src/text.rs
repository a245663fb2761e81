//! Text helpers for the presentation boundary.
//!
//! Content strings may wrap a collocation in `**double asterisks**` and
//! matching sentences carry a [`GAP_MARKER`]. The session engine treats
//! these strings as opaque; renderers use the helpers here to split them.

use crate::model::GAP_MARKER;

const EMPHASIS: &str = "**";
const PLACEHOLDERS: [&str; 2] = ["[GAP]", "_____"];

/// A run of text, either plain or emphasized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Emphasis(String),
}

impl Span {
    pub fn text(&self) -> &str {
        match self {
            Span::Plain(s) | Span::Emphasis(s) => s,
        }
    }
}

/// Split `text` into plain and emphasized spans.
///
/// An unclosed `**` is kept as literal text. Emphasized content is trimmed;
/// a pair with only whitespace inside is kept as literal text.
pub fn parse_emphasis(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(start) = rest.find(EMPHASIS) {
        let after_open = &rest[start + EMPHASIS.len()..];
        let Some(end) = after_open.find(EMPHASIS) else {
            break;
        };

        plain.push_str(&rest[..start]);
        let inner = after_open[..end].trim();
        if inner.is_empty() {
            plain.push_str(&rest[start..start + 2 * EMPHASIS.len() + end]);
        } else {
            if !plain.is_empty() {
                spans.push(Span::Plain(std::mem::take(&mut plain)));
            }
            spans.push(Span::Emphasis(inner.to_string()));
        }
        rest = &after_open[end + EMPHASIS.len()..];
    }

    plain.push_str(rest);
    if !plain.is_empty() {
        spans.push(Span::Plain(plain));
    }
    spans
}

/// Remove emphasis markers, keeping the text.
pub fn strip_emphasis(text: &str) -> String {
    parse_emphasis(text)
        .iter()
        .map(Span::text)
        .collect::<Vec<_>>()
        .concat()
}

/// A matching sentence split around its gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GappedSentence {
    pub before: String,
    pub after: String,
}

/// Split a matching sentence at its first gap marker.
///
/// Sentences without a marker are repaired first (see [`repair_gap`]), so
/// the gap then sits at the end.
pub fn split_gap(sentence: &str) -> GappedSentence {
    let repaired;
    let sentence = match repair_gap(sentence) {
        Some(fixed) => {
            repaired = fixed;
            repaired.as_str()
        }
        None => sentence,
    };

    match sentence.split_once(GAP_MARKER) {
        Some((before, after)) => GappedSentence {
            before: before.to_string(),
            after: after.to_string(),
        },
        None => GappedSentence {
            before: sentence.to_string(),
            after: String::new(),
        },
    }
}

/// Returns a repaired sentence when `sentence` has no gap marker: stray
/// placeholder tokens are stripped and the marker is appended at the end.
/// Returns `None` when the sentence is already well formed.
pub fn repair_gap(sentence: &str) -> Option<String> {
    if sentence.contains(GAP_MARKER) {
        return None;
    }
    let mut cleaned = sentence.to_string();
    for placeholder in PLACEHOLDERS {
        cleaned = cleaned.replace(placeholder, "");
    }
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        Some(GAP_MARKER.to_string())
    } else {
        Some(format!("{cleaned} {GAP_MARKER}"))
    }
}
