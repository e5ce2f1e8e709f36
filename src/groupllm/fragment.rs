//! Splitting an agent's reply into atomic displayable fragments.
//!
//! Agents are instructed to separate consecutive chat messages with
//! [`FRAGMENT_DELIMITER`] and to wrap special messages in inline markers:
//!
//! * `[voice]...[/voice]` becomes a [`FragmentContent::Voice`] fragment
//! * `[sticker]...[/sticker]` becomes a [`FragmentContent::Sticker`] fragment
//!
//! Everything else is plain text. Splitting is pure and order-preserving; empty
//! fragments are dropped.
//!
//! ```rust
//! use groupllm::fragment::{split, FragmentContent};
//!
//! let fragments = split("alice", "hi! ||| [voice]la la la[/voice] that was me singing");
//! assert_eq!(fragments.len(), 3);
//! assert_eq!(fragments[0].content, FragmentContent::Text("hi!".into()));
//! assert_eq!(fragments[1].content, FragmentContent::Voice("la la la".into()));
//! assert_eq!(fragments[2].content, FragmentContent::Text("that was me singing".into()));
//! ```

use serde::{Deserialize, Serialize};

/// Separator between consecutive messages of one reply.
pub const FRAGMENT_DELIMITER: &str = "|||";

/// Kind tag persisted with every conversation entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentKind {
    Text,
    Voice,
    Sticker,
}

/// The payload of a fragment, tagged by kind so renderers can match exhaustively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentContent {
    Text(String),
    /// Transcript of a voice message.
    Voice(String),
    /// Sticker name or description.
    Sticker(String),
}

impl FragmentContent {
    pub fn new(kind: FragmentKind, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        match kind {
            FragmentKind::Text => FragmentContent::Text(payload),
            FragmentKind::Voice => FragmentContent::Voice(payload),
            FragmentKind::Sticker => FragmentContent::Sticker(payload),
        }
    }

    pub fn kind(&self) -> FragmentKind {
        match self {
            FragmentContent::Text(_) => FragmentKind::Text,
            FragmentContent::Voice(_) => FragmentKind::Voice,
            FragmentContent::Sticker(_) => FragmentKind::Sticker,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            FragmentContent::Text(p) | FragmentContent::Voice(p) | FragmentContent::Sticker(p) => {
                p
            }
        }
    }

    /// The payload written back in the marker syntax agents produce, used when a
    /// fragment is replayed inside a prompt.
    pub fn to_marked_text(&self) -> String {
        match self {
            FragmentContent::Text(p) => p.clone(),
            FragmentContent::Voice(p) => format!("{}{}{}", VOICE.open, p, VOICE.close),
            FragmentContent::Sticker(p) => format!("{}{}{}", STICKER.open, p, STICKER.close),
        }
    }
}

/// One atomic emittable unit owned by an agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub agent_id: String,
    pub content: FragmentContent,
}

impl Fragment {
    pub fn new(agent_id: impl Into<String>, content: FragmentContent) -> Self {
        Self {
            agent_id: agent_id.into(),
            content,
        }
    }

    pub fn text(agent_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(agent_id, FragmentContent::Text(text.into()))
    }

    pub fn kind(&self) -> FragmentKind {
        self.content.kind()
    }

    pub fn payload(&self) -> &str {
        self.content.payload()
    }
}

struct Marker {
    open: &'static str,
    close: &'static str,
    kind: FragmentKind,
}

const VOICE: Marker = Marker {
    open: "[voice]",
    close: "[/voice]",
    kind: FragmentKind::Voice,
};

const STICKER: Marker = Marker {
    open: "[sticker]",
    close: "[/sticker]",
    kind: FragmentKind::Sticker,
};

const MARKERS: [&Marker; 2] = [&VOICE, &STICKER];

/// Split a sanitized reply into ordered fragments owned by `agent_id`.
pub fn split(agent_id: &str, text: &str) -> Vec<Fragment> {
    let mut contents = Vec::new();
    for piece in text.split(FRAGMENT_DELIMITER) {
        split_piece(piece, &mut contents);
    }
    contents
        .into_iter()
        .map(|content| Fragment::new(agent_id, content))
        .collect()
}

fn split_piece(piece: &str, out: &mut Vec<FragmentContent>) {
    let mut rest = piece;
    while let Some((start, marker)) = next_marker(rest) {
        let after_open = &rest[start + marker.open.len()..];
        let end = match after_open.find(marker.close) {
            Some(end) => end,
            // An unclosed marker is left in place as plain text.
            None => break,
        };
        push_trimmed(FragmentKind::Text, &rest[..start], out);
        push_trimmed(marker.kind, &after_open[..end], out);
        rest = &after_open[end + marker.close.len()..];
    }
    push_trimmed(FragmentKind::Text, rest, out);
}

fn next_marker(text: &str) -> Option<(usize, &'static Marker)> {
    MARKERS
        .iter()
        .filter_map(|m| text.find(m.open).map(|pos| (pos, *m)))
        .min_by_key(|(pos, _)| *pos)
}

fn push_trimmed(kind: FragmentKind, payload: &str, out: &mut Vec<FragmentContent>) {
    let payload = payload.trim();
    if !payload.is_empty() {
        out.push(FragmentContent::new(kind, payload));
    }
}
