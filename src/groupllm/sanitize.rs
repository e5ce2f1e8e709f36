//! Crosstalk removal for raw agent replies.
//!
//! Chat models in a group setting like to echo their own name as a speaker tag, or to
//! keep going and write lines for the other members. [`sanitize`] cleans a raw reply
//! before it is split into fragments:
//!
//! 1. Leading self tags (`[Alice]:`, `Alice:`, `【Alice】：`, `**Alice**:`) are stripped
//!    from every message and line.
//! 2. A reply whose first message opens with another member's tag is discarded whole.
//! 3. Otherwise the reply is cut at the first message or line that opens with another
//!    member's tag, or at the first bracketed tag (`[Bob]:`) appearing mid-line.
//! 4. If nothing is left, the reply falls back to its first raw message, provided that
//!    message does not open with another member's tag. Steps 2 and 3 already keep the
//!    first line of such a message, so the fallback only ever sees a message made of
//!    bare self tags and yields nothing.
//!
//! Output is canonical: messages are trimmed and joined with `" ||| "`, so sanitizing an
//! already sanitized reply returns it unchanged.
//!
//! ```rust
//! use groupllm::sanitize::sanitize;
//!
//! let clean = sanitize("sure, let's go ||| [Bob]: actually I disagree", "Alice", &["Bob"]);
//! assert_eq!(clean, "sure, let's go");
//! assert_eq!(sanitize(&clean, "Alice", &["Bob"]), clean);
//! ```

use crate::groupllm::fragment::FRAGMENT_DELIMITER;

/// Opening and closing wrappers recognised around a speaker name.
const TAG_WRAPPERS: [(&str, &str); 4] = [("[", "]"), ("【", "】"), ("**", "**"), ("", "")];

/// Clean `raw` for the agent displayed as `self_name`, given the display names of every
/// other roster member.
pub fn sanitize(raw: &str, self_name: &str, other_names: &[&str]) -> String {
    let messages = messages(raw);
    let first = match messages.first() {
        Some(first) => *first,
        None => return String::new(),
    };

    if opens_with_other(strip_self_tags(first, self_name), other_names) {
        log::warn!(
            "Discarding reply for '{}': it opens as another member's line",
            self_name
        );
        return String::new();
    }

    let mut kept: Vec<String> = Vec::new();
    let mut truncated = false;
    for message in &messages {
        let (text, hit_crosstalk) = clean_message(message, self_name, other_names);
        if !text.is_empty() {
            kept.push(text);
        }
        if hit_crosstalk {
            truncated = true;
            break;
        }
    }

    if truncated {
        log::warn!(
            "Truncated reply for '{}' where another member's line began",
            self_name
        );
    }

    // Step 4 folds into the loop: `first` passed the opening check, so its first
    // non-blank line is in `kept` unless `first` held nothing but self tags.
    kept.join(&format!(" {} ", FRAGMENT_DELIMITER))
}

/// Trimmed, non-empty messages of a reply.
fn messages(raw: &str) -> Vec<&str> {
    raw.split(FRAGMENT_DELIMITER)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect()
}

/// Clean one message line by line. The flag is set when crosstalk was found, meaning
/// nothing after the returned text may be kept.
fn clean_message(message: &str, self_name: &str, other_names: &[&str]) -> (String, bool) {
    let mut lines: Vec<&str> = Vec::new();
    for line in message.lines() {
        let line = strip_self_tags(line, self_name);
        if opens_with_other(line, other_names) {
            return (lines.join("\n"), true);
        }
        if let Some(cut) = inline_tag_position(line, other_names) {
            let head = line[..cut].trim();
            if !head.is_empty() {
                lines.push(head);
            }
            return (lines.join("\n"), true);
        }
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    (lines.join("\n"), false)
}

/// Byte length of a leading speaker tag for `name`, including the colon and the
/// whitespace after it.
fn speaker_tag_len(text: &str, name: &str) -> Option<usize> {
    if name.trim().is_empty() {
        return None;
    }
    TAG_WRAPPERS.iter().find_map(|(open, close)| {
        let rest = text.strip_prefix(open)?.strip_prefix(name)?.strip_prefix(close)?;
        let rest = rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
        let rest = rest
            .strip_prefix(':')
            .or_else(|| rest.strip_prefix('：'))?;
        Some(text.len() - rest.trim_start().len())
    })
}

/// Remove any number of leading self tags.
fn strip_self_tags<'a>(text: &'a str, self_name: &str) -> &'a str {
    let mut rest = text.trim_start();
    while let Some(len) = speaker_tag_len(rest, self_name) {
        rest = rest[len..].trim_start();
    }
    rest
}

fn opens_with_other(text: &str, other_names: &[&str]) -> bool {
    let text = text.trim_start();
    other_names
        .iter()
        .any(|name| speaker_tag_len(text, name).is_some())
}

/// Position of the first bracketed tag of another member after the start of `line`.
fn inline_tag_position(line: &str, other_names: &[&str]) -> Option<usize> {
    line.char_indices()
        .filter(|(i, c)| *i > 0 && (*c == '[' || *c == '【'))
        .map(|(i, _)| i)
        .find(|&i| {
            other_names
                .iter()
                .any(|name| speaker_tag_len(&line[i..], name).is_some())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OTHERS: &[&str] = &["Bob", "Carol"];

    #[test]
    fn test_strips_echoed_self_tags() {
        assert_eq!(sanitize("[Alice]: hello", "Alice", OTHERS), "hello");
        assert_eq!(sanitize("Alice: Alice：hi", "Alice", OTHERS), "hi");
        assert_eq!(sanitize("【Alice】 hi", "Alice", OTHERS), "【Alice】 hi");
        assert_eq!(sanitize("**Alice**: yo ||| [Alice]: again", "Alice", OTHERS), "yo ||| again");
    }

    #[test]
    fn test_reply_opening_as_other_member_is_discarded() {
        assert_eq!(sanitize("[Bob]: I think so too", "Alice", OTHERS), "");
        assert_eq!(sanitize("[Alice]: Carol: hi ||| ok", "Alice", OTHERS), "");
    }

    #[test]
    fn test_truncates_at_next_line_of_other_member() {
        let raw = "good point\nBob: not really\nAlice: yes really";
        assert_eq!(sanitize(raw, "Alice", OTHERS), "good point");
    }

    #[test]
    fn test_truncates_at_inline_bracket_tag() {
        let raw = "agreed! [Carol]: me too ||| later";
        assert_eq!(sanitize(raw, "Alice", OTHERS), "agreed!");
    }

    #[test]
    fn test_mentions_without_tag_are_kept() {
        let raw = "Bob is right ||| ask Carol about it";
        assert_eq!(sanitize(raw, "Alice", OTHERS), "Bob is right ||| ask Carol about it");
        assert_eq!(sanitize("Bobby: hi", "Alice", OTHERS), "Bobby: hi");
    }

    #[test]
    fn test_canonical_delimiter_spacing() {
        assert_eq!(sanitize(" a|||b |||  ||| c ", "Alice", OTHERS), "a ||| b ||| c");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(sanitize("", "Alice", OTHERS), "");
        assert_eq!(sanitize(" ||| ", "Alice", OTHERS), "");
        assert_eq!(sanitize("[Alice]:", "Alice", OTHERS), "");
    }

    #[test]
    fn test_clean_first_message_always_survives() {
        let replies = [
            "ok [Bob]: x",
            "ok\nBob: x",
            "ok ||| [Bob]: x",
            "[Alice]: ok ||| Carol: hi",
            "**Alice**: ok [Carol]：x",
            "[Alice]:\nok\nBob: x",
        ];
        for raw in replies.iter() {
            assert_eq!(sanitize(raw, "Alice", OTHERS), "ok", "input: {:?}", raw);
        }
    }

    #[test]
    fn test_bare_self_tag_before_crosstalk_yields_nothing() {
        assert_eq!(sanitize("[Alice]: ||| [Bob]: hi ||| ok", "Alice", OTHERS), "");
        assert_eq!(sanitize("Alice: ||| Alice：", "Alice", OTHERS), "");
    }

    #[test]
    fn test_idempotent_on_mixed_input() {
        let inputs = [
            "Alice: hi ||| there [Bob]: nope",
            "line one\n[Alice]: line two\nCarol: stop",
            "just text",
            "[Bob]: hijack",
        ];
        for raw in inputs.iter() {
            let once = sanitize(raw, "Alice", OTHERS);
            assert_eq!(sanitize(&once, "Alice", OTHERS), once, "input: {}", raw);
        }
    }
}
