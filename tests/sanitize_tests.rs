// Integration tests for crosstalk sanitization feeding the fragment splitter
use groupllm::fragment::{split, FragmentContent, FragmentKind};
use groupllm::sanitize::sanitize;

const ROSTER_OTHERS: &[&str] = &["Bob", "Carol"];

#[test]
fn test_crosstalk_tail_is_dropped() {
    let clean = sanitize(
        "sure, let's go ||| [Bob]: actually I disagree",
        "Alice",
        ROSTER_OTHERS,
    );
    let fragments = split("alice", &clean);

    assert_eq!(fragments.len(), 1);
    assert_eq!(
        fragments[0].content,
        FragmentContent::Text("sure, let's go".to_string())
    );
}

#[test]
fn test_sanitization_is_idempotent() {
    let replies = [
        "sure, let's go ||| [Bob]: actually I disagree",
        "[Alice]: hey! ||| [voice]good morning[/voice]",
        "Alice: ok\nCarol: no way\nok fine",
        "Carol: I'll take over",
        "   |||   ",
        "thinking... [Carol]：hmm ||| more",
        "**Alice**: [sticker]thumbs up[/sticker]",
        "Bob mentioned it earlier ||| Carol agrees",
    ];
    for raw in replies.iter() {
        let once = sanitize(raw, "Alice", ROSTER_OTHERS);
        let twice = sanitize(&once, "Alice", ROSTER_OTHERS);
        assert_eq!(once, twice, "not idempotent for {:?}", raw);
        assert_eq!(split("alice", &once), split("alice", &twice));
    }
}

#[test]
fn test_markers_survive_sanitization() {
    let clean = sanitize(
        "[Alice]: hey! ||| [voice]good morning[/voice]",
        "Alice",
        ROSTER_OTHERS,
    );
    let kinds: Vec<FragmentKind> = split("alice", &clean).iter().map(|f| f.kind()).collect();
    assert_eq!(kinds, vec![FragmentKind::Text, FragmentKind::Voice]);
}

#[test]
fn test_fullwidth_tag_mid_line_truncates() {
    let clean = sanitize("thinking... [Carol]：hmm ||| more", "Alice", ROSTER_OTHERS);
    assert_eq!(clean, "thinking...");
}

#[test]
fn test_impersonation_yields_nothing() {
    assert_eq!(sanitize("Carol: I'll take over", "Alice", ROSTER_OTHERS), "");
    assert!(split("alice", "").is_empty());
}

#[test]
fn test_single_member_roster_never_truncates() {
    let clean = sanitize("[Alice]: Bob: is that you?", "Alice", &[]);
    assert_eq!(clean, "Bob: is that you?");
}
