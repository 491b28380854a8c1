// src/core/tests/extract_tests.rs

use chrono::{TimeZone, Utc};

use super::super::extract::{candidate_id, normalize_text, parse_count};
use crate::models::{Candidate, RawItem};

#[test]
fn test_parse_count_abbreviations() {
    assert_eq!(parse_count("87"), Some(87));
    assert_eq!(parse_count("1,204"), Some(1204));
    assert_eq!(parse_count("1.2K"), Some(1200), "1.2K should expand to 1200");
    assert_eq!(parse_count("15k"), Some(15_000));
    assert_eq!(parse_count("3M"), Some(3_000_000));
    assert_eq!(parse_count(" 2.5m "), Some(2_500_000));
}

#[test]
fn test_parse_count_rejects_garbage() {
    assert_eq!(parse_count(""), None);
    assert_eq!(parse_count("   "), None);
    assert_eq!(parse_count("K"), None);
    assert_eq!(parse_count("lots"), None);
    assert_eq!(parse_count("-4"), None);
}

#[test]
fn test_normalize_text() {
    assert_eq!(normalize_text("  GM   Fren,\n have a\u{200b} great one "), "gm fren, have a great one");
}

#[test]
fn test_candidate_id_prefers_permalink() {
    let id = candidate_id(Some("https://x.com/alice/status/1789?s=20"), "alice", "gm");
    assert_eq!(id, "status:1789");

    let path_only = candidate_id(Some("/alice/posts/abc/"), "alice", "gm");
    assert_eq!(path_only, "path:alice/posts/abc");
}

#[test]
fn test_candidate_id_hash_is_stable() {
    let first = candidate_id(None, "@Alice", "gm fren");
    let second = candidate_id(None, "alice", "gm fren");
    let other = candidate_id(None, "alice", "gn fren");

    assert!(first.starts_with("hash:"));
    assert_eq!(first, second, "Handle case and @ prefix should not change the id");
    assert_ne!(first, other, "Different text should give a different id");
}

#[test]
fn test_candidate_from_raw() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let raw = RawItem {
        permalink: Some("https://x.com/alice/status/42".into()),
        handle: "@alice".into(),
        display_name: " Alice ".into(),
        verified: true,
        text: "GM  everyone".into(),
        replies: Some("12".into()),
        retweets: Some("1.5K".into()),
        likes: None,
        ..Default::default()
    };

    let candidate = Candidate::from_raw(&raw, now);
    assert_eq!(candidate.id, "status:42");
    assert_eq!(candidate.handle, "alice");
    assert_eq!(candidate.display_name, "Alice");
    assert_eq!(candidate.text, "gm everyone");
    assert_eq!(candidate.metrics.replies, Some(12));
    assert_eq!(candidate.metrics.retweets, Some(1500));
    assert_eq!(candidate.metrics.likes, None);
    assert_eq!(candidate.metrics.observed(), None);
    assert_eq!(candidate.followed_back, None);
    assert_eq!(candidate.discovered_at, now);
}
