use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::models::{Candidate, Metrics, RawItem};

/// Lowercases, drops zero-width characters and collapses runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}'))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses counters as the timeline shows them: "87", "1,204", "1.2K", "3M".
pub fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier).round() as u64)
}

/// Stable identifier for an item. The status id from the permalink wins;
/// without one, a hash of handle and normalized text stands in.
pub fn candidate_id(permalink: Option<&str>, handle: &str, normalized_text: &str) -> String {
    if let Some(link) = permalink {
        let path = link.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        while let Some(segment) = segments.next() {
            if segment == "status" {
                if let Some(status) = segments.next() {
                    return format!("status:{status}");
                }
            }
        }
        let trimmed = path.trim_matches('/');
        if !trimmed.is_empty() {
            return format!("path:{trimmed}");
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(handle.trim_start_matches('@').to_lowercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized_text.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("hash:{}", &digest[..16])
}

impl Candidate {
    pub fn from_raw(raw: &RawItem, discovered_at: DateTime<Utc>) -> Self {
        let text = normalize_text(&raw.text);
        let handle = raw.handle.trim().trim_start_matches('@').to_string();
        Candidate {
            id: candidate_id(raw.permalink.as_deref(), &handle, &text),
            handle,
            display_name: raw.display_name.trim().to_string(),
            verified: raw.verified,
            text,
            metrics: Metrics {
                replies: raw.replies.as_deref().and_then(parse_count),
                retweets: raw.retweets.as_deref().and_then(parse_count),
                likes: raw.likes.as_deref().and_then(parse_count),
            },
            discovered_at,
            posted_at: raw.posted_at,
            in_thread: raw.in_thread,
            followed_back: None,
        }
    }
}
