use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement counters. Any of them may be hidden on the page.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub replies: Option<u64>,
    pub retweets: Option<u64>,
    pub likes: Option<u64>,
}

impl Metrics {
    /// All three counters, only when every one of them was observed.
    pub fn observed(&self) -> Option<(u64, u64, u64)> {
        Some((self.replies?, self.retweets?, self.likes?))
    }
}

/// A timeline item as the page hands it over, before any normalization.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct RawItem {
    pub permalink: Option<String>,
    pub handle: String,
    pub display_name: String,
    pub verified: bool,
    pub text: String,
    pub replies: Option<String>,
    pub retweets: Option<String>,
    pub likes: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub in_thread: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub verified: bool,
    pub text: String,
    pub metrics: Metrics,
    pub discovered_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub in_thread: bool,
    // Nothing detects follow-back yet; extractors always leave this unset.
    pub followed_back: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub id: String,
    pub handle: String,
    pub should_reply: bool,
    pub should_like: bool,
    pub should_retweet: bool,
    pub template: Option<usize>,
    pub message: Option<String>,
    pub image: Option<String>,
    pub sent: bool,
    pub attempted: bool,
}

impl Decision {
    pub fn is_actionable(&self) -> bool {
        self.should_reply || self.should_like || self.should_retweet
    }

    pub fn is_pending(&self) -> bool {
        !self.sent && !self.attempted
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Reply,
    Like,
    Retweet,
    Follow,
}

/// Visual state rendered next to an evaluated item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Badge {
    Actionable,
    Completed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TemplateKind {
    Simple,
    Combo { end_phrases: Vec<String> },
    Smart { end_phrases: Vec<String> },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageTemplate {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: TemplateKind,
    pub start_phrases: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Percent chance (0-100) that a reply carries an image from `images`.
    #[serde(default)]
    pub image_chance: u8,
}

fn enabled_by_default() -> bool {
    true
}
