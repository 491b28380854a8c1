use serde::{Deserialize, Serialize};

use crate::models::{MessageTemplate, TemplateKind};

/// Templates 0 and 1 are permanent: they can be disabled but never removed.
pub const RESERVED_TEMPLATES: usize = 2;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NamePolicy {
    #[default]
    Smart,
    Never,
    Always,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetweetRules {
    pub enabled: bool,
    pub min_replies: u64,
    pub min_retweets: u64,
    pub min_likes: u64,
}

impl Default for RetweetRules {
    fn default() -> Self {
        Self {
            enabled: false,
            min_replies: 5,
            min_retweets: 10,
            min_likes: 20,
        }
    }
}

/// Base delays in milliseconds, before speed scaling and jitter.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Delays {
    pub like_ms: u64,
    pub retweet_ms: u64,
    pub reply_ms: u64,
    pub follow_ms: u64,
    pub confirm_timeout_ms: u64,
    pub tick_min_ms: u64,
    pub tick_max_ms: u64,
    pub scroll_min_ms: u64,
    pub scroll_max_ms: u64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            like_ms: 1_500,
            retweet_ms: 2_000,
            reply_ms: 4_000,
            follow_ms: 2_000,
            confirm_timeout_ms: 1_500,
            tick_min_ms: 800,
            tick_max_ms: 1_600,
            scroll_min_ms: 2_000,
            scroll_max_ms: 4_000,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// 0-100, higher is faster.
    pub speed: u8,
    pub session_min: u32,
    pub session_max: u32,
    pub templates: Vec<MessageTemplate>,
    pub name_policy: NamePolicy,
    pub replacement_names: Vec<String>,
    pub disallowed_names: Vec<String>,
    pub thanks_phrases: Vec<String>,
    pub retweet: RetweetRules,
    /// Percent chance of liking an item that also gets a reply.
    pub reply_like_chance: u8,
    /// Percent chance of liking an item that gets no reply.
    pub extra_like_chance: u8,
    pub verified_only: bool,
    pub max_post_age_minutes: Option<u32>,
    pub follow_check: bool,
    pub delays: Delays,
}

impl Settings {
    /// Multiplier applied to every base delay.
    pub fn speed_factor(&self) -> f64 {
        2.0 - 1.5 * f64::from(self.speed.min(100)) / 100.0
    }

    pub fn session_bounds(&self) -> (u32, u32) {
        let min = self.session_min.max(1);
        (min, self.session_max.max(min))
    }

    pub fn add_template(&mut self, template: MessageTemplate) -> usize {
        self.templates.push(template);
        self.templates.len() - 1
    }

    /// Removes a user template. Reserved slots are never removed.
    pub fn remove_template(&mut self, index: usize) -> Option<MessageTemplate> {
        if index < RESERVED_TEMPLATES || index >= self.templates.len() {
            return None;
        }
        Some(self.templates.remove(index))
    }

    /// Restores the reserved slots if a stored config lost them.
    pub fn ensure_reserved(&mut self) {
        let defaults = default_templates();
        for (slot, template) in defaults.into_iter().enumerate() {
            if self.templates.len() <= slot {
                self.templates.push(template);
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed: 50,
            session_min: 8,
            session_max: 15,
            templates: default_templates(),
            name_policy: NamePolicy::Smart,
            replacement_names: vec!["fren".into(), "friend".into(), "legend".into(), "champ".into()],
            disallowed_names: vec![
                "the".into(),
                "official".into(),
                "news".into(),
                "crypto".into(),
                "nft".into(),
                "bot".into(),
            ],
            thanks_phrases: vec![
                "thanks for the follow!".into(),
                "appreciate the follow back!".into(),
            ],
            retweet: RetweetRules::default(),
            reply_like_chance: 70,
            extra_like_chance: 20,
            verified_only: false,
            max_post_age_minutes: None,
            follow_check: false,
            delays: Delays::default(),
        }
    }
}

fn default_templates() -> Vec<MessageTemplate> {
    vec![
        MessageTemplate {
            name: "GM".into(),
            enabled: true,
            kind: TemplateKind::Combo {
                end_phrases: vec![
                    "have a great {day}!".into(),
                    "enjoy your {day}".into(),
                ],
            },
            start_phrases: vec!["GM {name}".into(), "Good morning {name}".into()],
            keywords: Vec::new(),
            images: Vec::new(),
            image_chance: 0,
        },
        MessageTemplate {
            name: "GN".into(),
            enabled: true,
            kind: TemplateKind::Simple,
            start_phrases: vec!["GN {name}, sleep well".into(), "Good night {name}".into()],
            keywords: Vec::new(),
            images: Vec::new(),
            image_chance: 0,
        },
    ]
}
