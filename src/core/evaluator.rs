use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use tracing::{debug, trace};

use crate::core::clock::Clock;
use crate::core::extract::normalize_text;
use crate::core::templates::{pick_image, TemplateEngine};
use crate::memory::Ledger;
use crate::models::{Candidate, Decision};
use crate::settings::Settings;

pub const MORNING_TEMPLATE: usize = 0;
pub const NIGHT_TEMPLATE: usize = 1;

/// Greeting families are matched after squashing repeated letters, so
/// "gmmm" and "gooood morning" land on the same entries as "gm" and
/// "good morning".
pub struct GreetingFamily {
    words: &'static [&'static str],
    phrases: &'static [&'static str],
}

pub const MORNING: GreetingFamily = GreetingFamily {
    words: &[
        "gm", "gmgm", "gmorning", "gmornin", "goodmorning", "gudmorning", "morning",
        "mornin", "moring", "mornig", "mrng", "ohayo", "buongiorno", "buenosdias",
    ],
    phrases: &[
        "good morning",
        "gud morning",
        "good mornin",
        "good moring",
        "god morning",
        "goo morning",
        "g morning",
        "rise and shine",
        "buenos dias",
    ],
};

pub const NIGHT: GreetingFamily = GreetingFamily {
    words: &[
        "gn", "gngn", "gn8", "gnight", "goodnight", "gudnight", "nite", "goodevening", "gevening",
        "nightnight", "oyasumi",
    ],
    phrases: &[
        "good night",
        "gud night",
        "good nite",
        "god night",
        "nighty night",
        "night night",
        "good evening",
        "gud evening",
        "sweet dreams",
    ],
};

fn squash(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut last = None;
    for c in word.chars() {
        if Some(c) != last {
            out.push(c);
        }
        last = Some(c);
    }
    out
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| squash(&t.to_lowercase()))
        .collect()
}

impl GreetingFamily {
    pub fn matches(&self, text: &str) -> bool {
        let text_tokens = tokens(text);
        if text_tokens.is_empty() {
            return false;
        }

        if self.words.iter().any(|w| {
            let w = squash(w);
            text_tokens.iter().any(|t| *t == w)
        }) {
            return true;
        }

        self.phrases.iter().any(|phrase| {
            let wanted = tokens(phrase);
            !wanted.is_empty() && text_tokens.windows(wanted.len()).any(|window| window == wanted.as_slice())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ThreadReply,
    Notifications,
    OwnPost,
    Unverified,
    TooOld,
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Queue(Decision),
    /// Evaluated earlier in this session.
    Seen(String),
    /// Recorded in the ledger by a previous run.
    AlreadyDone(String),
    Skip(SkipReason),
}

pub struct EvalContext<'a> {
    pub account: &'a str,
    pub on_notifications: bool,
}

pub struct Evaluator<R> {
    settings: Settings,
    clock: Arc<dyn Clock>,
    rng: R,
    seen: HashSet<String>,
}

impl<R: Rng> Evaluator<R> {
    pub fn new(settings: Settings, clock: Arc<dyn Clock>, rng: R) -> Self {
        Self {
            settings,
            clock,
            rng,
            seen: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Picks the reply template for already-normalized text. Reserved
    /// greeting families win over user keywords.
    pub fn classify(&self, text: &str) -> Option<usize> {
        let templates = &self.settings.templates;
        let enabled = |index: usize| templates.get(index).is_some_and(|t| t.enabled);

        if enabled(MORNING_TEMPLATE) && MORNING.matches(text) {
            return Some(MORNING_TEMPLATE);
        }
        if enabled(NIGHT_TEMPLATE) && NIGHT.matches(text) {
            return Some(NIGHT_TEMPLATE);
        }

        templates
            .iter()
            .enumerate()
            .skip(NIGHT_TEMPLATE + 1)
            .filter(|(_, t)| t.enabled)
            .find(|(_, t)| {
                t.keywords.iter().any(|keyword| {
                    let keyword = normalize_text(keyword);
                    !keyword.is_empty() && text.contains(&keyword)
                })
            })
            .map(|(index, _)| index)
    }

    fn roll(&mut self, chance: u8) -> bool {
        chance > 0 && self.rng.gen_range(0..100u8) < chance.min(100)
    }

    fn retweet_allowed(&self, candidate: &Candidate) -> bool {
        let rules = &self.settings.retweet;
        if !rules.enabled {
            return false;
        }
        match candidate.metrics.observed() {
            Some((replies, retweets, likes)) => {
                replies >= rules.min_replies && retweets >= rules.min_retweets && likes >= rules.min_likes
            }
            None => false,
        }
    }

    fn too_old(&self, candidate: &Candidate) -> bool {
        match (self.settings.max_post_age_minutes, candidate.posted_at) {
            (Some(minutes), Some(posted_at)) => {
                self.clock.now() - posted_at > Duration::minutes(i64::from(minutes))
            }
            _ => false,
        }
    }

    pub fn evaluate(&mut self, candidate: &Candidate, ctx: &EvalContext<'_>, ledger: &Ledger) -> Evaluation {
        if ctx.on_notifications {
            return Evaluation::Skip(SkipReason::Notifications);
        }
        if candidate.in_thread {
            return Evaluation::Skip(SkipReason::ThreadReply);
        }
        if candidate.handle.eq_ignore_ascii_case(ctx.account.trim_start_matches('@')) {
            return Evaluation::Skip(SkipReason::OwnPost);
        }
        if self.settings.verified_only && !candidate.verified {
            return Evaluation::Skip(SkipReason::Unverified);
        }
        if self.too_old(candidate) {
            return Evaluation::Skip(SkipReason::TooOld);
        }

        if ledger.contains(ctx.account, &candidate.id) {
            return Evaluation::AlreadyDone(candidate.id.clone());
        }
        if !self.seen.insert(candidate.id.clone()) {
            return Evaluation::Seen(candidate.id.clone());
        }

        let hour = self.clock.local_hour();
        let followed_back = candidate.followed_back.unwrap_or(false);
        let mut message = None;
        let mut image = None;
        let template = self.classify(&candidate.text);
        if let Some(index) = template {
            let engine = TemplateEngine::new(&self.settings);
            message = engine.render(index, &candidate.display_name, followed_back, hour, &mut self.rng);
            if message.is_some() {
                image = pick_image(&self.settings.templates[index], &mut self.rng);
            }
        }
        let should_reply = message.is_some();

        let like_chance = if should_reply {
            self.settings.reply_like_chance
        } else {
            self.settings.extra_like_chance
        };
        let mut should_like = self.roll(like_chance);

        let should_retweet = self.retweet_allowed(candidate);
        if should_retweet {
            should_like = true;
        }

        let decision = Decision {
            id: candidate.id.clone(),
            handle: candidate.handle.clone(),
            should_reply,
            should_like,
            should_retweet,
            template: template.filter(|_| should_reply),
            message,
            image,
            sent: false,
            attempted: false,
        };

        if !decision.is_actionable() {
            trace!(id = %candidate.id, "Nothing to do for candidate");
            return Evaluation::Skip(SkipReason::NothingToDo);
        }

        debug!(
            id = %decision.id,
            reply = decision.should_reply,
            like = decision.should_like,
            retweet = decision.should_retweet,
            "Queued decision"
        );
        Evaluation::Queue(decision)
    }
}
