use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{MessageTemplate, TemplateKind};
use crate::settings::{NamePolicy, Settings};

const DAY_TOKEN: &str = "{day}";
const NAME_TOKEN: &str = "{name}";
const FALLBACK_NAME: &str = "friend";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => DayPart::Morning,
            12..=16 => DayPart::Afternoon,
            _ => DayPart::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPart::Morning => "morning",
            DayPart::Afternoon => "afternoon",
            DayPart::Evening => "evening",
        }
    }
}

/// Keeps the first word made only of ASCII letters.
pub fn normalize_name(display_name: &str) -> String {
    display_name
        .chars()
        .map(|c| if c.is_ascii_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
        None => String::new(),
    }
}

pub struct TemplateEngine<'s> {
    settings: &'s Settings,
}

impl<'s> TemplateEngine<'s> {
    pub fn new(settings: &'s Settings) -> Self {
        Self { settings }
    }

    fn replacement_name<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.settings
            .replacement_names
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    fn looks_like_name(&self, name: &str) -> bool {
        let starts_upper = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        let lower = name.to_ascii_lowercase();
        starts_upper
            && (2..=7).contains(&name.len())
            && !self.settings.disallowed_names.iter().any(|d| d.eq_ignore_ascii_case(&lower))
    }

    pub fn format_name<R: Rng + ?Sized>(&self, display_name: &str, rng: &mut R) -> String {
        let name = normalize_name(display_name);
        match self.settings.name_policy {
            NamePolicy::Smart if self.looks_like_name(&name) => capitalize(&name),
            NamePolicy::Smart | NamePolicy::Always => self.replacement_name(rng),
            NamePolicy::Never if name.is_empty() => self.replacement_name(rng),
            NamePolicy::Never => name,
        }
    }

    fn closing<R: Rng + ?Sized>(&self, end_phrases: &[String], followed_back: bool, rng: &mut R) -> Option<String> {
        if followed_back {
            if let Some(thanks) = self.settings.thanks_phrases.choose(rng) {
                return Some(thanks.clone());
            }
        }
        end_phrases.choose(rng).cloned()
    }

    /// Builds the reply text for a template, or `None` when the index or its
    /// start pool is empty.
    pub fn render<R: Rng + ?Sized>(
        &self,
        index: usize,
        display_name: &str,
        followed_back: bool,
        hour: u32,
        rng: &mut R,
    ) -> Option<String> {
        let template = self.settings.templates.get(index)?;
        let start = template.start_phrases.choose(rng)?.clone();

        let body = match &template.kind {
            TemplateKind::Simple => start,
            TemplateKind::Combo { end_phrases } => match self.closing(end_phrases, followed_back, rng) {
                Some(end) => format!("{start} {end}"),
                None => start,
            },
            TemplateKind::Smart { end_phrases } => {
                let end = self.closing(end_phrases, followed_back, rng).unwrap_or_default();
                if start.contains(NAME_TOKEN) || end.contains(NAME_TOKEN) {
                    format!("{start} {end}")
                } else {
                    format!("{start} {NAME_TOKEN}, {end}")
                }
            }
        };

        let name = self.format_name(display_name, rng);
        let text = body
            .replace(DAY_TOKEN, DayPart::from_hour(hour).as_str())
            .replace(NAME_TOKEN, &name);

        Some(text.split_whitespace().collect::<Vec<_>>().join(" ").trim_end_matches(',').to_string())
    }
}

/// Rolls the template's image chance and picks one image when it hits.
pub fn pick_image<R: Rng + ?Sized>(template: &MessageTemplate, rng: &mut R) -> Option<String> {
    if template.images.is_empty() || template.image_chance == 0 {
        return None;
    }
    if rng.gen_range(0..100u8) < template.image_chance.min(100) {
        template.images.choose(rng).cloned()
    } else {
        None
    }
}
