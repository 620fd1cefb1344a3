//! Popup catalog text format.
//!
//! The catalog is a loose, line-oriented document: a line mentioning one of
//! the two category headers switches the active section, and numbered lines
//! (`"12.\tSome text"`) append entries to it. Everything else is ignored.
//! Loading never fails; a missing or unusable file falls back to the built-in
//! 30/30 message set.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const NEGATIVE_HEADER: &str = "Negative thoughts";
pub const POSITIVE_HEADER: &str = "Positive thoughts";

static ENTRY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.\s*(.*)$").expect("entry regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub index: u32,
    pub text: String,
}

impl Message {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Negative,
    Positive,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Negative => "negative",
            Category::Positive => "positive",
        }
    }

    fn from_header_line(line: &str) -> Option<Self> {
        if line.contains(NEGATIVE_HEADER) {
            Some(Category::Negative)
        } else if line.contains(POSITIVE_HEADER) {
            Some(Category::Positive)
        } else {
            None
        }
    }
}

/// Where the messages of a [`PopupCatalog`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogSource {
    File { path: String },
    Fallback { reason: String },
}

impl CatalogSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, CatalogSource::Fallback { .. })
    }
}

/// Raw result of scanning a catalog document, before any fallback decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCatalog {
    pub negative: Vec<Message>,
    pub positive: Vec<Message>,
}

impl ParsedCatalog {
    pub fn parse_str(text: &str) -> Self {
        let mut parsed = ParsedCatalog::default();
        let mut section: Option<Category> = None;
        let mut running: u32 = 0;

        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();

            if let Some(category) = Category::from_header_line(line) {
                section = Some(category);
                running = 0;
                log::debug!("catalog section {} at line {}", category.label(), line_no + 1);
                continue;
            }

            let Some(captures) = ENTRY_LINE.captures(line) else {
                continue;
            };
            let content = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            if content.is_empty() {
                continue;
            }
            let Ok(index) = captures[1].parse::<u32>() else {
                log::debug!("catalog line {} has an out-of-range index", line_no + 1);
                continue;
            };
            let Some(category) = section else {
                continue;
            };

            running += 1;
            if index != running {
                log::debug!(
                    "catalog {} entry {index} breaks the 1..n sequence (expected {running})",
                    category.label()
                );
            }
            parsed
                .messages_mut(category)
                .push(Message::new(index, content));
        }

        parsed
    }

    pub fn is_complete(&self) -> bool {
        !self.negative.is_empty() && !self.positive.is_empty()
    }

    fn messages_mut(&mut self, category: Category) -> &mut Vec<Message> {
        match category {
            Category::Negative => &mut self.negative,
            Category::Positive => &mut self.positive,
        }
    }
}

/// Immutable message set consumed by the popup lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupCatalog {
    pub negative: Vec<Message>,
    pub positive: Vec<Message>,
    pub source: CatalogSource,
}

impl PopupCatalog {
    /// Loads the catalog at `path`, substituting the built-in messages (with a
    /// warning) whenever the file is missing, unreadable or incomplete.
    pub fn load(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(catalog) => {
                log::info!(
                    "loaded popup catalog from {} ({} negative, {} positive)",
                    path.display(),
                    catalog.negative.len(),
                    catalog.positive.len()
                );
                catalog
            }
            Err(err) => {
                log::warn!("popup catalog unavailable, using built-in messages: {err:#}");
                Self::fallback(format!("{err:#}"))
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading popup catalog {}", path.display()))?;
        Self::from_text(
            &text,
            CatalogSource::File {
                path: path.display().to_string(),
            },
        )
        .with_context(|| format!("parsing popup catalog {}", path.display()))
    }

    pub fn from_text(text: &str, source: CatalogSource) -> Result<Self> {
        let parsed = ParsedCatalog::parse_str(text);
        if !parsed.is_complete() {
            bail!(
                "catalog needs at least one message per category (negative: {}, positive: {})",
                parsed.negative.len(),
                parsed.positive.len()
            );
        }
        Ok(Self {
            negative: parsed.negative,
            positive: parsed.positive,
            source,
        })
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            negative: build_messages(FALLBACK_NEGATIVE),
            positive: build_messages(FALLBACK_POSITIVE),
            source: CatalogSource::Fallback {
                reason: reason.into(),
            },
        }
    }

    pub fn messages(&self, category: Category) -> &[Message] {
        match category {
            Category::Negative => &self.negative,
            Category::Positive => &self.positive,
        }
    }
}

fn build_messages(texts: &[&str]) -> Vec<Message> {
    texts
        .iter()
        .enumerate()
        .map(|(idx, text)| Message::new(idx as u32 + 1, *text))
        .collect()
}

pub const FALLBACK_NEGATIVE: &[&str] = &[
    "I'm a bit off today.",
    "People probably don't notice me.",
    "I always say the wrong thing.",
    "I'm behind everyone my age.",
    "I'm not attractive enough.",
    "My best is average.",
    "I mess up first impressions.",
    "I'm wasting my time.",
    "Everyone else has it figured out.",
    "I'm not cut out for this.",
    "I'll never meet a girl who likes me.",
    "I'm boring.",
    "She'd never be into me.",
    "My work isn't good enough to share.",
    "They can tell I'm insecure.",
    "I'm an impostor.",
    "Nothing I try ever sticks.",
    "I'm destined to be mediocre.",
    "I'm too late to the party.",
    "I'm fundamentally unlovable.",
    "Success happens to other people.",
    "I'll never be successful in business.",
    "Any win I get is a fluke.",
    "If they knew me, they'd leave.",
    "I don't deserve good things.",
    "I'll die alone.",
    "My future is already ruined.",
    "There's no point trying anymore.",
    "I'm a burden to people.",
    "Nothing I do will ever matter.",
];

pub const FALLBACK_POSITIVE: &[&str] = &[
    "I'm a little off, but it's temporary.",
    "Some people notice me; the right ones will.",
    "I can learn to say the right thing.",
    "I'm on my own timeline.",
    "People have found me attractive before.",
    "My best improves with reps.",
    "First impressions can be fixed.",
    "Every hour I invest compounds.",
    "Nobody has it fully figured out.",
    "I'm learning the skills I need.",
    "I will meet someone who likes me for me.",
    "I'm interesting when I'm present.",
    "Attraction is unpredictable; I only need one yes.",
    "My work deserves to be seen.",
    "Confidence grows with practice.",
    "I belong in the rooms I enter.",
    "Attempts are data; iteration works.",
    "I can be exceptional at my niche.",
    "The right time beats early or late.",
    "I'm fully worthy of love.",
    "I'm already building momentum.",
    "I can build a real business; revenue follows persistence.",
    "Wins come from systems, not luck.",
    "The more real I am, the closer people get.",
    "I deserve good things and I'm working toward them.",
    "I will build a life with someone.",
    "My future is flexible and forgiving.",
    "Effort creates momentum; momentum creates options.",
    "People benefit from me being here.",
    "What I do can matter a lot, to me and to others.",
];
