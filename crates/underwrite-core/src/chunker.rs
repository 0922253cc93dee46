//! Chunker: splits policy text into segments for extraction.
//!
//! Splitting is structure-first. Section headings cut the document into
//! sections; oversized sections are split at paragraph breaks, then at list
//! items, then at sentence ends, greedily packing units up to the target
//! size. A final pass merges undersized neighbours. A single sentence
//! larger than the target is kept whole.

use serde::{Deserialize, Serialize};

use crate::patterns::{
    CAPS_HEADING, LIST_ITEM, NUMBERED_HEADING, PARAGRAPH_BREAK, SENTENCE_END, TITLE_HEADING,
};

/// How segment size is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMetric {
    Chars,
    /// Roughly four characters per token
    #[default]
    ApproxTokens,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub target_size: usize,
    pub min_size: usize,
    pub metric: SizeMetric,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: 400,
            min_size: 200,
            metric: SizeMetric::ApproxTokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Paragraph,
    ListItem,
    Sentence,
}

impl Level {
    fn finer(self) -> Option<Level> {
        match self {
            Level::Paragraph => Some(Level::ListItem),
            Level::ListItem => Some(Level::Sentence),
            Level::Sentence => None,
        }
    }

    fn joiner(self) -> &'static str {
        match self {
            Level::Paragraph => "\n\n",
            Level::ListItem => "\n",
            Level::Sentence => " ",
        }
    }

    fn units(self, text: &str) -> Vec<&str> {
        let pieces: Vec<&str> = match self {
            Level::Paragraph => PARAGRAPH_BREAK.split(text).collect(),
            Level::ListItem => split_before(text, LIST_ITEM.find_iter(text).map(|m| m.start())),
            Level::Sentence => split_after(text, SENTENCE_END.find_iter(text).map(|m| m.end())),
        };
        pieces
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

fn split_before(text: &str, cuts: impl Iterator<Item = usize>) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            out.push(&text[start..cut]);
            start = cut;
        }
    }
    out.push(&text[start..]);
    out
}

fn split_after(text: &str, cuts: impl Iterator<Item = usize>) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for cut in cuts {
        out.push(&text[start..cut]);
        start = cut;
    }
    out.push(&text[start..]);
    out
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunker with the given target and a minimum of half of it.
    pub fn with_target(target_size: usize, metric: SizeMetric) -> Self {
        Self::new(ChunkerConfig {
            target_size,
            min_size: target_size / 2,
            metric,
        })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn size(&self, text: &str) -> usize {
        let chars = text.chars().count();
        match self.config.metric {
            SizeMetric::Chars => chars,
            SizeMetric::ApproxTokens => chars.div_ceil(4),
        }
    }

    fn target(&self) -> usize {
        self.config.target_size.max(1)
    }

    /// Split `text` into segments. Same input, same output.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if self.size(text) <= self.target() {
            return vec![text.to_string()];
        }

        let sections = sections(text);
        tracing::debug!(sections = sections.len(), "Structural sections identified");

        let mut segments = Vec::new();
        for section in sections {
            if self.size(section) <= self.target() {
                segments.push(section.to_string());
            } else {
                segments.extend(self.split(section, Level::Paragraph));
            }
        }

        let chunks = self.merge_small(segments);
        tracing::debug!(chunks = chunks.len(), "Chunked text");
        chunks
    }

    fn split(&self, text: &str, level: Level) -> Vec<String> {
        let units = level.units(text);
        if units.len() <= 1 {
            return match level.finer() {
                Some(finer) => self.split(text, finer),
                None => vec![text.to_string()],
            };
        }

        let mut out = Vec::new();
        let mut current = String::new();
        for unit in units {
            if self.size(unit) > self.target() {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                match level.finer() {
                    Some(finer) => out.extend(self.split(unit, finer)),
                    None => out.push(unit.to_string()),
                }
                continue;
            }

            if current.is_empty() {
                current = unit.to_string();
                continue;
            }

            let candidate = format!("{}{}{}", current, level.joiner(), unit);
            if self.size(&candidate) <= self.target() {
                current = candidate;
            } else {
                out.push(std::mem::replace(&mut current, unit.to_string()));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    /// Join a segment with its predecessor when either is below the
    /// minimum and the result still fits the target.
    fn merge_small(&self, segments: Vec<String>) -> Vec<String> {
        let mut merged: Vec<String> = Vec::with_capacity(segments.len());
        for segment in segments {
            if let Some(last) = merged.last_mut() {
                let small = self.size(last) < self.config.min_size
                    || self.size(&segment) < self.config.min_size;
                if small {
                    let candidate = format!("{last}\n\n{segment}");
                    if self.size(&candidate) <= self.target() {
                        *last = candidate;
                        continue;
                    }
                }
            }
            merged.push(segment);
        }
        merged
    }
}

/// Cut at every heading line. Returns the whole text when there are none.
fn sections(text: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = NUMBERED_HEADING
        .find_iter(text)
        .chain(CAPS_HEADING.find_iter(text))
        .chain(TITLE_HEADING.find_iter(text))
        .map(|m| m.start())
        .filter(|&pos| pos > 0)
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    split_before(text, cuts.into_iter())
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Chunk with the default configuration and the given target.
pub fn chunk(text: &str, target_size: usize) -> Vec<String> {
    Chunker::with_target(target_size, SizeMetric::ApproxTokens).chunk(text)
}
