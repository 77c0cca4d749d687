use std::collections::HashMap;
use std::ops::Range;

use super::types::{Chunk, Document};

/// Paragraph, line, word, character.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters repeated from the end of the previous chunk.
    pub chunk_overlap: usize,
    /// Tried in order; an empty separator means a hard cut by character.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 20,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Recursive separator-based splitter with exact character overlap.
///
/// Text is first cut into consecutive spans of at most `chunk_size - chunk_overlap`
/// characters, preferring the earliest separator that occurs in the text and
/// recursing into oversized pieces with the remaining separators. Each span is
/// then emitted behind the last `chunk_overlap` characters of the previous chunk,
/// so no chunk is longer than `chunk_size`. Whitespace-only spans are dropped and
/// never contribute overlap.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    fn sizes(&self) -> (usize, usize) {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(chunk_size - 1);
        (chunk_size, overlap)
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.content.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let (chunk_size, overlap) = self.sizes();
        let mut spans = Vec::new();
        segment(
            text,
            0..text.len(),
            &self.config.separators,
            chunk_size - overlap,
            &mut spans,
        );

        let mut chunks: Vec<Chunk> = Vec::new();
        for span in spans {
            let fresh = &text[span.clone()];
            if fresh.trim().is_empty() {
                continue;
            }
            let (head, carried) = chunks
                .last()
                .map_or(("", 0), |prev| tail(&prev.content, overlap));
            chunks.push(Chunk {
                content: format!("{head}{fresh}"),
                source: document.metadata.source.clone(),
                chunk_index: chunks.len(),
                start_offset: span.start,
                overlap: carried,
            });
        }
        chunks
    }

    /// Split several documents, numbering chunks per `source` across documents
    /// (a multi-page PDF yields one running sequence).
    #[must_use]
    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut next_index: HashMap<&str, usize> = HashMap::new();
        let mut out = Vec::new();
        for doc in documents {
            let counter = next_index.entry(doc.metadata.source.as_str()).or_insert(0);
            for mut chunk in self.split(doc) {
                chunk.chunk_index = *counter;
                *counter += 1;
                out.push(chunk);
            }
        }
        out
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`, and how many that is.
fn tail(s: &str, n: usize) -> (&str, usize) {
    let mut start = s.len();
    let mut taken = 0;
    for (i, _) in s.char_indices().rev().take(n) {
        start = i;
        taken += 1;
    }
    (&s[start..], taken)
}

fn segment(
    text: &str,
    range: Range<usize>,
    separators: &[String],
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    let slice = &text[range.clone()];
    if char_len(slice) <= budget {
        out.push(range);
        return;
    }

    let chosen = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || slice.contains(sep.as_str()));
    let Some((idx, sep)) = chosen.filter(|(_, sep)| !sep.is_empty()) else {
        hard_cut(text, range, budget, out);
        return;
    };
    let remaining = &separators[idx + 1..];

    let mut current: Option<Range<usize>> = None;
    let mut current_len = 0;
    let mut pos = range.start;
    // Separators stay attached to the end of the preceding piece.
    for piece in slice.split_inclusive(sep.as_str()) {
        let piece_range = pos..pos + piece.len();
        pos = piece_range.end;
        let piece_len = char_len(piece);

        if piece_len > budget {
            if let Some(r) = current.take() {
                out.push(r);
            }
            current_len = 0;
            segment(text, piece_range, remaining, budget, out);
            continue;
        }

        match current.as_mut() {
            Some(r) if current_len + piece_len <= budget => {
                r.end = piece_range.end;
                current_len += piece_len;
            }
            _ => {
                if let Some(r) = current.take() {
                    out.push(r);
                }
                current = Some(piece_range);
                current_len = piece_len;
            }
        }
    }
    if let Some(r) = current {
        out.push(r);
    }
}

fn hard_cut(text: &str, range: Range<usize>, budget: usize, out: &mut Vec<Range<usize>>) {
    let slice = &text[range.clone()];
    let mut start = range.start;
    let mut count = 0;
    for (i, _) in slice.char_indices() {
        if count == budget {
            out.push(start..range.start + i);
            start = range.start + i;
            count = 0;
        }
        count += 1;
    }
    if start < range.end {
        out.push(start..range.end);
    }
}
