//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text at the coarsest natural boundary that fits: paragraphs, then
//! lines, then sentences, then words, and only as a last resort a hard cut.
//! All sizes are measured in characters (Unicode scalar values), never bytes.

use std::collections::VecDeque;

use crate::config::RagConfig;
use crate::document::{Document, Fragment, FragmentMetadata};

/// Boundaries tried in order, coarsest first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", " "];

/// A strategy for splitting source text into fragments.
///
/// Implementations are pure: the same input always yields the same fragments,
/// and no input (including the empty string) causes a panic.
pub trait Chunker: Send + Sync {
    /// Split `text` into fragments labelled with `source`.
    ///
    /// Returns an empty `Vec` if the text is empty or only whitespace.
    fn chunk(&self, text: &str, source: &str) -> Vec<Fragment>;

    /// Split a [`Document`], using its source label.
    fn chunk_document(&self, document: &Document) -> Vec<Fragment> {
        self.chunk(&document.text, &document.source)
    }
}

/// Splits text hierarchically with overlap between adjacent fragments.
///
/// At each level the first separator present in the text is used to cut it
/// into pieces (the separator stays attached to the piece before it). Pieces
/// are merged greedily into fragments of at most `chunk_size` characters; when
/// a fragment is emitted, its trailing pieces totalling at most
/// `chunk_overlap` characters are carried into the next one. Pieces that are
/// still too large are split again with the finer separators, and text with
/// no usable separator is cut into fixed windows.
///
/// # Example
///
/// ```rust
/// use rsm_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let fragments = chunker.chunk("Short text.", "Notes");
/// assert_eq!(fragments.len(), 1);
/// assert_eq!(fragments[0].metadata.total_chunks, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per fragment (at least 1)
    /// * `chunk_overlap` - characters shared between consecutive fragments,
    ///   clamped below `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
            return self.hard_cut(text);
        };
        let finer = &separators[position + 1..];

        let mut chunks = Vec::new();
        let mut pending: Vec<(&str, usize)> = Vec::new();
        for piece in split_keeping_separator(text, separators[position]) {
            let len = char_len(piece);
            if len <= self.chunk_size {
                pending.push((piece, len));
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            chunks.extend(self.split(piece, finer));
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Merge pieces (each no longer than `chunk_size`) into overlapping fragments.
    fn merge(&self, pieces: &[(&str, usize)]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &(piece, len) in pieces {
            if total + len > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    let Some((_, front)) = window.pop_front() else { break };
                    total -= front;
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
        }
        chunks
    }

    /// Fixed windows of `chunk_size` characters, stepping by `chunk_size - chunk_overlap`.
    fn hard_cut(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str, source: &str) -> Vec<Fragment> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let texts: Vec<String> = self
            .split(text, SEPARATORS)
            .into_iter()
            .filter_map(|raw| {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();

        let total_chunks = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Fragment {
                text,
                metadata: FragmentMetadata {
                    source: source.to_string(),
                    chunk_index,
                    total_chunks,
                },
            })
            .collect()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_stays_with_preceding_piece() {
        assert_eq!(split_keeping_separator("a. b. c", ". "), vec!["a. ", "b. ", "c"]);
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\n", "x"]);
    }

    #[test]
    fn paragraph_boundaries_are_preferred() {
        let chunker = RecursiveChunker::new(20, 0);
        let fragments = chunker.chunk("first paragraph.\n\nsecond paragraph.", "doc");
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["first paragraph.", "second paragraph."]);
    }

    #[test]
    fn sentences_split_before_words() {
        let chunker = RecursiveChunker::new(30, 0);
        let fragments = chunker.chunk("One short sentence. Another short one. A third.", "doc");
        assert_eq!(fragments[0].text, "One short sentence.");
        assert!(fragments.iter().all(|f| f.text.chars().count() <= 30));
    }

    #[test]
    fn unbroken_text_falls_back_to_hard_cut_with_overlap() {
        let chunker = RecursiveChunker::new(4, 1);
        let fragments = chunker.chunk("abcdefghij", "doc");
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn word_merge_carries_overlap() {
        let chunker = RecursiveChunker::new(11, 4);
        let fragments = chunker.chunk("aaa bbb ccc ddd", "doc");
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["aaa bbb", "bbb ccc ddd"]);
    }

    #[test]
    fn multibyte_text_is_counted_in_characters() {
        let chunker = RecursiveChunker::new(3, 1);
        let fragments = chunker.chunk("ééééé", "doc");
        assert!(fragments.iter().all(|f| f.text.chars().count() <= 3));
        assert_eq!(fragments[0].text, "ééé");
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let chunker = RecursiveChunker::new(5, 50);
        assert_eq!(chunker.chunk_overlap(), 4);
        assert_eq!(RecursiveChunker::new(0, 0).chunk_size(), 1);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(RecursiveChunker::default().chunk(" \n\n\t ", "doc").is_empty());
    }
}
