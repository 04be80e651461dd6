//! Prompt assembly from retrieved fragments.

use crate::document::{RankedHits, SourceRef};

/// Longest source preview, in characters, before it is cut and marked with `...`.
pub const PREVIEW_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

/// The prompt sent to the completion provider plus the references shown to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub prompt: String,
    pub sources: Vec<SourceRef>,
}

/// Builds a grounded prompt from ranked fragments.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    subject: String,
}

impl ContextAssembler {
    /// `subject` names the domain the model should stay within, e.g. `"Python programming"`.
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into() }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Join the fragments (closest first) into a context block, wrap it in the
    /// answer template and produce one [`SourceRef`] per fragment.
    pub fn assemble(&self, question: &str, hits: &RankedHits) -> AssembledContext {
        let context =
            hits.hits().iter().map(|hit| hit.text.as_str()).collect::<Vec<_>>().join("\n\n");

        let sources = hits
            .hits()
            .iter()
            .map(|hit| SourceRef {
                page: hit.metadata.chunk_index,
                text: preview(&hit.text),
                source: hit.metadata.source.clone(),
                distance: hit.distance,
            })
            .collect();

        AssembledContext { prompt: self.prompt(question, &context), sources }
    }

    fn prompt(&self, question: &str, context: &str) -> String {
        let subject = &self.subject;
        format!(
            "You are a helpful assistant that answers questions about {subject} using the provided context.

Context from relevant documents:
{context}

Question: {question}

Instructions:
- Answer the question based only on the provided context
- If the context doesn't contain enough information to answer the question, say so
- Be concise but comprehensive
- Use examples from the context when helpful
- Focus on {subject} concepts and best practices

Answer:"
        )
    }
}

/// Cut `text` to [`PREVIEW_CHARS`] characters, appending `...` when anything was dropped.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FragmentMetadata, SearchHit};

    fn hit(text: &str, chunk_index: usize, distance: f32) -> SearchHit {
        SearchHit {
            text: text.to_string(),
            metadata: FragmentMetadata {
                source: "PEP 8".to_string(),
                chunk_index,
                total_chunks: 10,
            },
            distance,
        }
    }

    #[test]
    fn long_preview_is_cut_to_203_chars() {
        let text = "x".repeat(250);
        let out = preview(&text);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn short_preview_is_untouched() {
        let text = "y".repeat(150);
        assert_eq!(preview(&text), text);
        let exact = "z".repeat(200);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let text = "é".repeat(201);
        let out = preview(&text);
        assert_eq!(out.chars().count(), 203);
    }

    #[test]
    fn context_keeps_rank_order_and_full_text() {
        let long = "a".repeat(300);
        let hits = RankedHits::from_ascending(
            "test",
            vec![hit("closest", 4, 0.1), hit(&long, 7, 0.3)],
        )
        .unwrap();

        let assembled = ContextAssembler::new("Python programming").assemble("What?", &hits);

        let block = format!("closest\n\n{long}");
        assert!(assembled.prompt.contains(&block));
        assert!(assembled.prompt.contains("Question: What?"));
        assert!(assembled.prompt.contains("Python programming"));
        assert_eq!(assembled.sources.len(), 2);
        assert_eq!(assembled.sources[0].page, 4);
        assert_eq!(assembled.sources[0].text, "closest");
        assert_eq!(assembled.sources[1].page, 7);
        assert_eq!(assembled.sources[1].text.chars().count(), 203);
        assert_eq!(assembled.sources[1].distance, 0.3);
    }

    #[test]
    fn prompt_carries_grounding_instructions() {
        let hits = RankedHits::from_ascending("test", vec![hit("ctx", 0, 0.0)]).unwrap();
        let prompt = ContextAssembler::new("Rust").assemble("q", &hits).prompt;
        assert!(prompt.contains("based only on the provided context"));
        assert!(prompt.contains("doesn't contain enough information"));
        assert!(prompt.contains("concise"));
        assert!(prompt.contains("examples from the context"));
        assert!(prompt.contains("Focus on Rust"));
    }
}
