//! Answering questions from retrieved context.

use std::path::Path;

use crate::{
    model::{ChatMessage, ChatModel, Embedder},
    retrieval::{self, DEFAULT_FETCH_K, DEFAULT_LAMBDA},
    vector_store::VectorIndex,
};

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 5;

/// Returned when retrieval finds nothing.
pub const NO_CONTENT_MESSAGE: &str = "[No relevant content found]\n\
    Check that the data directory contains readable TXT/Markdown files or \
    unencrypted PDFs, or try asking with different keywords.";

const SYSTEM_PROMPT: &str = "You are a research assistant. Answer strictly \
    from the provided [Retrieved context]. If the documents do not cover the \
    question, say that you don't know instead of guessing. Do not list the \
    sources again at the end of your answer.";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Where a piece of retrieved context came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Base name of the source file.
    pub file_name: String,
    /// `p.N` with the zero-based page number for paged documents, empty
    /// otherwise.
    pub page_label: String,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.page_label.is_empty() {
            write!(f, "{}", self.file_name)
        } else {
            write!(f, "{} {}", self.file_name, self.page_label)
        }
    }
}

/// An answer and the sources of the context it was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// One entry per retrieved chunk, in retrieval order. Empty when
    /// nothing was retrieved or the model call failed.
    pub sources: Vec<Source>,
}

impl Answer {
    fn without_sources(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Ties the index and both models together for question answering.
pub struct Answerer<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    chat: &'a dyn ChatModel,
    fetch_k: usize,
    lambda: f32,
}

impl<'a> Answerer<'a> {
    pub fn new(
        index: &'a VectorIndex,
        embedder: &'a dyn Embedder,
        chat: &'a dyn ChatModel,
    ) -> Self {
        Self {
            index,
            embedder,
            chat,
            fetch_k: DEFAULT_FETCH_K,
            lambda: DEFAULT_LAMBDA,
        }
    }

    /// Answer `question` from the `k` most relevant, diverse chunks.
    ///
    /// Never fails: retrieval and model errors are turned into an answer
    /// text describing the problem, with no sources.
    pub fn answer_question(&self, question: &str, k: usize) -> Answer {
        let hits = match self.retrieve(question, k) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(
                    model = self.embedder.model_name(),
                    "retrieval failed: {e}"
                );
                return Answer::without_sources(failure_message(
                    &e,
                    "EMBED_MODEL",
                    self.embedder.model_name(),
                ));
            }
        };

        if hits.is_empty() {
            return Answer::without_sources(NO_CONTENT_MESSAGE);
        }

        let mut sources = Vec::with_capacity(hits.len());
        let mut blocks = Vec::with_capacity(hits.len());
        for hit in hits.iter().filter_map(|h| self.index.chunk(h.row)) {
            sources.push(Source {
                file_name: file_name(&hit.source),
                page_label: hit
                    .page
                    .map(|p| format!("p.{p}"))
                    .unwrap_or_default(),
            });
            blocks.push(hit.text.as_str());
        }

        let messages = build_messages(question, &blocks.join(CONTEXT_SEPARATOR));
        match self.chat.chat(&messages) {
            Ok(text) => Answer {
                text: text.trim().to_string(),
                sources,
            },
            Err(e) => {
                tracing::warn!(model = self.chat.model_name(), "chat failed: {e}");
                Answer::without_sources(failure_message(
                    &e,
                    "CHAT_MODEL",
                    self.chat.model_name(),
                ))
            }
        }
    }

    fn retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> crate::Result<Vec<retrieval::Hit>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed_query(question)?;
        retrieval::max_marginal_relevance(
            self.index,
            &query,
            k,
            self.fetch_k,
            self.lambda,
        )
    }
}

/// Diagnostic shown instead of an answer when a model call fails.
///
/// `variable` is the environment variable that selects `model`.
fn failure_message(error: &crate::Error, variable: &str, model: &str) -> String {
    format!(
        "\n\nModel call failed: {error}\n\
         {variable} is set to: {model}\n\
         Run `ollama list` to check that it has been pulled.\n\
         If it is missing: `ollama pull {model}`, or point {variable} at a \
         model you already have."
    )
}

fn build_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "My question: {question}\n\n[Retrieved context]\n{context}\n"
        )),
    ]
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render sources as a single comma-separated line.
///
/// # Examples
///
/// ```
/// use rag_local::answer::{Source, format_sources};
///
/// let sources = vec![
///     Source { file_name: "a.pdf".into(), page_label: "p.2".into() },
///     Source { file_name: "notes.txt".into(), page_label: String::new() },
/// ];
/// assert_eq!(format_sources(&sources), "a.pdf p.2, notes.txt");
/// ```
pub fn format_sources(sources: &[Source]) -> String {
    sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, path::PathBuf};

    use super::*;
    use crate::{Error, Result, chunking::Chunk, model::Role};

    /// One-hot embedding over a tiny vocabulary.
    struct KeywordEmbedder;

    const VOCAB: [&str; 3] = ["revenue", "cats", "weather"];

    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    VOCAB
                        .iter()
                        .map(|w| if lower.contains(w) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "broken-embed"
        }

        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Model("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        seen: RefCell<Vec<ChatMessage>>,
    }

    impl ChatModel for RecordingChat {
        fn model_name(&self) -> &str {
            "echo"
        }

        fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.borrow_mut().extend_from_slice(messages);
            Ok("  Revenue grew 10% in Q1.  \n".to_string())
        }
    }

    struct FailingChat;

    impl ChatModel for FailingChat {
        fn model_name(&self) -> &str {
            "gpt-oss:20b"
        }

        fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(Error::Model("model 'gpt-oss:20b' not found".to_string()))
        }
    }

    fn chunk(text: &str, source: &str, page: Option<u32>) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: PathBuf::from(source),
            page,
            start_offset: 0,
        }
    }

    fn sample_index() -> VectorIndex {
        let chunks = vec![
            chunk("Revenue grew 10% in Q1.", "/data/notes.txt", None),
            chunk("Cats sleep a lot.", "/data/pets/cats.pdf", Some(4)),
        ];
        let embeddings = KeywordEmbedder
            .embed(&chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>())
            .unwrap();
        VectorIndex::new("keywords", chunks, embeddings).unwrap()
    }

    #[test]
    fn empty_index_returns_no_content() {
        let index = VectorIndex::empty("keywords");
        let chat = RecordingChat::default();
        let answerer = Answerer::new(&index, &KeywordEmbedder, &chat);

        let answer = answerer.answer_question("anything?", DEFAULT_TOP_K);
        assert_eq!(answer.text, NO_CONTENT_MESSAGE);
        assert!(answer.sources.is_empty());
        assert!(chat.seen.borrow().is_empty());
    }

    #[test]
    fn answer_is_trimmed_and_cites_sources() {
        let index = sample_index();
        let chat = RecordingChat::default();
        let answerer = Answerer::new(&index, &KeywordEmbedder, &chat);

        let answer = answerer.answer_question("What about revenue?", 1);
        assert_eq!(answer.text, "Revenue grew 10% in Q1.");
        assert_eq!(answer.sources, vec![Source {
            file_name: "notes.txt".to_string(),
            page_label: String::new(),
        }]);
    }

    #[test]
    fn pdf_sources_get_zero_based_page_labels() {
        let index = sample_index();
        let chat = RecordingChat::default();
        let answerer = Answerer::new(&index, &KeywordEmbedder, &chat);

        let answer = answerer.answer_question("Tell me about cats", 2);
        assert_eq!(answer.sources[0].to_string(), "cats.pdf p.4");
        assert_eq!(answer.sources.len(), 2);
    }

    #[test]
    fn prompt_restricts_model_to_context() {
        let index = sample_index();
        let chat = RecordingChat::default();
        let answerer = Answerer::new(&index, &KeywordEmbedder, &chat);

        answerer.answer_question("cats and revenue?", 2);
        let seen = chat.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[0].content.contains("don't know"));
        assert_eq!(seen[1].role, Role::User);
        assert!(seen[1].content.starts_with("My question: cats and revenue?"));
        assert!(seen[1].content.contains("Cats sleep a lot."));
        assert!(seen[1].content.contains(CONTEXT_SEPARATOR));
    }

    #[test]
    fn chat_failure_becomes_diagnostic_answer() {
        let index = sample_index();
        let answerer = Answerer::new(&index, &KeywordEmbedder, &FailingChat);

        let answer = answerer.answer_question("revenue?", DEFAULT_TOP_K);
        assert!(answer.text.contains("gpt-oss:20b"));
        assert!(answer.text.contains("model 'gpt-oss:20b' not found"));
        assert!(answer.text.contains("ollama list"));
        assert!(answer.text.contains("CHAT_MODEL is set to: gpt-oss:20b"));
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn embedding_failure_becomes_diagnostic_answer() {
        let index = sample_index();
        let chat = RecordingChat::default();
        let answerer = Answerer::new(&index, &FailingEmbedder, &chat);

        let answer = answerer.answer_question("revenue?", DEFAULT_TOP_K);
        assert!(answer.text.contains("connection refused"));
        assert!(answer.text.contains("EMBED_MODEL is set to: broken-embed"));
        assert!(answer.text.contains("ollama pull broken-embed"));
        assert!(!answer.text.contains("echo"));
        assert!(answer.sources.is_empty());
        assert!(chat.seen.borrow().is_empty());
    }
}
