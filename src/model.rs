//! Seams to the external models.
//!
//! The embedding model and the chat model are opaque capabilities. Both
//! are reached through these traits so the pipeline does not care whether
//! they are served by Ollama or faked in tests.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Maps text to fixed-length vectors.
pub trait Embedder {
    /// Identifier of the embedding model, stored alongside the index.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts. Returns one vector per input, in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                crate::error::Error::Model(
                    "embedding model returned no vector".to_string(),
                )
            })
    }
}

/// Maps a conversation to the assistant's reply.
pub trait ChatModel {
    fn model_name(&self) -> &str;

    fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
