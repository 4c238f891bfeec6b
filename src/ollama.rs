//! Blocking client for an Ollama server.
//!
//! Only two endpoints are used: `/api/embed` for embeddings and
//! `/api/chat` for non-streaming chat completions.

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{ChatMessage, ChatModel, Embedder},
};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Sampling temperature for answers.
pub const CHAT_TEMPERATURE: f32 = 0.2;

/// Shared HTTP plumbing for the embedding and chat clients.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(host: &str) -> Result<Self> {
        // Local models can take minutes to load and answer; no timeout.
        let http = Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()?;
        Ok(Self {
            http,
            base_url: host.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::debug!(%url, "ollama request");
        let response = self.http.post(&url).json(body).send()?;
        let response = check_status(response)?;
        Ok(response.json()?)
    }

    pub fn embedder(&self, model: impl Into<String>) -> OllamaEmbedder {
        OllamaEmbedder {
            client: self.clone(),
            model: model.into(),
        }
    }

    pub fn chat_model(&self, model: impl Into<String>) -> OllamaChat {
        OllamaChat {
            client: self.clone(),
            model: model.into(),
            temperature: CHAT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    Err(Error::Model(format!("{status}: {detail}")))
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding model served by Ollama.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response: EmbedResponse = self.client.post(
            "/api/embed",
            &EmbedRequest {
                model: &self.model,
                input: texts,
            },
        )?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::Model(format!(
                "expected {} embeddings from {}, got {}",
                texts.len(),
                self.model,
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Chat model served by Ollama.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
    temperature: f32,
}

impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response: ChatResponse = self.client.post(
            "/api/chat",
            &ChatRequest {
                model: &self.model,
                messages,
                stream: false,
                options: ChatOptions {
                    temperature: self.temperature,
                },
            },
        )?;
        Ok(response.message.content)
    }
}
