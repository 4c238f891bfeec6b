use std::path::{Path, PathBuf};

use crate::{
    chunking::ChunkingConfig,
    error::{Error, Result},
    vector_store::IndexPaths,
};

pub const DEFAULT_EMBED_MODEL: &str = "bge-m3:latest";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-oss:20b";
pub const DEFAULT_INDEX_DIR: &str = "index";

/// Everything the pipeline needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory scanned for documents.
    pub data_dir: PathBuf,
    /// Directory holding the persisted index files.
    pub index_dir: PathBuf,
    pub embed_model: String,
    pub chat_model: String,
    /// Base URL of the Ollama server.
    pub ollama_host: String,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Discard any persisted index and build a new one.
    pub rebuild: bool,
    pub chunking: ChunkingConfig,
}

impl Config {
    pub fn index_paths(&self) -> IndexPaths {
        IndexPaths::new(&self.index_dir)
    }
}

/// Resolve the documents directory from, in order of priority:
/// 1. An explicit path (from `--data-dir` or `RAG_DATA_DIR`)
/// 2. The XDG data directory (`~/.local/share/rag-local/documents`)
///
/// Unlike the index directory, this is never created: a missing data
/// directory is reported when files are discovered.
pub fn resolve_data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    xdg::BaseDirectories::with_prefix("rag-local")
        .get_data_home()
        .map(|home| home.join("documents"))
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}
