use std::path::PathBuf;

use clap::Parser;

use crate::{
    answer::DEFAULT_TOP_K,
    chunking::ChunkingConfig,
    config::{
        self,
        Config,
        DEFAULT_CHAT_MODEL,
        DEFAULT_EMBED_MODEL,
        DEFAULT_INDEX_DIR,
    },
    error::{Error, Result},
    ollama,
};

#[derive(Debug, Parser)]
#[command(
    name = "rag-local",
    about = "Ask questions about a folder of documents using local models"
)]
pub struct Cli {
    /// Directory of PDF/TXT/Markdown files to index
    #[arg(long, env = "RAG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory where the vector index is persisted
    #[arg(long, env = "RAG_INDEX_DIR", default_value = DEFAULT_INDEX_DIR)]
    pub index_dir: PathBuf,

    /// Ollama embedding model
    #[arg(long, env = "EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL)]
    pub embed_model: String,

    /// Ollama chat model used to answer questions
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Base URL of the Ollama server
    #[arg(long, env = "OLLAMA_HOST", default_value = ollama::DEFAULT_HOST)]
    pub ollama_host: String,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Delete the persisted index and build it again
    #[arg(long)]
    pub rebuild: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Resolve the parsed arguments into a [`Config`].
    pub fn into_config(self) -> Result<Config> {
        if self.top_k == 0 {
            return Err(Error::Config("--top-k must be at least 1".into()));
        }

        let ollama_host = if self.ollama_host.contains("://") {
            self.ollama_host
        } else {
            // OLLAMA_HOST is commonly set as a bare host:port.
            format!("http://{}", self.ollama_host)
        };

        Ok(Config {
            data_dir: config::resolve_data_dir(self.data_dir.as_deref())?,
            index_dir: self.index_dir,
            embed_model: self.embed_model,
            chat_model: self.chat_model,
            ollama_host,
            top_k: self.top_k,
            rebuild: self.rebuild,
            chunking: ChunkingConfig::default(),
        })
    }
}
