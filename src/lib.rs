//! rag-local - ask questions about a folder of documents with local models.
//!
//! rag-local loads PDF, text and Markdown files, splits them into
//! overlapping chunks, embeds them through a local
//! [Ollama](https://ollama.com) server and persists the resulting vector
//! index. Questions are answered by a local chat model from chunks picked
//! with maximal marginal relevance.
//!
//! # Quick start
//!
//! ```no_run
//! use rag_local::{
//!     Answerer, Loader, OllamaClient, chunking, discover_files,
//!     embedding, vector_store::IndexPaths,
//! };
//!
//! let files = discover_files("documents".as_ref()).unwrap();
//! let report = Loader::default().load_documents(&files);
//! let chunks = chunking::chunk_documents(
//!     &report.documents,
//!     chunking::ChunkingConfig::default(),
//! );
//!
//! let client = OllamaClient::new("http://localhost:11434").unwrap();
//! let embedder = client.embedder("bge-m3:latest");
//! let chat = client.chat_model("gpt-oss:20b");
//!
//! let paths = IndexPaths::new("index".as_ref());
//! let index = embedding::build_or_load_index(&paths, chunks, &embedder)
//!     .unwrap();
//!
//! let answer = Answerer::new(&index, &embedder, &chat)
//!     .answer_question("What changed in Q1?", 5);
//! println!("{}", answer.text);
//! ```

pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod loader;
pub mod model;
pub mod ollama;
pub mod pdf;
pub mod repl;
pub mod retrieval;
pub mod vector_store;
pub mod walker;

pub use answer::{Answer, Answerer, Source};
pub use config::Config;
pub use error::{Error, Result};
pub use loader::{Document, Loader};
pub use ollama::OllamaClient;
pub use vector_store::VectorIndex;
pub use walker::discover_files;
