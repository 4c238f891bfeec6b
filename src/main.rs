use std::io::{self, Write};

use clap::Parser;
use rag_local::{
    answer::Answerer,
    chunking::chunk_documents,
    cli::Cli,
    config::Config,
    embedding::build_or_load_index,
    error,
    loader::{FileStatus, Loader},
    ollama::OllamaClient,
    repl,
    walker::discover_files,
};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RAG_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = cli.into_config()?;
    run(&config)
}

fn run(config: &Config) -> error::Result<()> {
    println!(
        "[config] EMBED_MODEL={} CHAT_MODEL={}",
        config.embed_model, config.chat_model
    );

    let files = discover_files(&config.data_dir)?;
    println!(
        "Loading {} file(s) from {}",
        files.len(),
        config.data_dir.display()
    );

    let report = Loader::default().load_documents(&files);
    for (file, status) in &report.files {
        if let FileStatus::Loaded { documents } = status {
            println!("  {} -> {documents} docs", file.file_name());
        }
    }
    println!(
        "Loaded {} document(s) from {} file(s), skipped {} file(s)",
        report.documents.len(),
        report.loaded_files(),
        report.skipped_files()
    );

    let chunks = chunk_documents(&report.documents, config.chunking);
    println!("Split into {} chunk(s)", chunks.len());

    let paths = config.index_paths();
    if config.rebuild {
        tracing::info!(
            path = %config.index_dir.display(),
            "removing persisted index"
        );
        paths.remove()?;
    }

    let client = OllamaClient::new(&config.ollama_host)?;
    let embedder = client.embedder(&config.embed_model);
    let chat = client.chat_model(&config.chat_model);

    let index = build_or_load_index(&paths, chunks, &embedder)?;
    println!(
        "Index ready ({} chunk(s)). Ask a question, or press Enter on an \
         empty line to quit.",
        index.len()
    );

    let answerer = Answerer::new(&index, &embedder, &chat);
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let answered = repl::run(&answerer, config.top_k, stdin.lock(), &mut stdout)?;
    stdout.flush()?;

    tracing::debug!(answered, "session finished");
    Ok(())
}
