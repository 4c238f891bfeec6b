use kdam::{BarExt, tqdm};

use crate::{
    chunking::Chunk,
    error::{Error, Result},
    model::Embedder,
    vector_store::{IndexPaths, VectorIndex},
};

/// Number of chunks sent to the embedding model per request.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Encode chunk texts in batches, showing a progress bar on stderr.
///
/// Returns one embedding per chunk, in chunk order.
pub fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let mut bar = tqdm!(
        total = chunks.len(),
        desc = "Embedding",
        unit = " chunks"
    );
    let mut embeddings = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts)?;
        if vectors.len() != batch.len() {
            return Err(Error::Model(format!(
                "{} returned {} embeddings for {} texts",
                embedder.model_name(),
                vectors.len(),
                batch.len()
            )));
        }
        embeddings.extend(vectors);
        bar.update(batch.len())?;
    }
    bar.clear()?;

    Ok(embeddings)
}

/// Load the persisted index at `paths`, or build and persist a new one.
///
/// When both index files exist they are loaded as-is and no embeddings
/// are computed; the index is not checked against `chunks`. Otherwise
/// every chunk is embedded and the result is written to `paths`.
pub fn build_or_load_index(
    paths: &IndexPaths,
    chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
) -> Result<VectorIndex> {
    if paths.exists() {
        let index = VectorIndex::load(paths)?;
        if index.embed_model() != embedder.model_name() {
            tracing::warn!(
                stored = index.embed_model(),
                configured = embedder.model_name(),
                "persisted index was built with a different embedding model; \
                 rerun with --rebuild to re-embed"
            );
        }
        tracing::info!(
            rows = index.len(),
            path = %paths.vectors.display(),
            "loaded persisted index"
        );
        return Ok(index);
    }

    if chunks.is_empty() {
        return Err(Error::NothingToIndex);
    }

    let embeddings = embed_chunks(embedder, &chunks, EMBED_BATCH_SIZE)?;
    let index = VectorIndex::new(embedder.model_name(), chunks, embeddings)?;
    index.save(paths)?;
    tracing::info!(
        rows = index.len(),
        dimension = index.dimension(),
        path = %paths.vectors.display(),
        "built and saved index"
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, path::PathBuf};

    use super::*;

    /// Embeds text as (length, vowel count) and counts calls.
    struct CountingEmbedder {
        name: &'static str,
        calls: Cell<usize>,
    }

    impl CountingEmbedder {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: Cell::new(0),
            }
        }
    }

    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            self.name
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.set(self.calls.get() + 1);
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels =
                        t.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![t.len() as f32, vowels as f32]
                })
                .collect())
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                text: format!("chunk number {i}"),
                source: PathBuf::from("/data/a.txt"),
                page: None,
                start_offset: i * 10,
            })
            .collect()
    }

    #[test]
    fn embeds_in_batches() {
        let embedder = CountingEmbedder::new("count");
        let vectors = embed_chunks(&embedder, &chunks(5), 2).unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(embedder.calls.get(), 3);
    }

    #[test]
    fn no_chunks_no_calls() {
        let embedder = CountingEmbedder::new("count");
        assert!(embed_chunks(&embedder, &[], 8).unwrap().is_empty());
        assert_eq!(embedder.calls.get(), 0);
    }

    #[test]
    fn second_run_loads_without_embedding() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(&tmp.path().join("index"));

        let first = CountingEmbedder::new("count");
        let built = build_or_load_index(&paths, chunks(3), &first).unwrap();
        assert_eq!(built.len(), 3);
        assert!(first.calls.get() > 0);
        assert!(paths.exists());

        let second = CountingEmbedder::new("count");
        let loaded = build_or_load_index(&paths, chunks(3), &second).unwrap();
        assert_eq!(second.calls.get(), 0);
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.row(2), built.row(2));
    }

    #[test]
    fn loading_ignores_new_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        let embedder = CountingEmbedder::new("count");

        build_or_load_index(&paths, chunks(2), &embedder).unwrap();
        let loaded = build_or_load_index(&paths, chunks(9), &embedder).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn different_model_still_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());

        build_or_load_index(&paths, chunks(2), &CountingEmbedder::new("old"))
            .unwrap();
        let loaded =
            build_or_load_index(&paths, chunks(2), &CountingEmbedder::new("new"))
                .unwrap();
        assert_eq!(loaded.embed_model(), "old");
    }

    #[test]
    fn half_written_index_is_rebuilt() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        let embedder = CountingEmbedder::new("count");

        build_or_load_index(&paths, chunks(2), &embedder).unwrap();
        std::fs::remove_file(&paths.vectors).unwrap();

        let rebuilt = CountingEmbedder::new("count");
        let index = build_or_load_index(&paths, chunks(4), &rebuilt).unwrap();
        assert!(rebuilt.calls.get() > 0);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn nothing_to_index_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        let err = build_or_load_index(
            &paths,
            Vec::new(),
            &CountingEmbedder::new("count"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NothingToIndex));
        assert!(!paths.exists());
    }
}
