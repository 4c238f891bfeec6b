use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{
    chunking::Chunk,
    error::{Error, Result},
};

const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// Header size: 4 bytes row count + 4 bytes dimension.
const HEADER_SIZE: usize = 8;

/// Base name of the persisted index inside the index directory.
pub const INDEX_BASENAME: &str = "faiss_index";

/// Locations of the two companion files that make up a persisted index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    /// Raw embedding matrix.
    pub vectors: PathBuf,
    /// redb database holding chunk text and metadata.
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn new(index_dir: &Path) -> Self {
        let base = index_dir.join(INDEX_BASENAME);
        Self {
            vectors: base.with_extension("vectors"),
            metadata: base.with_extension("redb"),
        }
    }

    /// A persisted index is only usable when both files are present.
    pub fn exists(&self) -> bool {
        self.vectors.is_file() && self.metadata.is_file()
    }

    /// Delete whichever of the two files exist.
    pub fn remove(&self) -> Result<()> {
        for path in [&self.vectors, &self.metadata] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// An in-memory flat vector index over chunk embeddings.
///
/// Row `i` of the embedding matrix belongs to `chunks[i]`.
///
/// On disk the index is split in two files:
///
/// - the vectors file: 4 bytes row count N (u32 LE), 4 bytes dimension D
///   (u32 LE), then N * D f32 LE values in row-major order;
/// - the metadata file: a redb database with a `chunks` table (row number
///   to JSON-encoded [`Chunk`]) and a `settings` table.
pub struct VectorIndex {
    embed_model: String,
    dimension: usize,
    chunks: Vec<Chunk>,
    /// Flat array of f32 values in row-major order: `data[row * dimension + dim_idx]`.
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from chunks and their embeddings.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    ///
    /// use rag_local::chunking::Chunk;
    /// use rag_local::vector_store::VectorIndex;
    ///
    /// let chunk = Chunk {
    ///     text: "hello".to_string(),
    ///     source: PathBuf::from("a.txt"),
    ///     page: None,
    ///     start_offset: 0,
    /// };
    /// let index =
    ///     VectorIndex::new("toy", vec![chunk], vec![vec![1.0, 0.0]]).unwrap();
    /// assert_eq!(index.len(), 1);
    /// assert_eq!(index.dimension(), 2);
    /// ```
    pub fn new(
        embed_model: impl Into<String>,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::IndexFormat(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(chunks.len() * dimension);
        for (row, embedding) in embeddings.iter().enumerate() {
            if embedding.len() != dimension {
                return Err(Error::IndexFormat(format!(
                    "embedding {row} has dimension {}, expected {dimension}",
                    embedding.len()
                )));
            }
            data.extend_from_slice(embedding);
        }

        Ok(Self {
            embed_model: embed_model.into(),
            dimension,
            chunks,
            data,
        })
    }

    /// An index with no rows. Every search against it comes back empty.
    pub fn empty(embed_model: impl Into<String>) -> Self {
        Self {
            embed_model: embed_model.into(),
            dimension: 0,
            chunks: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The embedding model the stored vectors were computed with.
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn chunk(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    /// Get the embedding vector for a specific row.
    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// The whole embedding matrix as a `[rows, dimension]` tensor.
    pub fn matrix(&self) -> Result<Tensor> {
        Ok(Tensor::from_slice(
            &self.data,
            (self.len(), self.dimension),
            &Device::Cpu,
        )?)
    }

    /// Persist the index, replacing any previous files at `paths`.
    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        for path in [&paths.vectors, &paths.metadata] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        paths.remove()?;

        let db = Database::create(&paths.metadata)?;
        let txn = db.begin_write()?;
        {
            let mut chunks = txn.open_table(CHUNKS)?;
            for (row, chunk) in self.chunks.iter().enumerate() {
                let encoded = serde_json::to_vec(chunk)?;
                chunks.insert(row as u64, encoded.as_slice())?;
            }

            let mut settings = txn.open_table(SETTINGS)?;
            settings.insert("embed_model", self.embed_model.as_str())?;
            settings.insert("dimension", self.dimension.to_string().as_str())?;
            settings
                .insert("chunk_count", self.chunks.len().to_string().as_str())?;
        }
        txn.commit()?;

        let rows = u32::try_from(self.len()).map_err(|_| {
            Error::IndexFormat(format!("too many rows: {}", self.len()))
        })?;
        let dimension = u32::try_from(self.dimension).map_err(|_| {
            Error::IndexFormat(format!("dimension too large: {}", self.dimension))
        })?;

        let mut bytes =
            Vec::with_capacity(HEADER_SIZE + std::mem::size_of_val(&*self.data));
        bytes.extend_from_slice(&rows.to_le_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes.extend_from_slice(bytemuck::cast_slice(&self.data));
        std::fs::write(&paths.vectors, bytes)?;

        Ok(())
    }

    /// Load a persisted index.
    pub fn load(paths: &IndexPaths) -> Result<Self> {
        let bytes = std::fs::read(&paths.vectors)?;
        if bytes.len() < HEADER_SIZE {
            return Err(Error::IndexFormat(format!(
                "{} is truncated",
                paths.vectors.display()
            )));
        }

        let rows =
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let dimension =
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        let expected_len = HEADER_SIZE + rows * dimension * 4;
        if bytes.len() != expected_len {
            return Err(Error::IndexFormat(format!(
                "{} has {} bytes, expected {expected_len}",
                paths.vectors.display(),
                bytes.len()
            )));
        }

        // Copy into an f32 buffer; the file bytes carry no alignment.
        let mut data = vec![0f32; rows * dimension];
        bytemuck::cast_slice_mut::<f32, u8>(&mut data)
            .copy_from_slice(&bytes[HEADER_SIZE..]);

        let db = Database::open(&paths.metadata)?;
        let txn = db.begin_read()?;

        let settings = txn.open_table(SETTINGS)?;
        let embed_model = settings
            .get("embed_model")?
            .map(|v| v.value().to_string())
            .unwrap_or_default();
        let stored_dimension = settings
            .get("dimension")?
            .and_then(|v| v.value().parse::<usize>().ok());
        if stored_dimension.is_some_and(|d| d != dimension) {
            return Err(Error::IndexFormat(format!(
                "metadata says dimension {stored_dimension:?}, vectors file \
                 says {dimension}"
            )));
        }

        let table = txn.open_table(CHUNKS)?;
        let mut chunks = Vec::with_capacity(rows);
        for entry in table.iter()? {
            let (row, value) = entry?;
            if row.value() != chunks.len() as u64 {
                return Err(Error::IndexFormat(format!(
                    "chunk rows are not contiguous at {}",
                    row.value()
                )));
            }
            chunks.push(serde_json::from_slice::<Chunk>(value.value())?);
        }

        if chunks.len() != rows {
            return Err(Error::IndexFormat(format!(
                "{} chunks in metadata but {rows} vectors",
                chunks.len()
            )));
        }

        Ok(Self {
            embed_model,
            dimension,
            chunks,
            data,
        })
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("embed_model", &self.embed_model)
            .field("rows", &self.len())
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}
