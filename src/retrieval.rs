//! Maximal marginal relevance retrieval over a [`VectorIndex`].
//!
//! Candidates are the `fetch_k` rows closest to the query by L2 distance.
//! From those, results are picked one at a time, trading relevance to the
//! query against similarity to what was already picked.

use candle_core::{Device, Tensor};

use crate::{error::Result, vector_store::VectorIndex};

/// Size of the candidate pool MMR selects from.
pub const DEFAULT_FETCH_K: usize = 20;

/// Weight of query relevance versus diversity (1.0 = relevance only).
pub const DEFAULT_LAMBDA: f32 = 0.3;

/// A selected index row with its cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub row: usize,
    pub score: f32,
}

/// Return the `k` rows nearest to `query` by squared L2 distance, closest
/// first.
pub fn nearest(
    index: &VectorIndex,
    query: &[f32],
    k: usize,
) -> Result<Vec<(usize, f32)>> {
    if index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    check_dimension(index, query)?;

    let query = Tensor::from_slice(query, (1, query.len()), &Device::Cpu)?;
    let distances = index
        .matrix()?
        .broadcast_sub(&query)?
        .sqr()?
        .sum(1)?
        .to_vec1::<f32>()?;

    let mut ranked: Vec<(usize, f32)> = distances.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    Ok(ranked)
}

/// Select up to `k` diverse rows for `query`.
///
/// The first pick is the candidate most similar to the query. Each later
/// pick maximises `lambda * sim(query, c) - (1 - lambda) * max sim(c, s)`
/// over already selected rows `s`. Similarities are cosine.
pub fn max_marginal_relevance(
    index: &VectorIndex,
    query: &[f32],
    k: usize,
    fetch_k: usize,
    lambda: f32,
) -> Result<Vec<Hit>> {
    let candidates = nearest(index, query, fetch_k.max(k))?;
    let target = k.min(candidates.len());
    if target == 0 {
        return Ok(Vec::new());
    }

    let dimension = index.dimension();
    let mut data = Vec::with_capacity(candidates.len() * dimension);
    for &(row, _) in &candidates {
        data.extend_from_slice(index.row(row));
    }
    let candidate_matrix = l2_normalize(&Tensor::from_vec(
        data,
        (candidates.len(), dimension),
        &Device::Cpu,
    )?)?;
    let query_vector = l2_normalize(&Tensor::from_slice(
        query,
        (1, dimension),
        &Device::Cpu,
    )?)?;

    let to_query = query_vector
        .matmul(&candidate_matrix.t()?)?
        .squeeze(0)?
        .to_vec1::<f32>()?;
    let pairwise = candidate_matrix
        .matmul(&candidate_matrix.t()?)?
        .to_vec2::<f32>()?;

    let mut selected: Vec<usize> = Vec::with_capacity(target);
    let first = (0..candidates.len())
        .max_by(|&a, &b| to_query[a].total_cmp(&to_query[b]).then(b.cmp(&a)))
        .unwrap_or(0);
    selected.push(first);

    while selected.len() < target {
        let mut best: Option<(usize, f32)> = None;
        for (i, &relevance) in to_query.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let redundancy = selected
                .iter()
                .map(|&s| pairwise[i][s])
                .fold(f32::NEG_INFINITY, f32::max);
            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, _)) => selected.push(i),
            None => break,
        }
    }

    Ok(selected
        .into_iter()
        .map(|i| Hit {
            row: candidates[i].0,
            score: to_query[i],
        })
        .collect())
}

fn check_dimension(index: &VectorIndex, query: &[f32]) -> Result<()> {
    if query.len() != index.dimension() {
        return Err(crate::error::Error::Model(format!(
            "query embedding has dimension {}, index has {}; was the index \
             built with a different embedding model ({})?",
            query.len(),
            index.dimension(),
            index.embed_model()
        )));
    }
    Ok(())
}

/// Scale each row to unit length. All-zero rows stay zero.
fn l2_normalize(matrix: &Tensor) -> Result<Tensor> {
    let norms = matrix.sqr()?.sum_keepdim(1)?.sqrt()?.affine(1.0, 1e-12)?;
    Ok(matrix.broadcast_div(&norms)?)
}
