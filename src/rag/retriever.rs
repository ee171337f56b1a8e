//! 片段检索
//!
//! 按余弦相似度从某份素材的已存片段中取前 K 个。

use std::cmp::Ordering;

use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::{cosine_similarity, EmbeddingClient, Store};
use crate::models::chunk::{Chunk, StoredChunk};

/// 检索与 `query` 最相关的片段
///
/// 相似度相同时按片段位置排序，结果稳定。
pub async fn retrieve_chunks<E: EmbeddingClient>(
    store: &Store,
    embedder: &E,
    query: &str,
    material_id: &str,
    top_k: usize,
) -> AppResult<Vec<Chunk>> {
    let stored = store.chunks_for_material(material_id).await?;
    if stored.is_empty() {
        return Ok(Vec::new());
    }

    let query_embedding = embedder.embed_query(query).await?;

    let mut scored: Vec<(f32, StoredChunk)> = stored
        .into_iter()
        .map(|c| (cosine_similarity(&query_embedding, &c.embedding), c))
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then(a.position.cmp(&b.position))
    });

    debug!(
        "素材 {} 共 {} 个片段，取前 {} 个",
        material_id,
        scored.len(),
        top_k
    );

    Ok(scored
        .into_iter()
        .take(top_k)
        .map(|(_, c)| c.into_chunk())
        .collect())
}
