//! 素材入库流程 - 流程层
//!
//! 流程顺序：读取素材 → 切分 → 向量化 → 写入 `chunks` → 更新 `materials`

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppResult, LlmError};
use crate::infrastructure::{EmbeddingClient, Store};
use crate::models::chunk::{ExtractedText, MaterialRecord, Metadata, StoredChunk};
use crate::models::loaders::load_material;
use crate::rag::{chunk_pages, chunk_text};

/// 素材正文最多保存的字符数
pub const MAX_CONTENT_CHARS: usize = 50_000;

/// 素材入库流程
///
/// 重复入库同一素材时整体替换其旧片段。
pub struct EmbeddingFlow<E> {
    store: Arc<Store>,
    embedder: Arc<E>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<E: EmbeddingClient> EmbeddingFlow<E> {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<E>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            chunk_size,
            chunk_overlap,
        }
    }

    /// 处理一份素材文件，返回写入的片段数
    pub async fn run_embedding(&self, material_id: &str, path: &Path) -> AppResult<usize> {
        info!("[素材 {}] 📄 读取 {}", material_id, path.display());
        let extracted = load_material(path).await?;
        self.embed_text(material_id, &path.display().to_string(), &extracted)
            .await
    }

    /// 切分并写入已提取的文本
    pub async fn embed_text(
        &self,
        material_id: &str,
        file_path: &str,
        extracted: &ExtractedText,
    ) -> AppResult<usize> {
        let mut metadata = Metadata::new();
        metadata.insert("material_id".to_string(), material_id.into());
        let metadata = Arc::new(metadata);

        let chunks = match extracted {
            ExtractedText::Paged(pages) => {
                chunk_pages(pages, metadata, self.chunk_size, self.chunk_overlap)
            }
            ExtractedText::Plain(text) => {
                chunk_text(text, metadata, self.chunk_size, self.chunk_overlap)
            }
        };

        if chunks.is_empty() {
            warn!("[素材 {}] ⚠️ 没有生成任何片段", material_id);
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        info!("[素材 {}] 🧮 向量化 {} 个片段...", material_id, texts.len());
        let embeddings = self.embedder.embed_passages(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(LlmError::EmbeddingMismatch {
                model: "embedder".to_string(),
                expected: chunks.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let rows: Vec<StoredChunk> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk::from_chunk(material_id, chunk, embedding))
            .collect();
        self.store.replace_chunks(material_id, &rows).await?;

        let material = MaterialRecord {
            id: material_id.to_string(),
            file_path: file_path.to_string(),
            content_text: extracted.full_text().chars().take(MAX_CONTENT_CHARS).collect(),
            chunk_count: chunks.len(),
        };
        self.store.upsert_material(&material).await?;

        info!("[素材 {}] ✓ 入库完成: {} 个片段", material_id, chunks.len());
        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::EmbedRole;
    use crate::models::chunk::PageText;
    use crate::workflow::test_support::FakeEmbedder;
    use serde_json::json;

    struct Fixture {
        store: Arc<Store>,
        embedder: Arc<FakeEmbedder>,
        flow: EmbeddingFlow<FakeEmbedder>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::in_memory().unwrap());
        let embedder = Arc::new(FakeEmbedder::new(64));
        let flow = EmbeddingFlow::new(Arc::clone(&store), Arc::clone(&embedder), 100, 20);
        Fixture {
            store,
            embedder,
            flow,
        }
    }

    #[tokio::test]
    async fn test_embed_plain_text() {
        let fx = fixture();
        let text = "Fotosynthese zet licht om in chemische energie. ".repeat(10);

        let count = fx
            .flow
            .embed_text("mat-1", "bron.txt", &ExtractedText::Plain(text.clone()))
            .await
            .unwrap();
        assert!(count > 1);

        let chunks = fx.store.chunks_for_material("mat-1").await.unwrap();
        assert_eq!(chunks.len(), count);
        assert!(chunks.iter().all(|c| c.embedding.len() == 64));
        assert_eq!(chunks[0].metadata["material_id"], json!("mat-1"));
        assert_eq!(*fx.embedder.roles.lock().unwrap(), vec![EmbedRole::Passage]);

        let material = fx.store.get_material("mat-1").await.unwrap().unwrap();
        assert_eq!(material.chunk_count, count);
        assert_eq!(material.content_text, text);
    }

    #[tokio::test]
    async fn test_reembedding_replaces_chunks() {
        let fx = fixture();
        let long = ExtractedText::Plain("Cellen delen door mitose. ".repeat(20));
        let first = fx.flow.embed_text("mat-1", "a.txt", &long).await.unwrap();
        assert!(first > 1);

        let short = ExtractedText::Plain("Alleen nog deze zin.".into());
        assert_eq!(fx.flow.embed_text("mat-1", "a.txt", &short).await.unwrap(), 1);

        let chunks = fx.store.chunks_for_material("mat-1").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Alleen nog deze zin.");
    }

    #[tokio::test]
    async fn test_paged_text_keeps_page_numbers() {
        let fx = fixture();
        let pages = ExtractedText::Paged(vec![
            PageText::new(1, "Eerste pagina."),
            PageText::new(4, "Vierde pagina."),
        ]);

        fx.flow.embed_text("mat-2", "boek.txt", &pages).await.unwrap();

        let chunks = fx.store.chunks_for_material("mat-2").await.unwrap();
        let page_numbers: Vec<Option<u32>> = chunks.iter().map(|c| c.page).collect();
        assert_eq!(page_numbers, vec![Some(1), Some(4)]);
    }

    #[tokio::test]
    async fn test_empty_text_writes_nothing() {
        let fx = fixture();
        let count = fx
            .flow
            .embed_text("mat-3", "leeg.txt", &ExtractedText::Plain("   ".into()))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(fx.store.get_material("mat-3").await.unwrap().is_none());
        assert!(fx.embedder.roles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_content_text_is_truncated() {
        let fx = fixture();
        let text = "a".repeat(MAX_CONTENT_CHARS + 10);
        fx.flow
            .embed_text("mat-4", "groot.txt", &ExtractedText::Plain(text))
            .await
            .unwrap();

        let material = fx.store.get_material("mat-4").await.unwrap().unwrap();
        assert_eq!(material.content_text.chars().count(), MAX_CONTENT_CHARS);
    }
}
