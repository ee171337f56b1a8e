use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 片段元数据（来源标识等），同一次切分的所有片段共享同一份
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// 检索用文本片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// 在来源中的顺序，从 0 开始连续
    pub position: usize,
    /// 仅分页来源才有页码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default)]
    pub metadata: Arc<Metadata>,
}

impl Chunk {
    /// 字符数
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// 分页文档中的一页
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 从 1 开始
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// 素材解析结果：整段文本或分页文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedText {
    Plain(String),
    Paged(Vec<PageText>),
}

impl ExtractedText {
    /// 全文，页与页之间以空行连接
    pub fn full_text(&self) -> String {
        match self {
            ExtractedText::Plain(text) => text.clone(),
            ExtractedText::Paged(pages) => pages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// `chunks` 表中的一行：片段加向量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    #[serde(default)]
    pub id: String,
    pub material_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub position: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StoredChunk {
    pub fn from_chunk(material_id: &str, chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: String::new(),
            material_id: material_id.to_string(),
            content: chunk.text.clone(),
            embedding,
            page: chunk.page,
            position: chunk.position,
            metadata: chunk.metadata.as_ref().clone(),
        }
    }

    pub fn into_chunk(self) -> Chunk {
        Chunk {
            text: self.content,
            position: self.position,
            page: self.page,
            metadata: Arc::new(self.metadata),
        }
    }
}

/// `materials` 表中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub content_text: String,
    #[serde(default)]
    pub chunk_count: usize,
}
