//! 检索增强
//!
//! - `chunker` - 纯函数的切分算法
//! - `retriever` - 基于向量相似度的片段检索

pub mod chunker;
pub mod retriever;

pub use chunker::{chunk_pages, chunk_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use retriever::retrieve_chunks;
