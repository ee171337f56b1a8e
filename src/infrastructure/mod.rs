//! 基础设施层
//!
//! 持有稀缺资源，只暴露能力：
//! - `Store` - SQLite 仓储
//! - `Embedder` - 显式初始化的向量化客户端

pub mod embedder;
pub mod store;

pub use embedder::{cosine_similarity, EmbedRole, Embedder, EmbeddingClient};
pub use store::Store;
