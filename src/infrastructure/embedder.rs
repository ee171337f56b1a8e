//! 向量化 - 基础设施层
//!
//! 通过 OpenAI 兼容的 embeddings 接口编码文本（默认 multilingual-e5-base）。
//! E5 系列要求素材加 `passage: `、检索请求加 `query: ` 前缀，前缀在发送前统一加上。
//!
//! `Embedder` 在启动时显式创建，通过 `Arc` 传给需要的调用方；
//! 流程层只依赖 `EmbeddingClient`，测试中换成不联网的实现。

use std::future::Future;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::embeddings::{CreateEmbeddingRequest, CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

/// 单次请求最多携带的文本数
pub const EMBED_BATCH_SIZE: usize = 100;

/// 文本的角色，决定编码前加的前缀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    /// 待检索的素材片段
    Passage,
    /// 检索请求
    Query,
}

impl EmbedRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            EmbedRole::Passage => "passage: ",
            EmbedRole::Query => "query: ",
        }
    }

    /// 给文本加上角色前缀
    pub fn apply(&self, text: &str) -> String {
        format!("{}{}", self.prefix(), text)
    }
}

/// 向量化能力
pub trait EmbeddingClient: Send + Sync {
    /// 按角色批量编码，返回与输入同序的向量
    fn embed_texts(
        &self,
        texts: &[String],
        role: EmbedRole,
    ) -> impl Future<Output = AppResult<Vec<Vec<f32>>>> + Send;

    /// 编码素材片段
    fn embed_passages(
        &self,
        texts: &[String],
    ) -> impl Future<Output = AppResult<Vec<Vec<f32>>>> + Send {
        self.embed_texts(texts, EmbedRole::Passage)
    }

    /// 编码单个检索请求
    fn embed_query(&self, query: &str) -> impl Future<Output = AppResult<Vec<f32>>> + Send {
        let texts = vec![query.to_string()];
        async move {
            self.embed_texts(&texts, EmbedRole::Query)
                .await?
                .pop()
                .ok_or_else(|| AppError::Other("向量化结果为空".to_string()))
        }
    }
}

/// 文本向量化器
pub struct Embedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
    max_retries: usize,
}

impl Embedder {
    /// 创建向量化器
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.embedding_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions.max(1),
            max_retries: config.llm_max_retries.max(1),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// 构造一批文本的请求，文本已带角色前缀
    fn build_request(&self, texts: &[String], role: EmbedRole) -> AppResult<CreateEmbeddingRequest> {
        let input: Vec<String> = texts.iter().map(|t| role.apply(t)).collect();
        CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(input))
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model, e))
    }

    /// 发送一批请求，按 index 还原顺序并做 L2 归一化
    async fn request_batch(&self, texts: &[String], role: EmbedRole) -> AppResult<Vec<Vec<f32>>> {
        let request = self.build_request(texts, role)?;
        let response = self.client.embeddings().create(request).await.map_err(|e| {
            warn!("Embedding API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model, e)
        })?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(LlmError::EmbeddingMismatch {
                model: self.model.clone(),
                expected: texts.len(),
                actual: data.len(),
            }
            .into());
        }

        data.into_iter()
            .map(|d| self.check_dimensions(d.embedding).map(normalize))
            .collect()
    }

    fn check_dimensions(&self, vector: Vec<f32>) -> AppResult<Vec<f32>> {
        if vector.len() != self.dimensions {
            return Err(LlmError::EmbeddingMismatch {
                model: self.model.clone(),
                expected: self.dimensions,
                actual: vector.len(),
            }
            .into());
        }
        Ok(vector)
    }
}

impl EmbeddingClient for Embedder {
    async fn embed_texts(&self, texts: &[String], role: EmbedRole) -> AppResult<Vec<Vec<f32>>> {
        debug!(
            "编码 {} 段文本 ({:?}, 模型 {}, 维度 {})",
            texts.len(),
            role,
            self.model,
            self.dimensions
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let mut last_err = None;
            let mut encoded = None;

            for retry_count in 0..self.max_retries {
                match self.request_batch(batch, role).await {
                    Ok(v) => {
                        encoded = Some(v);
                        break;
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(
                            "Embedding 请求失败 (尝试 {}/{}): {}，等待 2 秒后重试...",
                            retry_count + 1,
                            self.max_retries,
                            e
                        );
                        last_err = Some(e);
                        sleep(Duration::from_secs(2)).await;
                    }
                    Err(e) => return Err(e),
                }
            }

            match encoded {
                Some(v) => vectors.extend(v),
                None => {
                    return Err(last_err
                        .unwrap_or_else(|| AppError::Other("Embedding 重试次数为 0".to_string())))
                }
            }
        }
        Ok(vectors)
    }
}

/// L2 归一化；零向量保持不变
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// 余弦相似度；任一向量为零向量或长度不同则为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
