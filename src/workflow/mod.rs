//! 流程层（Workflow Layer）
//!
//! 定义"一道题 / 一份素材 / 一个出题任务"的完整处理流程，
//! 只依赖业务能力（services）和基础设施（infrastructure）。

pub mod embedding_flow;
pub mod generation_flow;
pub mod question_ctx;
pub mod validation_flow;

#[cfg(test)]
pub(crate) mod test_support;

pub use embedding_flow::EmbeddingFlow;
pub use generation_flow::GenerationFlow;
pub use question_ctx::QuestionCtx;
pub use validation_flow::{ValidationFlow, ValidationSummary};
