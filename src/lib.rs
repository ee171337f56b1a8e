//! # MC Quality
//!
//! 荷兰语单选题质量评估与生成工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构，底部是两块纯函数核心：
//!
//! - `analysis/` - 规则分析：长度偏差、同质性、绝对词、否定词
//! - `rag/chunker` - 按字符切分素材文本
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `Store` - SQLite 仓储
//! - `Embedder` - 显式初始化的向量化器
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `validate_questions` - 完整性校验
//! - `LlmService` - 评审 / 出题 / 补全能力
//! - `ReportWriter` - 写运行日志能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题 / 一份素材 / 一个任务"的完整处理流程
//! - `QuestionCtx` - 上下文封装（exam_id + question_index）
//! - `ValidationFlow` - 规则分析 → 模型评审 → 合并入库
//! - `EmbeddingFlow` - 读取 → 切分 → 向量化 → 入库
//! - `GenerationFlow` - 检索 → 出题 → 入库 → 评审
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 应用入口，管理资源和命令
//! - `orchestrator/exam_processor` - 单份试卷处理器
//!
//! ## 模块结构

pub mod analysis;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod rag;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use analysis::{analyze, Analyzer, Thresholds};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{Embedder, EmbeddingClient, Store};
pub use models::{Chunk, DeterministicResult, Metadata, QualityFlag, Question};
pub use orchestrator::{App, Command, RunStats};
pub use rag::{chunk_pages, chunk_text};
pub use services::{LlmService, ModelClient};
pub use workflow::{EmbeddingFlow, GenerationFlow, QuestionCtx, ValidationFlow};
