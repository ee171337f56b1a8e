//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和命令调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用入口
//! - 管理应用生命周期（初始化、运行）
//! - 解析子命令（validate / embed / generate）
//! - 批量加载试卷（Vec<ExamFile>）
//! - 持有存储、向量器和模型客户端
//! - 输出全局统计信息
//!
//! ### `exam_processor` - 单份试卷处理器
//! - 完整性校验并记录问题
//! - 导入合格题目
//! - 委托 ValidationFlow 评审整份试卷
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<ExamFile> / 素材 / 出题任务)
//!     ↓
//! exam_processor (处理 Vec<ParsedQuestion>)
//!     ↓
//! workflow::ValidationFlow (并发处理单道题)
//!     ↓
//! services (能力层：completeness / llm / report)
//!     ↓
//! infrastructure (基础设施：Store / Embedder)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，exam_processor 管单份
//! 2. **资源隔离**：只有编排层创建 Store、Embedder 和模型客户端
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;
pub mod exam_processor;

// 重新导出主要类型
pub use batch_processor::{App, Command, RunStats};
pub use exam_processor::ExamProcessor;
