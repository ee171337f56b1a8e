//! 业务能力层
//!
//! - `completeness` - 题目完整性校验
//! - `prompts` - 提示词构建
//! - `llm_service` - 模型调用（评审 / 出题 / 补全）
//! - `report_writer` - 把需要人工处理的内容写入运行日志

pub mod completeness;
pub mod llm_service;
pub mod prompts;
pub mod report_writer;

pub use completeness::{validate_questions, FieldIssue, QuestionReport, ValidationReport};
pub use llm_service::{extract_json, parse_json_reply, LlmService, ModelClient};
pub use prompts::{OptionPayload, QuestionPayload};
pub use report_writer::ReportWriter;
