use serde::{Deserialize, Serialize};

use crate::models::question::{BloomLevel, QuestionOption};

/// 出题规格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSpec {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub bloom_level: BloomLevel,
    #[serde(default)]
    pub learning_goal: String,
    #[serde(default = "default_num_options")]
    pub num_options: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

fn default_count() -> usize {
    5
}

fn default_num_options() -> usize {
    4
}

impl Default for GenerationSpec {
    fn default() -> Self {
        Self {
            count: default_count(),
            bloom_level: BloomLevel::default(),
            learning_goal: String::new(),
            num_options: default_num_options(),
            top_k: None,
        }
    }
}

/// 模型生成的一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub stem: String,
    pub options: Vec<QuestionOption>,
    pub bloom_level: BloomLevel,
    /// 出题依据的片段编号（对应提示词中的 chunk id）
    #[serde(default)]
    pub chunk_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub questions: Vec<GeneratedQuestion>,
}

/// 对缺失字段的一条修补建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairProposal {
    pub question_index: usize,
    pub field: String,
    #[serde(default)]
    pub current_value: Option<String>,
    pub proposed_value: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    pub proposals: Vec<RepairProposal>,
    pub summary: String,
}

/// 任务 / 分析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// 出题任务（TOML 输入，也是 `generation_jobs` 表的一行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    #[serde(default)]
    pub id: String,
    pub exam_id: String,
    pub material_id: String,
    pub specification: GenerationSpec,
    #[serde(default = "default_status")]
    pub status: JobStatus,
    #[serde(default)]
    pub result_question_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

fn default_status() -> JobStatus {
    JobStatus::Pending
}
