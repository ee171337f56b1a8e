//! 运行日志写入服务 - 业务能力层
//!
//! 只负责"把需要人工处理的内容追加到日志文件"，不关心流程

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Result;
use tracing::debug;

use crate::models::generation::RepairPlan;
use crate::services::completeness::QuestionReport;

/// 运行日志写入服务
///
/// 职责：
/// - 记录未通过完整性校验的题目
/// - 记录模型给出的补全建议
pub struct ReportWriter {
    log_file_path: String,
}

impl ReportWriter {
    pub fn new(log_file_path: impl Into<String>) -> Self {
        Self {
            log_file_path: log_file_path.into(),
        }
    }

    /// 写入一道题的校验问题
    pub fn write_issues(&self, exam_id: &str, report: &QuestionReport) -> Result<()> {
        debug!(
            "写入校验问题: 试卷 {} | 题目 {} | {} 个错误",
            exam_id,
            report.question_id,
            report.errors.len()
        );

        let mut msg = String::new();
        for issue in report.errors.iter() {
            msg.push_str(&format!(
                "试卷 {} | 题目 {} | 错误 [{}] {}\n",
                exam_id, report.question_id, issue.code, issue.message
            ));
        }
        for issue in report.warnings.iter() {
            msg.push_str(&format!(
                "试卷 {} | 题目 {} | 警告 [{}] {}\n",
                exam_id, report.question_id, issue.code, issue.message
            ));
        }
        self.append(&msg)
    }

    /// 写入补全建议
    pub fn write_repair_plan(&self, exam_id: &str, plan: &RepairPlan) -> Result<()> {
        let mut msg = format!("试卷 {} | 补全建议: {}\n", exam_id, plan.summary);
        for p in plan.proposals.iter() {
            msg.push_str(&format!(
                "  题目 #{} | {}: {} → {} ({})\n",
                p.question_index + 1,
                p.field,
                p.current_value.as_deref().unwrap_or("-"),
                p.proposed_value,
                p.explanation
            ));
        }
        self.append(&msg)
    }

    fn append(&self, msg: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)?;
        file.write_all(msg.as_bytes())?;
        Ok(())
    }
}
