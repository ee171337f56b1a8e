//! 单份试卷处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **完整性校验**：检查每道题是否齐全，问题写入运行日志
//! 2. **补全建议**：有不合格题目时请模型给出补全建议
//! 3. **导入**：合格题目写入存储（按试卷 + 位置覆盖）
//! 4. **评审**：委托 `ValidationFlow` 评审整份试卷
//! 5. **统计输出**：记录存在规则问题的题目数

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::infrastructure::Store;
use crate::models::question::{ExamFile, ExamRecord, StoredQuestion};
use crate::services::{validate_questions, ModelClient, ReportWriter};
use crate::utils::logging::{log_exam_complete, log_exam_start};
use crate::workflow::{ValidationFlow, ValidationSummary};

/// 试卷处理所需的共享资源
pub struct ExamProcessor<'a, M> {
    pub store: &'a Store,
    pub llm: &'a M,
    pub validation: &'a ValidationFlow<M>,
    pub writer: &'a ReportWriter,
}

impl<M: ModelClient + 'static> ExamProcessor<'_, M> {
    /// 处理单份试卷
    ///
    /// # 参数
    /// - `exam`: 试卷数据
    /// - `exam_index`: 试卷序号（从1开始，用于日志）
    /// - `total_exams`: 本次运行的试卷总数
    pub async fn process_exam(
        &self,
        exam: &ExamFile,
        exam_index: usize,
        total_exams: usize,
    ) -> Result<ValidationSummary> {
        log_exam_start(exam_index, total_exams, &exam.name, exam.questions.len());

        // ========== 完整性校验 ==========
        let report = validate_questions(&exam.questions);
        for result in report.results.iter() {
            if !result.errors.is_empty() || !result.warnings.is_empty() {
                self.writer.write_issues(&exam.exam_id, result)?;
            }
        }

        if !report.is_valid {
            warn!(
                "[试卷 {}] ⚠️ {}/{} 道题未通过完整性校验，将跳过",
                exam_index, report.invalid_count, report.total_questions
            );
            match self.llm.repair_questions(&exam.questions, &report).await {
                Ok(plan) => {
                    info!(
                        "[试卷 {}] 💡 收到 {} 条补全建议",
                        exam_index,
                        plan.proposals.len()
                    );
                    self.writer.write_repair_plan(&exam.exam_id, &plan)?;
                }
                Err(e) => warn!("[试卷 {}] 补全建议获取失败: {}", exam_index, e),
            }
        }

        // ========== 导入 ==========
        self.store
            .upsert_exam(&ExamRecord::new(&exam.exam_id, &exam.name))
            .await
            .with_context(|| format!("无法保存试卷: {}", exam.exam_id))?;

        let mut imported = 0;
        for (parsed, result) in exam.questions.iter().zip(report.results.iter()) {
            if !result.is_valid {
                continue;
            }
            let row = StoredQuestion::from_parsed(&exam.exam_id, result.question_index + 1, parsed);
            self.store
                .upsert_question(&row)
                .await
                .with_context(|| format!("无法保存题目: {}", result.question_id))?;
            imported += 1;
        }
        info!("[试卷 {}] ✓ 导入 {} 道题", exam_index, imported);

        // ========== 评审 ==========
        let summary = self
            .validation
            .run_validation(&exam.exam_id)
            .await
            .with_context(|| format!("试卷评审失败: {}", exam.exam_id))?;

        log_exam_complete(exam_index, summary.flagged, summary.total);
        Ok(summary)
    }
}
