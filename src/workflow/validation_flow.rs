//! 题目评审流程 - 流程层
//!
//! 核心职责：定义"一道题"的评审流程
//!
//! 流程顺序：
//! 1. 规则分析（本地、确定性）
//! 2. 模型评审（带上规则分析结果）
//! 3. 合并为 Assessment，按 (question_id, question_version) 写入
//! 4. 试卷进度 +1
//!
//! 整份试卷评审时在外层维护试卷状态：processing → completed / failed。

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::analysis::Analyzer;
use crate::error::{AppError, AppResult, BusinessError};
use crate::infrastructure::Store;
use crate::models::assessment::Assessment;
use crate::models::generation::JobStatus;
use crate::models::question::StoredQuestion;
use crate::services::{ModelClient, QuestionPayload};
use crate::utils::truncate_text;
use crate::workflow::question_ctx::QuestionCtx;

/// 一份试卷的评审汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub exam_id: String,
    pub total: usize,
    /// 规则分析给出至少一个问题标签的题目数
    pub flagged: usize,
}

/// 题目评审流程
///
/// - 不持有试卷列表，只按 exam_id 从存储读取
/// - 只依赖 ModelClient 能力，不关心具体模型
pub struct ValidationFlow<M> {
    store: Arc<Store>,
    llm: Arc<M>,
    analyzer: Arc<Analyzer>,
    max_concurrency: usize,
}

impl<M> Clone for ValidationFlow<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            llm: Arc::clone(&self.llm),
            analyzer: Arc::clone(&self.analyzer),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl<M: ModelClient + 'static> ValidationFlow<M> {
    pub fn new(store: Arc<Store>, llm: Arc<M>, max_concurrency: usize) -> Self {
        Self {
            store,
            llm,
            analyzer: Arc::new(Analyzer::default()),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// 评审一道题并写入评估记录
    ///
    /// `update_progress` 为 true 时给所属试卷的 `questions_analyzed` 加一。
    pub async fn validate_single_question(
        &self,
        question: &StoredQuestion,
        ctx: &QuestionCtx,
        update_progress: bool,
    ) -> AppResult<Assessment> {
        info!("{} 🔍 {}", ctx, truncate_text(&question.stem, 40));

        // 第一层：规则分析
        let deterministic = self.analyzer.analyze(&question.to_question());
        if deterministic.has_flags() {
            info!("{} ⚠️ 规则问题: {:?}", ctx, deterministic.flags());
        }

        // 第二层：模型评审
        let payload = QuestionPayload::from(question);
        let validation = self
            .llm
            .validate_question(&payload, &deterministic)
            .await?;

        let assessment = Assessment::merge(
            question.id.clone(),
            question.version,
            deterministic,
            validation,
        );
        self.store.upsert_assessment(&assessment).await?;

        if update_progress {
            self.store
                .increment_questions_analyzed(&question.exam_id)
                .await?;
        }

        info!("{} ✓ 评审完成", ctx);
        Ok(assessment)
    }

    /// 重新评审单道题，不改变试卷状态和进度
    pub async fn run_single_validation(&self, question_id: &str) -> AppResult<Assessment> {
        let question = self
            .store
            .get_question(question_id)
            .await?
            .ok_or_else(|| BusinessError::QuestionNotFound {
                question_id: question_id.to_string(),
            })?;

        let ctx = QuestionCtx::new(&question.exam_id, &question.id, 1, 1);
        self.validate_single_question(&question, &ctx, false)
            .await
            .map_err(|e| {
                error!("{} ❌ 单题评审失败: {}", ctx, e);
                e
            })
    }

    /// 评审整份试卷
    ///
    /// 失败时把试卷标记为 failed 并返回原始错误。
    pub async fn run_validation(&self, exam_id: &str) -> AppResult<ValidationSummary> {
        match self.validate_exam(exam_id).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("[试卷 {}] ❌ 评审失败: {}", exam_id, e);
                if let Err(mark_err) = self
                    .store
                    .set_exam_status(exam_id, JobStatus::Failed)
                    .await
                {
                    warn!("[试卷 {}] 无法标记为失败: {}", exam_id, mark_err);
                }
                Err(e)
            }
        }
    }

    async fn validate_exam(&self, exam_id: &str) -> AppResult<ValidationSummary> {
        self.store
            .set_exam_status(exam_id, JobStatus::Processing)
            .await?;

        let questions = self.store.questions_for_exam(exam_id).await?;

        if questions.is_empty() {
            warn!("[试卷 {}] 没有题目，直接标记完成", exam_id);
            self.store.set_exam_progress(exam_id, 0, 0).await?;
            self.store
                .set_exam_status(exam_id, JobStatus::Completed)
                .await?;
            return Ok(ValidationSummary {
                exam_id: exam_id.to_string(),
                ..Default::default()
            });
        }

        let total = questions.len();
        self.store.set_exam_progress(exam_id, total, 0).await?;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(total);

        for (idx, question) in questions.into_iter().enumerate() {
            let ctx = QuestionCtx::new(exam_id, &question.id, idx + 1, total);
            let flow = self.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Other(format!("信号量已关闭: {}", e)))?;
                flow.validate_single_question(&question, &ctx, true).await
            });
            handles.push(handle);
        }

        // 等待所有题目结束，再报告第一个错误
        let mut flagged = 0;
        let mut first_err = None;
        for handle in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(AppError::Other(format!("任务执行失败: {}", e))));
            match result {
                Ok(assessment) => {
                    if assessment.deterministic.has_flags() {
                        flagged += 1;
                    }
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        self.store.set_exam_progress(exam_id, total, total).await?;
        self.store
            .set_exam_status(exam_id, JobStatus::Completed)
            .await?;

        Ok(ValidationSummary {
            exam_id: exam_id.to_string(),
            total,
            flagged,
        })
    }
}
