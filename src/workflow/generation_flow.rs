//! 出题流程 - 流程层
//!
//! 流程顺序：
//! 1. 读取任务，标记 processing
//! 2. 以学习目标为查询检索素材片段
//! 3. 模型出题
//! 4. 题目接在试卷已有题目之后写入 `questions`（来源 generated）
//! 5. 对整份试卷重新评审
//! 6. 任务标记 completed，记录生成的题目 ID
//!
//! 任一步失败时任务标记 failed 并记录错误信息。

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{AppResult, BusinessError};
use crate::infrastructure::{EmbeddingClient, Store};
use crate::models::generation::{GeneratedQuestion, GenerationJob, JobStatus};
use crate::models::question::{correct_index_of, QuestionSource, StoredQuestion};
use crate::rag::retrieve_chunks;
use crate::services::ModelClient;
use crate::workflow::validation_flow::ValidationFlow;

/// 出题流程
pub struct GenerationFlow<M, E> {
    store: Arc<Store>,
    embedder: Arc<E>,
    llm: Arc<M>,
    validation: ValidationFlow<M>,
    default_top_k: usize,
}

impl<M: ModelClient + 'static, E: EmbeddingClient> GenerationFlow<M, E> {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<E>,
        llm: Arc<M>,
        validation: ValidationFlow<M>,
        default_top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
            validation,
            default_top_k,
        }
    }

    /// 执行一个出题任务，返回新题目的 ID
    pub async fn run_generation(&self, job_id: &str) -> AppResult<Vec<String>> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| BusinessError::JobNotFound {
                job_id: job_id.to_string(),
            })?;

        match self.generate(&job).await {
            Ok(question_ids) => {
                self.store.complete_job(job_id, &question_ids).await?;
                info!(
                    "[任务 {}] ✅ 出题完成: {} 道题",
                    job_id,
                    question_ids.len()
                );
                Ok(question_ids)
            }
            Err(e) => {
                error!("[任务 {}] ❌ 出题失败: {}", job_id, e);
                self.store.fail_job(job_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn generate(&self, job: &GenerationJob) -> AppResult<Vec<String>> {
        self.store
            .set_job_status(&job.id, JobStatus::Processing)
            .await?;

        let spec = &job.specification;
        let top_k = spec.top_k.unwrap_or(self.default_top_k);
        info!(
            "[任务 {}] 🔍 检索素材 {}，学习目标: {}",
            job.id, job.material_id, spec.learning_goal
        );
        let chunks = retrieve_chunks(
            &self.store,
            self.embedder.as_ref(),
            &spec.learning_goal,
            &job.material_id,
            top_k,
        )
        .await?;

        if chunks.is_empty() {
            return Err(BusinessError::NoRelevantChunks {
                material_id: job.material_id.clone(),
            }
            .into());
        }

        info!("[任务 {}] 🤖 基于 {} 个片段出题...", job.id, chunks.len());
        let result = self.llm.generate_questions(spec, &chunks).await?;

        let first_position = self.store.next_question_position(&job.exam_id).await?;
        let mut question_ids = Vec::with_capacity(result.questions.len());
        for (i, generated) in result.questions.iter().enumerate() {
            let row = stored_from_generated(job, first_position + i, generated);
            question_ids.push(self.store.upsert_question(&row).await?);
        }

        self.validation.run_validation(&job.exam_id).await?;

        Ok(question_ids)
    }
}

fn stored_from_generated(
    job: &GenerationJob,
    position: usize,
    generated: &GeneratedQuestion,
) -> StoredQuestion {
    StoredQuestion {
        id: String::new(),
        exam_id: job.exam_id.clone(),
        version: 1,
        position,
        stem: generated.stem.clone(),
        options: generated.options.clone(),
        correct_option: correct_index_of(&generated.options),
        bloom_level: Some(generated.bloom_level),
        learning_goal: job.specification.learning_goal.clone(),
        category: None,
        source: QuestionSource::Generated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::chunk::ExtractedText;
    use crate::models::generation::GenerationSpec;
    use crate::models::question::ExamRecord;
    use crate::workflow::embedding_flow::EmbeddingFlow;
    use crate::workflow::test_support::{sample_question, FakeEmbedder, FakeModel};
    use std::sync::atomic::Ordering;

    struct Fixture {
        store: Arc<Store>,
        embedder: Arc<FakeEmbedder>,
        model: Arc<FakeModel>,
        flow: GenerationFlow<FakeModel, FakeEmbedder>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::in_memory().unwrap());
        let embedder = Arc::new(FakeEmbedder::new(128));
        let model = Arc::new(FakeModel::default());
        let validation = ValidationFlow::new(Arc::clone(&store), Arc::clone(&model), 3);
        let flow = GenerationFlow::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            Arc::clone(&model),
            validation,
            5,
        );
        Fixture {
            store,
            embedder,
            model,
            flow,
        }
    }

    async fn embed_material(fx: &Fixture) {
        EmbeddingFlow::new(Arc::clone(&fx.store), Arc::clone(&fx.embedder), 200, 20)
            .embed_text(
                "mat-1",
                "bio.txt",
                &ExtractedText::Plain(
                    "Fotosynthese vindt plaats in de chloroplast.\n\nCellen delen door mitose."
                        .into(),
                ),
            )
            .await
            .unwrap();
    }

    async fn submit_job(store: &Store, material_id: &str) -> String {
        store
            .upsert_exam(&ExamRecord::new("exam-gen", "Gegenereerd"))
            .await
            .unwrap();
        let job = GenerationJob {
            id: String::new(),
            exam_id: "exam-gen".into(),
            material_id: material_id.into(),
            specification: GenerationSpec {
                count: 3,
                learning_goal: "fotosynthese".into(),
                ..Default::default()
            },
            status: JobStatus::Pending,
            result_question_ids: vec![],
            error_message: None,
            completed_at: None,
        };
        store.upsert_job(&job).await.unwrap()
    }

    #[tokio::test]
    async fn test_generation_inserts_and_validates() {
        let fx = fixture();
        embed_material(&fx).await;
        let job_id = submit_job(&fx.store, "mat-1").await;

        let ids = fx.flow.run_generation(&job_id).await.unwrap();
        assert_eq!(ids.len(), 3);

        let job = fx.store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_question_ids, ids);
        assert!(job.completed_at.is_some());

        let questions = fx.store.questions_for_exam("exam-gen").await.unwrap();
        assert!(questions.iter().all(|q| q.source == QuestionSource::Generated));
        assert!(questions.iter().all(|q| q.correct_option == 1));
        let positions: Vec<usize> = questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);

        assert_eq!(fx.store.assessments_for_exam("exam-gen").await.unwrap().len(), 3);
        assert_eq!(fx.model.validate_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_generated_questions_follow_existing_ones() {
        let fx = fixture();
        embed_material(&fx).await;
        let job_id = submit_job(&fx.store, "mat-1").await;
        fx.store
            .upsert_question(&sample_question("exam-gen", 1, "Bestaande vraag?"))
            .await
            .unwrap();

        fx.flow.run_generation(&job_id).await.unwrap();

        let questions = fx.store.questions_for_exam("exam-gen").await.unwrap();
        let positions: Vec<usize> = questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(questions[0].stem, "Bestaande vraag?");
    }

    #[tokio::test]
    async fn test_no_chunks_fails_job() {
        let fx = fixture();
        let job_id = submit_job(&fx.store, "leeg").await;

        let err = fx.flow.run_generation(&job_id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Business(BusinessError::NoRelevantChunks { .. })
        ));
        assert_eq!(fx.model.generate_calls.load(Ordering::SeqCst), 0);

        let job = fx.store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("leeg"));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let fx = fixture();
        let err = fx.flow.run_generation("bestaat-niet").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Business(BusinessError::JobNotFound { .. })
        ));
    }
}
