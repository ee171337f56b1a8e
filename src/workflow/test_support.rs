//! 单元测试用的假模型、假向量器和样例数据

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::analysis::analyze;
use crate::error::{AppResult, LlmError};
use crate::infrastructure::embedder::{normalize, EmbedRole, EmbeddingClient};
use crate::models::assessment::{
    Ambiguity, Assessment, DeterministicResult, Discrimination, ValidationResult,
};
use crate::models::chunk::Chunk;
use crate::models::generation::{
    GeneratedQuestion, GenerationResult, GenerationSpec, RepairPlan, RepairProposal,
};
use crate::models::question::{BloomLevel, ParsedQuestion, QuestionOption, StoredQuestion};
use crate::services::{ModelClient, QuestionPayload, ValidationReport};

/// 不联网的模型：评审总是给出固定分数，出题按规格数量生成
#[derive(Default)]
pub struct FakeModel {
    /// 题干等于该值时评审失败
    pub fail_on_stem: Option<String>,
    pub validate_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
}

pub fn fixed_validation() -> ValidationResult {
    ValidationResult {
        bet_discriminatie: Discrimination::Gemiddeld,
        bet_ambiguiteit: Ambiguity::Geen,
        bet_score: 4,
        bet_toelichting: "Duidelijk".into(),
        tech_kwal_stam_score: 4,
        tech_kwal_afleiders_score: 3,
        tech_kwal_score: 3,
        tech_problemen: vec![],
        tech_toelichting: "Prima".into(),
        val_cognitief_niveau: BloomLevel::Begrijpen,
        val_score: 4,
        val_toelichting: "Sluit aan".into(),
        improvement_suggestions: vec![],
    }
}

impl ModelClient for FakeModel {
    async fn validate_question(
        &self,
        question: &QuestionPayload,
        _deterministic: &DeterministicResult,
    ) -> AppResult<ValidationResult> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_stem.as_deref() == Some(question.stam.as_str()) {
            return Err(LlmError::EmptyContent {
                model: "fake".into(),
            }
            .into());
        }
        Ok(fixed_validation())
    }

    async fn generate_questions(
        &self,
        spec: &GenerationSpec,
        chunks: &[Chunk],
    ) -> AppResult<GenerationResult> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let questions = (0..spec.count)
            .map(|i| GeneratedQuestion {
                stem: format!("Vraag {} over {}", i + 1, spec.learning_goal),
                options: (0..spec.num_options)
                    .map(|j| QuestionOption {
                        text: format!("Optie {}", j + 1),
                        position: j,
                        is_correct: j == 1,
                    })
                    .collect(),
                bloom_level: spec.bloom_level,
                chunk_ids: (0..chunks.len()).map(|c| c.to_string()).collect(),
            })
            .collect();
        Ok(GenerationResult { questions })
    }

    async fn repair_questions(
        &self,
        _questions: &[ParsedQuestion],
        report: &ValidationReport,
    ) -> AppResult<RepairPlan> {
        let proposals = report
            .invalid()
            .map(|r| RepairProposal {
                question_index: r.question_index,
                field: "category".into(),
                current_value: None,
                proposed_value: "Algemeen".into(),
                explanation: "Afgeleid uit de stam".into(),
            })
            .collect();
        Ok(RepairPlan {
            proposals,
            summary: "Categorie aangevuld".into(),
        })
    }
}

/// 不联网的向量器：小写词哈希到固定维度后做 L2 归一化
///
/// 记录每次调用的角色，方便断言素材和请求走了各自的前缀。
pub struct FakeEmbedder {
    pub dimensions: usize,
    pub roles: Mutex<Vec<EmbedRole>>,
}

impl FakeEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            roles: Mutex::new(Vec::new()),
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = token
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                    (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
                });
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        normalize(vector)
    }
}

impl EmbeddingClient for FakeEmbedder {
    async fn embed_texts(&self, texts: &[String], role: EmbedRole) -> AppResult<Vec<Vec<f32>>> {
        self.roles.lock().unwrap().push(role);
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }
}

/// 一道三选项、第一项正确的题
pub fn sample_question(exam_id: &str, position: usize, stem: &str) -> StoredQuestion {
    let parsed = ParsedQuestion {
        stem: stem.to_string(),
        options: ["Mitochondrion", "Ribosoom", "Golgi-apparaat"]
            .iter()
            .enumerate()
            .map(|(i, text)| QuestionOption {
                text: text.to_string(),
                position: i,
                is_correct: i == 0,
            })
            .collect(),
        category: Some("Celbiologie".into()),
        ..Default::default()
    };
    StoredQuestion::from_parsed(exam_id, position, &parsed)
}

/// 固定分数的评估记录
pub fn fixed_assessment(question_id: &str, version: u32) -> Assessment {
    let deterministic = analyze(&sample_question("e", 1, "Vraag").to_question());
    Assessment::merge(question_id, version, deterministic, fixed_validation())
}
