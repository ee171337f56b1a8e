//! 质量评估记录
//!
//! - `DeterministicResult` - 规则分析结果，`flags` 永远由其余字段推导
//! - `ValidationResult` - 模型评审结果
//! - `Assessment` - 两者合并后的持久化记录，键为 (question_id, question_version)

use serde::{Deserialize, Serialize};

use crate::analysis::Thresholds;
use crate::models::question::BloomLevel;

/// 质量问题标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityFlag {
    /// 正确答案明显比干扰项长
    #[serde(rename = "langste-antwoord-bias")]
    LongestAnswerBias,
    /// 选项长度差异大
    #[serde(rename = "lage-homogeniteit-opties")]
    LowHomogeneity,
    #[serde(rename = "absolute-termen-in-correct-antwoord")]
    AbsoluteTermsInCorrect,
    #[serde(rename = "absolute-termen-in-afleiders")]
    AbsoluteTermsInDistractors,
    /// 题干有否定但未加强调
    #[serde(rename = "ontkenning-zonder-nadruk")]
    UnemphasizedNegation,
}

impl QualityFlag {
    pub fn label(&self) -> &'static str {
        match self {
            QualityFlag::LongestAnswerBias => "langste-antwoord-bias",
            QualityFlag::LowHomogeneity => "lage-homogeniteit-opties",
            QualityFlag::AbsoluteTermsInCorrect => "absolute-termen-in-correct-antwoord",
            QualityFlag::AbsoluteTermsInDistractors => "absolute-termen-in-afleiders",
            QualityFlag::UnemphasizedNegation => "ontkenning-zonder-nadruk",
        }
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 规则分析结果
///
/// 构造后不可变。`flags` 只能通过 `new` 推导得到；反序列化时同样重新推导，
/// 存储中的 `flags` 字段仅供外部读取，不参与还原。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredDeterministic")]
pub struct DeterministicResult {
    #[serde(rename = "tech_kwant_longest_bias")]
    longest_bias: bool,
    #[serde(rename = "tech_kwant_homogeneity_score")]
    homogeneity_score: f64,
    #[serde(rename = "tech_kwant_absolute_terms_correct")]
    absolute_terms_correct: Vec<String>,
    #[serde(rename = "tech_kwant_absolute_terms_distractors")]
    absolute_terms_distractors: Vec<String>,
    #[serde(rename = "tech_kwant_negation_detected")]
    negation_detected: bool,
    #[serde(rename = "tech_kwant_negation_emphasized")]
    negation_emphasized: bool,
    #[serde(rename = "tech_kwant_flags")]
    flags: Vec<QualityFlag>,
}

impl DeterministicResult {
    /// 由五个原始信号构造，`flags` 按给定阈值推导
    pub fn new(
        longest_bias: bool,
        homogeneity_score: f64,
        absolute_terms_correct: Vec<String>,
        absolute_terms_distractors: Vec<String>,
        negation_detected: bool,
        negation_emphasized: bool,
        thresholds: &Thresholds,
    ) -> Self {
        let mut result = Self {
            longest_bias,
            homogeneity_score,
            absolute_terms_correct,
            absolute_terms_distractors,
            negation_detected,
            // 未检测到否定时强调无意义
            negation_emphasized: negation_detected && negation_emphasized,
            flags: Vec::new(),
        };
        result.flags = result.derive_flags(thresholds);
        result
    }

    /// 按固定顺序推导问题标签
    pub fn derive_flags(&self, thresholds: &Thresholds) -> Vec<QualityFlag> {
        let mut flags = Vec::new();
        if self.longest_bias {
            flags.push(QualityFlag::LongestAnswerBias);
        }
        if self.homogeneity_score < thresholds.low_homogeneity {
            flags.push(QualityFlag::LowHomogeneity);
        }
        if !self.absolute_terms_correct.is_empty() {
            flags.push(QualityFlag::AbsoluteTermsInCorrect);
        }
        if !self.absolute_terms_distractors.is_empty() {
            flags.push(QualityFlag::AbsoluteTermsInDistractors);
        }
        if self.negation_detected && !self.negation_emphasized {
            flags.push(QualityFlag::UnemphasizedNegation);
        }
        flags
    }

    pub fn longest_bias(&self) -> bool {
        self.longest_bias
    }

    pub fn homogeneity_score(&self) -> f64 {
        self.homogeneity_score
    }

    pub fn absolute_terms_correct(&self) -> &[String] {
        &self.absolute_terms_correct
    }

    pub fn absolute_terms_distractors(&self) -> &[String] {
        &self.absolute_terms_distractors
    }

    pub fn negation_detected(&self) -> bool {
        self.negation_detected
    }

    pub fn negation_emphasized(&self) -> bool {
        self.negation_emphasized
    }

    pub fn flags(&self) -> &[QualityFlag] {
        &self.flags
    }

    /// 是否存在任一问题标签
    pub fn has_flags(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// 反序列化中间形态，丢弃存储的 flags 后重新推导
#[derive(Deserialize)]
struct StoredDeterministic {
    tech_kwant_longest_bias: bool,
    tech_kwant_homogeneity_score: f64,
    #[serde(default)]
    tech_kwant_absolute_terms_correct: Vec<String>,
    #[serde(default)]
    tech_kwant_absolute_terms_distractors: Vec<String>,
    tech_kwant_negation_detected: bool,
    tech_kwant_negation_emphasized: bool,
}

impl From<StoredDeterministic> for DeterministicResult {
    fn from(stored: StoredDeterministic) -> Self {
        DeterministicResult::new(
            stored.tech_kwant_longest_bias,
            stored.tech_kwant_homogeneity_score,
            stored.tech_kwant_absolute_terms_correct,
            stored.tech_kwant_absolute_terms_distractors,
            stored.tech_kwant_negation_detected,
            stored.tech_kwant_negation_emphasized,
            &Thresholds::default(),
        )
    }
}

/// 区分度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discrimination {
    Hoog,
    Gemiddeld,
    Laag,
    Geen,
}

/// 歧义程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ambiguity {
    Geen,
    Licht,
    Hoog,
}

/// 改进建议所属维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Betrouwbaarheid,
    Technisch,
    Validiteit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSuggestion {
    pub dimensie: Dimension,
    pub suggestie: String,
}

/// 模型评审结果（可靠性 / 技术质量 / 效度）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub bet_discriminatie: Discrimination,
    pub bet_ambiguiteit: Ambiguity,
    pub bet_score: u8,
    pub bet_toelichting: String,

    pub tech_kwal_stam_score: u8,
    pub tech_kwal_afleiders_score: u8,
    pub tech_kwal_score: u8,
    #[serde(default)]
    pub tech_problemen: Vec<String>,
    pub tech_toelichting: String,

    pub val_cognitief_niveau: BloomLevel,
    pub val_score: u8,
    pub val_toelichting: String,

    #[serde(default)]
    pub improvement_suggestions: Vec<ImprovementSuggestion>,
}

impl ValidationResult {
    /// 校验所有分数在 1..=5 范围内，返回第一个越界的字段
    pub fn check(&self) -> Result<(), (&'static str, u8)> {
        let scores = [
            ("bet_score", self.bet_score),
            ("tech_kwal_stam_score", self.tech_kwal_stam_score),
            ("tech_kwal_afleiders_score", self.tech_kwal_afleiders_score),
            ("tech_kwal_score", self.tech_kwal_score),
            ("val_score", self.val_score),
        ];
        match scores.iter().find(|(_, s)| !(1..=5).contains(s)) {
            Some(&(field, score)) => Err((field, score)),
            None => Ok(()),
        }
    }
}

/// 持久化的评估记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub question_id: String,
    pub question_version: u32,
    pub assessed_at: String,
    #[serde(flatten)]
    pub deterministic: DeterministicResult,
    #[serde(flatten)]
    pub validation: ValidationResult,
}

impl Assessment {
    /// 合并两阶段结果，时间戳取当前 UTC
    pub fn merge(
        question_id: impl Into<String>,
        question_version: u32,
        deterministic: DeterministicResult,
        validation: ValidationResult,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_version,
            assessed_at: chrono::Utc::now().to_rfc3339(),
            deterministic,
            validation,
        }
    }
}
