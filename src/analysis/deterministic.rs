//! 规则分析器
//!
//! 对单道题计算表层质量信号：
//! 1. 最长答案偏差
//! 2. 选项长度同质性
//! 3. 正确答案中的绝对化用语
//! 4. 干扰项中的绝对化用语（去重，按首次出现顺序）
//! 5. 题干否定
//! 6. 否定是否被强调
//!
//! 长度一律按字符（Unicode 标量）计数。

use std::sync::OnceLock;

use tracing::debug;

use crate::analysis::detectors::TermFinder;
use crate::analysis::Thresholds;
use crate::models::assessment::DeterministicResult;
use crate::models::question::Question;

/// 规则分析器
///
/// 持有预编译的词表匹配器，只读，可跨线程共享。
#[derive(Debug, Clone)]
pub struct Analyzer {
    absolute_terms: TermFinder,
    negations: TermFinder,
    thresholds: Thresholds,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl Analyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            absolute_terms: TermFinder::absolute_terms(),
            negations: TermFinder::negations(),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// 分析一道题
    ///
    /// 对任何输入都返回结果，不会失败：空选项、越界的正确索引等
    /// 退化情况都有明确的兜底值。
    pub fn analyze(&self, question: &Question) -> DeterministicResult {
        let longest_bias = self.check_longest_bias(question);
        let homogeneity = check_homogeneity(question);
        let abs_correct = self.absolute_terms.find_all(question.correct_text());
        let abs_distractors = self.absolute_terms_in_distractors(question);
        let negation_detected = self.negations.contains_any(&question.stem);
        let negation_emphasized =
            negation_detected && self.negations.is_emphasized(&question.stem);

        debug!(
            "规则分析完成: bias={}, homogeneity={:.2}, negation={}/{}",
            longest_bias, homogeneity, negation_detected, negation_emphasized
        );

        DeterministicResult::new(
            longest_bias,
            homogeneity,
            abs_correct,
            abs_distractors,
            negation_detected,
            negation_emphasized,
            &self.thresholds,
        )
    }

    /// 正确答案是否比干扰项平均长度长出 `bias_ratio` 倍以上
    fn check_longest_bias(&self, question: &Question) -> bool {
        let distractor_lengths: Vec<usize> = question.distractors().map(char_len).collect();
        if distractor_lengths.is_empty() {
            return false;
        }

        let correct_len = char_len(question.correct_text());
        let mean = mean(&distractor_lengths);
        if mean == 0.0 {
            return correct_len > 0;
        }
        correct_len as f64 > self.thresholds.bias_ratio * mean
    }

    fn absolute_terms_in_distractors(&self, question: &Question) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for distractor in question.distractors() {
            for term in self.absolute_terms.find_all(distractor) {
                if !found.contains(&term) {
                    found.push(term);
                }
            }
        }
        found
    }
}

/// 选项长度同质性：`max(0, 1 - 变异系数)`，保留两位小数
///
/// 少于两个选项或平均长度为 0 时定义为 1.0。
fn check_homogeneity(question: &Question) -> f64 {
    let lengths: Vec<usize> = question.options.iter().map(|o| char_len(o)).collect();
    if lengths.len() < 2 {
        return 1.0;
    }

    let mean = mean(&lengths);
    if mean == 0.0 {
        return 1.0;
    }

    // 总体标准差
    let variance = lengths
        .iter()
        .map(|&l| (l as f64 - mean).powi(2))
        .sum::<f64>()
        / lengths.len() as f64;
    let cv = variance.sqrt() / mean;

    round2((1.0 - cv).max(0.0))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn mean(values: &[usize]) -> f64 {
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// 使用默认阈值分析一道题
///
/// 共享的分析器在首次调用时初始化。
pub fn analyze(question: &Question) -> DeterministicResult {
    static DEFAULT_ANALYZER: OnceLock<Analyzer> = OnceLock::new();
    DEFAULT_ANALYZER.get_or_init(Analyzer::default).analyze(question)
}
