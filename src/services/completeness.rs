//! 完整性校验 - 业务能力层
//!
//! 在分析之前检查解析出的题目是否齐全：
//! - 题干非空
//! - 至少 2 个选项
//! - 恰好 1 个正确答案
//! - 选项文本非空
//! - 有学科分类
//! - 题目 ID 不重复（缺省 ID 为从 1 开始的序号）
//!
//! 只有 2 个选项时给出警告。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::question::ParsedQuestion;

/// 单个字段的错误或警告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// 单道题的校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub question_index: usize,
    pub question_id: String,
    pub is_valid: bool,
    pub errors: Vec<FieldIssue>,
    pub warnings: Vec<FieldIssue>,
}

/// 全部题目的校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub total_questions: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub results: Vec<QuestionReport>,
}

impl ValidationReport {
    /// 未通过校验的题目
    pub fn invalid(&self) -> impl Iterator<Item = &QuestionReport> {
        self.results.iter().filter(|r| !r.is_valid)
    }
}

/// 校验一组题目
pub fn validate_questions(questions: &[ParsedQuestion]) -> ValidationReport {
    let ids: Vec<String> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| q.id_or_index(i))
        .collect();

    let mut id_counts: HashMap<&str, usize> = HashMap::new();
    for id in &ids {
        *id_counts.entry(id.as_str()).or_default() += 1;
    }

    let results: Vec<QuestionReport> = questions
        .iter()
        .zip(&ids)
        .enumerate()
        .map(|(i, (q, id))| {
            let duplicated = id_counts.get(id.as_str()).copied().unwrap_or(0) > 1;
            check_question(i, id, q, duplicated)
        })
        .collect();

    let valid_count = results.iter().filter(|r| r.is_valid).count();
    ValidationReport {
        is_valid: valid_count == results.len(),
        total_questions: results.len(),
        valid_count,
        invalid_count: results.len() - valid_count,
        results,
    }
}

fn check_question(index: usize, id: &str, q: &ParsedQuestion, duplicated: bool) -> QuestionReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if q.stem.trim().is_empty() {
        errors.push(FieldIssue::new("stem", "empty_stem", "Vraagstam is leeg"));
    }

    if q.options.len() < 2 {
        errors.push(FieldIssue::new(
            "options",
            "too_few_options",
            format!(
                "Minimaal 2 antwoordopties vereist, maar {} gevonden",
                q.options.len()
            ),
        ));
    }

    match q.options.iter().filter(|o| o.is_correct).count() {
        0 => errors.push(FieldIssue::new(
            "correct_option",
            "no_correct",
            "Geen correct antwoord aangeduid",
        )),
        1 => {}
        n => errors.push(FieldIssue::new(
            "correct_option",
            "multiple_correct",
            format!("{} correcte antwoorden aangeduid, maar precies 1 verwacht", n),
        )),
    }

    for (j, option) in q.options.iter().enumerate() {
        if option.text.trim().is_empty() {
            errors.push(FieldIssue::new(
                "options",
                "empty_option",
                format!("Optie {} heeft een lege tekst", option_label(j)),
            ));
        }
    }

    if q.category.as_deref().map_or(true, |c| c.trim().is_empty()) {
        errors.push(FieldIssue::new(
            "category",
            "empty_category",
            "Onderwerpcategorie ontbreekt",
        ));
    }

    if duplicated {
        errors.push(FieldIssue::new(
            "question_id",
            "duplicate_id",
            format!("Vraag-ID '{}' komt meerdere keren voor", id),
        ));
    }

    if q.options.len() == 2 {
        warnings.push(FieldIssue::new(
            "options",
            "few_options",
            "Slechts 2 antwoordopties; 3 of 4 opties zijn aanbevolen",
        ));
    }

    QuestionReport {
        question_index: index,
        question_id: id.to_string(),
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// A, B, C, ...；超过 Z 后用序号
fn option_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        (index + 1).to_string()
    }
}
