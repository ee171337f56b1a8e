use serde::{Deserialize, Serialize};

use crate::models::generation::JobStatus;

/// 分析器输入：一道单选题
///
/// `options` 的顺序即展示顺序。调用方负责保证 `correct_index` 有效，
/// 分析器本身不再校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub stem: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn new(stem: impl Into<String>, options: Vec<String>, correct_index: usize) -> Self {
        Self {
            stem: stem.into(),
            options,
            correct_index,
        }
    }

    /// 由带标记的选项构造，正确答案取第一个标记为正确的选项，没有则为 0
    pub fn from_options(stem: impl Into<String>, options: &[QuestionOption]) -> Self {
        Self {
            stem: stem.into(),
            options: options.iter().map(|o| o.text.clone()).collect(),
            correct_index: correct_index_of(options),
        }
    }

    /// 正确选项文本；索引越界时视为空串
    pub fn correct_text(&self) -> &str {
        self.options
            .get(self.correct_index)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// 所有干扰项（除正确选项外的选项），保持原顺序
    pub fn distractors(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != self.correct_index)
            .map(|(_, o)| o.as_str())
    }
}

/// 第一个标记为正确的选项下标，没有则为 0
pub fn correct_index_of(options: &[QuestionOption]) -> usize {
    options.iter().position(|o| o.is_correct).unwrap_or(0)
}

/// 带位置和正确标记的选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    pub position: usize,
    pub is_correct: bool,
}

/// Bloom 认知层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    Onthouden,
    Begrijpen,
    Toepassen,
    Analyseren,
}

impl BloomLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloomLevel::Onthouden => "onthouden",
            BloomLevel::Begrijpen => "begrijpen",
            BloomLevel::Toepassen => "toepassen",
            BloomLevel::Analyseren => "analyseren",
        }
    }
}

impl Default for BloomLevel {
    fn default() -> Self {
        BloomLevel::Begrijpen
    }
}

impl std::fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 所有文件解析器的统一产出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub stem: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_level: Option<BloomLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_goal: Option<String>,
}

impl ParsedQuestion {
    /// 题目 ID，缺省时使用从 1 开始的序号
    pub fn id_or_index(&self, index: usize) -> String {
        self.question_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| (index + 1).to_string())
    }
}

/// 题目来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionSource {
    Imported,
    Generated,
}

impl QuestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionSource::Imported => "imported",
            QuestionSource::Generated => "generated",
        }
    }
}

/// `questions` 表中的一行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredQuestion {
    #[serde(default)]
    pub id: String,
    pub exam_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub position: usize,
    pub stem: String,
    pub options: Vec<QuestionOption>,
    pub correct_option: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_level: Option<BloomLevel>,
    #[serde(default)]
    pub learning_goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub source: QuestionSource,
}

fn default_version() -> u32 {
    1
}

impl StoredQuestion {
    /// 从解析结果构造待入库的题目（id 由存储层分配）
    pub fn from_parsed(exam_id: &str, position: usize, parsed: &ParsedQuestion) -> Self {
        Self {
            id: String::new(),
            exam_id: exam_id.to_string(),
            version: default_version(),
            position,
            stem: parsed.stem.clone(),
            options: parsed.options.clone(),
            correct_option: correct_index_of(&parsed.options),
            bloom_level: parsed.bloom_level,
            learning_goal: parsed.learning_goal.clone().unwrap_or_default(),
            category: parsed.category.clone(),
            source: QuestionSource::Imported,
        }
    }

    /// 转换为分析器输入
    pub fn to_question(&self) -> Question {
        Question::from_options(self.stem.clone(), &self.options)
    }
}

/// 一份试卷文件（TOML）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamFile {
    pub exam_id: String,
    pub name: String,
    #[serde(default)]
    pub questions: Vec<ParsedQuestion>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

impl ExamFile {
    pub fn with_file_path(mut self, file_path: String) -> Self {
        self.file_path = Some(file_path);
        self
    }
}

/// `exams` 表中的一行，带分析进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRecord {
    pub id: String,
    pub name: String,
    #[serde(default = "default_analysis_status")]
    pub analysis_status: JobStatus,
    #[serde(default)]
    pub question_count: usize,
    #[serde(default)]
    pub questions_analyzed: usize,
}

fn default_analysis_status() -> JobStatus {
    JobStatus::Pending
}

impl ExamRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            analysis_status: JobStatus::Pending,
            question_count: 0,
            questions_analyzed: 0,
        }
    }
}
