//! 题目处理上下文
//!
//! 封装"我正在处理哪份试卷的第几题"这一信息

use std::fmt::Display;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 试卷ID
    pub exam_id: String,

    /// 题目ID
    pub question_id: String,

    /// 题目在本次批次中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次批次的题目总数
    pub total: usize,
}

impl QuestionCtx {
    pub fn new(exam_id: impl Into<String>, question_id: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            exam_id: exam_id.into(),
            question_id: question_id.into(),
            index,
            total,
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[试卷 {} 题目 {}/{} ID#{}]",
            self.exam_id, self.index, self.total, self.question_id
        )
    }
}
