//! 文本信号检测器
//!
//! 三个无状态、大小写不敏感的扫描器：
//! - `TermFinder::find_all` - 绝对化用语（按词表声明顺序返回命中的词）
//! - `TermFinder::contains_any` - 否定词
//! - `TermFinder::is_emphasized` - 否定词是否被强调（全大写或 `**加粗**`）
//!
//! 词表为产品目标语言（荷兰语）。

use regex::{Regex, RegexBuilder};

/// 绝对化用语（顺序即输出顺序）
pub const ABSOLUTE_TERMS: &[&str] = &[
    "altijd",
    "nooit",
    "alle",
    "geen",
    "elke",
    "iedere",
    "uitsluitend",
    "alleen",
    "volledig",
    "absoluut",
    "zonder uitzondering",
];

/// 否定标记
pub const NEGATION_TERMS: &[&str] = &["niet", "geen", "behalve", "uitgezonderd"];

/// 单个词条的预编译匹配器
#[derive(Debug, Clone)]
struct TermPattern {
    term: &'static str,
    /// `\bterm\b`，大小写不敏感
    word: Regex,
    /// `\bTERM\b`，大小写敏感
    upper: Regex,
    /// `**term**`，大小写不敏感
    bold: Regex,
}

impl TermPattern {
    fn compile(term: &'static str) -> Self {
        let escaped = regex::escape(term);
        let word = RegexBuilder::new(&format!(r"\b{}\b", escaped))
            .case_insensitive(true)
            .build();
        let upper = Regex::new(&format!(r"\b{}\b", regex::escape(&term.to_uppercase())));
        let bold = RegexBuilder::new(&format!(r"\*\*{}\*\*", escaped))
            .case_insensitive(true)
            .build();

        // 所有模式都来自 regex::escape 的输出，不可能编译失败
        match (word, upper, bold) {
            (Ok(word), Ok(upper), Ok(bold)) => Self {
                term,
                word,
                upper,
                bold,
            },
            _ => unreachable!("escaped literal pattern failed to compile: {term}"),
        }
    }
}

/// 基于固定词表的词条查找器
///
/// 构造时一次性编译所有正则，之后只读，可在多线程间共享。
#[derive(Debug, Clone)]
pub struct TermFinder {
    patterns: Vec<TermPattern>,
}

impl TermFinder {
    /// 用给定词表创建查找器
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            patterns: vocabulary.iter().copied().map(TermPattern::compile).collect(),
        }
    }

    /// 绝对化用语查找器
    pub fn absolute_terms() -> Self {
        Self::new(ABSOLUTE_TERMS)
    }

    /// 否定词查找器
    pub fn negations() -> Self {
        Self::new(NEGATION_TERMS)
    }

    /// 返回文本中出现的所有词条，保持词表顺序
    ///
    /// 匹配以整词为单位：`alleen` 不会命中 `alle`，短语内部空格按字面匹配。
    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|p| p.word.is_match(text))
            .map(|p| p.term.to_string())
            .collect()
    }

    /// 是否有任一词条作为整词出现
    pub fn contains_any(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.word.is_match(text))
    }

    /// 原始大小写文本中，是否有词条以全大写形式或 `**加粗**` 形式出现
    ///
    /// 约定只在 `contains_any` 为真时调用，但单独调用也是安全的。
    pub fn is_emphasized(&self, text: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.upper.is_match(text) || p.bold.is_match(text))
    }

    /// 词表长度
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_all_respects_word_boundaries() {
        let finder = TermFinder::absolute_terms();

        // "alleen" 命中，但不能同时命中 "alle"
        assert_eq!(finder.find_all("Dit geldt alleen voor zoogdieren"), vec!["alleen"]);
        // "allemaal" 不是 "alle"
        assert!(finder.find_all("Ze gingen allemaal naar huis").is_empty());
    }

    #[test]
    fn test_find_all_keeps_vocabulary_order() {
        let finder = TermFinder::absolute_terms();
        let found = finder.find_all("Nooit, maar dan ook NOOIT, geldt dit altijd");
        assert_eq!(found, vec!["altijd", "nooit"]);
    }

    #[test]
    fn test_find_all_matches_phrases_literally() {
        let finder = TermFinder::absolute_terms();
        assert_eq!(
            finder.find_all("Dit geldt zonder uitzondering"),
            vec!["zonder uitzondering"]
        );
        // 内部两个空格不算匹配
        assert!(finder.find_all("zonder  uitzondering").is_empty());
    }

    #[test]
    fn test_contains_any_is_case_insensitive() {
        let finder = TermFinder::negations();
        assert!(finder.contains_any("Welke uitspraak is NIET juist?"));
        assert!(finder.contains_any("Welke uitspraak is niet juist?"));
        assert!(!finder.contains_any("Welke uitspraak is juist?"));
        assert!(!finder.contains_any("Dat is nietig"));
    }

    #[test]
    fn test_is_emphasized_uppercase_and_bold() {
        let finder = TermFinder::negations();
        assert!(finder.is_emphasized("Welke uitspraak is NIET juist?"));
        assert!(finder.is_emphasized("Welke uitspraak is **niet** juist?"));
        assert!(finder.is_emphasized("Welke uitspraak is **NieT** juist?"));
        assert!(!finder.is_emphasized("Welke uitspraak is niet juist?"));
        assert!(!finder.is_emphasized("Welke uitspraak is Niet juist?"));
    }

    #[test]
    fn test_is_emphasized_without_negation_does_not_panic() {
        let finder = TermFinder::negations();
        assert!(!finder.is_emphasized(""));
        assert!(!finder.is_emphasized("**vet** en HOOFDLETTERS"));
    }

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(TermFinder::absolute_terms().len(), ABSOLUTE_TERMS.len());
        assert!(!TermFinder::negations().is_empty());
    }
}
