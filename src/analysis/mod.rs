//! 规则分析层
//!
//! 纯函数、同步、无 I/O：相同输入得到逐字段相同的输出。
//! 可以被任意多个调用方并发使用，无需加锁。

pub mod deterministic;
pub mod detectors;

pub use deterministic::{analyze, Analyzer};
pub use detectors::{TermFinder, ABSOLUTE_TERMS, NEGATION_TERMS};

/// 分析阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// 正确答案长度超过干扰项平均长度的倍数即视为偏长
    pub bias_ratio: f64,
    /// 低于该同质性分数即标记为低同质性
    pub low_homogeneity: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bias_ratio: 1.5,
            low_homogeneity: 0.5,
        }
    }
}
