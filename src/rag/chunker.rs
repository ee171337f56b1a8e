//! 文本切分
//!
//! 把长文本切成带重叠的片段，尽量在段落、换行或空格处断开。
//! 所有长度和偏移都按字符计。
//!
//! 每个窗口从 `start` 出发，提议终点 `start + size`；若未到文本末尾，
//! 依次向后回找空行、换行、空格，只接受落在窗口中点之后的断点，
//! 都找不到就在 `start + size` 处硬切。下一个窗口从
//! `max(start + 1, end - overlap)` 开始，保证一定前进。

use std::sync::Arc;

use tracing::debug;

use crate::models::chunk::{Chunk, Metadata, PageText};

/// 默认片段长度（约 500 token）
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// 默认重叠长度（约 50 token）
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// 断点优先级：空行 > 换行 > 空格
const BREAK_PATTERNS: &[&[char]] = &[&['\n', '\n'], &['\n'], &[' ']];

/// 切分单段文本
///
/// - 去掉首尾空白后为空：不产生片段
/// - 长度不超过 `size`：整段作为唯一片段
/// - 否则按窗口滑动切分，位置从 0 连续编号
///
/// 所有片段共享同一份 `metadata`。`size` 为 0 时按 1 处理。
pub fn chunk_text(text: &str, metadata: Arc<Metadata>, size: usize, overlap: usize) -> Vec<Chunk> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let size = size.max(1);
    let chars: Vec<char> = trimmed.chars().collect();
    let len = chars.len();

    if len <= size {
        return vec![Chunk {
            text: trimmed.to_string(),
            position: 0,
            page: None,
            metadata,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = start + size;

        if end < len {
            if let Some(break_end) = find_break(&chars, start, end, size) {
                end = break_end;
            }
        }
        let piece: String = chars[start..end.min(len)].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(Chunk {
                text: piece.to_string(),
                position: chunks.len(),
                page: None,
                metadata: Arc::clone(&metadata),
            });
        }

        // 用未截断的 end 推进，尾部窗口照常产出
        start = end.saturating_sub(overlap).max(start + 1);
    }

    debug!(
        "切分完成: {} 字符 → {} 个片段 (size={}, overlap={})",
        len,
        chunks.len(),
        size,
        overlap
    );

    chunks
}

/// 在 `[start, end)` 内从后往前找断点，返回断点之后的位置
///
/// 断点必须严格位于窗口中点 `start + size / 2` 之后。
fn find_break(chars: &[char], start: usize, end: usize, size: usize) -> Option<usize> {
    let midpoint = start + size / 2;

    BREAK_PATTERNS.iter().find_map(|pattern| {
        rfind(chars, pattern, start, end)
            .filter(|&at| at > midpoint)
            .map(|at| at + pattern.len())
    })
}

/// 完全落在 `[start, end)` 内的最后一次出现位置
fn rfind(chars: &[char], pattern: &[char], start: usize, end: usize) -> Option<usize> {
    if end < start + pattern.len() {
        return None;
    }
    (start..=end - pattern.len())
        .rev()
        .find(|&i| chars[i..i + pattern.len()] == *pattern)
}

/// 按页切分
///
/// 每页独立切分，片段不跨页；位置在整个文档内连续重编号，页码保留。
pub fn chunk_pages(
    pages: &[PageText],
    metadata: Arc<Metadata>,
    size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let mut all_chunks = Vec::new();

    for page in pages {
        for mut chunk in chunk_text(&page.text, Arc::clone(&metadata), size, overlap) {
            chunk.page = Some(page.page_number);
            chunk.position = all_chunks.len();
            all_chunks.push(chunk);
        }
    }

    all_chunks
}
