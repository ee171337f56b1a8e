//! 素材加载
//!
//! 支持纯文本（`.txt` / `.md`）。文本中出现换页符（`\x0c`）时按页拆分，
//! 页码从 1 开始，空白页跳过。

use std::path::Path;

use tokio::fs;

use crate::error::{AppError, AppResult, FileError};
use crate::models::chunk::{ExtractedText, PageText};

const PAGE_BREAK: char = '\x0c';

/// 读取素材文件并提取文本
pub async fn load_material(path: &Path) -> AppResult<ExtractedText> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "txt" | "md" => {
            let content = fs::read_to_string(path)
                .await
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            Ok(extract_text(&content))
        }
        _ => Err(FileError::UnsupportedFormat { extension }.into()),
    }
}

/// 按换页符判断是否分页
pub fn extract_text(content: &str) -> ExtractedText {
    if !content.contains(PAGE_BREAK) {
        return ExtractedText::Plain(content.to_string());
    }

    let pages = content
        .split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| PageText::new(i as u32 + 1, text))
        .collect();
    ExtractedText::Paged(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(
            extract_text("Hoofdstuk 1\n\nTekst"),
            ExtractedText::Plain("Hoofdstuk 1\n\nTekst".into())
        );
    }

    #[test]
    fn test_paged_text_keeps_page_numbers() {
        let extracted = extract_text("pagina een\x0c  \x0cpagina drie");
        match extracted {
            ExtractedText::Paged(pages) => {
                assert_eq!(pages.len(), 2);
                assert_eq!(pages[0].page_number, 1);
                assert_eq!(pages[1].page_number, 3);
                assert_eq!(pages[1].text, "pagina drie");
            }
            other => panic!("expected paged text, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let err = tokio_test::block_on(load_material(Path::new("boek.pdf"))).unwrap_err();
        assert!(matches!(err, AppError::File(FileError::UnsupportedFormat { .. })));
    }

    #[tokio::test]
    async fn test_load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bron.txt");
        std::fs::write(&path, "Cellen delen zich.").unwrap();
        let extracted = load_material(&path).await.unwrap();
        assert_eq!(extracted.full_text(), "Cellen delen zich.");
    }
}
