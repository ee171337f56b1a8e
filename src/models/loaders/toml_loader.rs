use crate::models::generation::GenerationJob;
use crate::models::question::ExamFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载一份试卷
pub async fn load_exam_file(toml_file_path: &Path) -> Result<ExamFile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let exam: ExamFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(exam.with_file_path(toml_file_path.to_string_lossy().to_string()))
}

/// 从文件夹中加载所有试卷 TOML 文件，按文件名排序
///
/// 单个文件解析失败只记录警告，不影响其他文件。
pub async fn load_all_exam_files(folder_path: &str) -> Result<Vec<ExamFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut exams = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_exam_file(&path).await {
            Ok(exam) => {
                tracing::info!("成功加载 {} 个题目", exam.questions.len());
                exams.push(exam);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(exams)
}

/// 从 TOML 文件加载出题任务
pub async fn load_generation_job(toml_file_path: &Path) -> Result<GenerationJob> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("无法解析出题任务: {}", toml_file_path.display()))
}
