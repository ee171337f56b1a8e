//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源管理和命令分发。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：初始化日志文件、打开存储、创建向量器和模型客户端
//! 2. **命令分发**：validate / embed / generate
//! 3. **批量加载**：扫描并加载所有试卷文件
//! 4. **全局统计**：汇总所有试卷的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单道题的细节
//! - **资源所有者**：唯一创建 Store、Embedder 和模型客户端的模块
//! - **向下委托**：委托 exam_processor 处理单份试卷，委托 workflow 处理素材和出题任务

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::infrastructure::{Embedder, EmbeddingClient, Store};
use crate::models::question::{ExamFile, ExamRecord};
use crate::models::{load_all_exam_files, load_generation_job};
use crate::orchestrator::exam_processor::ExamProcessor;
use crate::services::{LlmService, ModelClient, ReportWriter};
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::workflow::{EmbeddingFlow, GenerationFlow, ValidationFlow};

/// 子命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 评审 `exam_folder` 下的所有试卷
    Validate,
    /// 把素材文件切分、向量化后入库
    Embed { file: PathBuf, material_id: String },
    /// 执行一个出题任务文件
    Generate { job_file: PathBuf },
}

impl Command {
    /// 解析命令行参数（不含程序名），缺省为 validate
    pub fn parse(args: &[String]) -> AppResult<Self> {
        let missing = |name: &str| ConfigError::MissingArgument {
            name: name.to_string(),
        };

        match args.first().map(String::as_str) {
            None | Some("validate") => Ok(Command::Validate),
            Some("embed") => {
                let file = args.get(1).ok_or_else(|| missing("file"))?;
                let material_id = args.get(2).ok_or_else(|| missing("material_id"))?;
                Ok(Command::Embed {
                    file: PathBuf::from(file),
                    material_id: material_id.clone(),
                })
            }
            Some("generate") => {
                let job_file = args.get(1).ok_or_else(|| missing("job_file"))?;
                Ok(Command::Generate {
                    job_file: PathBuf::from(job_file),
                })
            }
            Some(other) => Err(ConfigError::UnknownCommand {
                command: other.to_string(),
            }
            .into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Validate => "validate",
            Command::Embed { .. } => "embed",
            Command::Generate { .. } => "generate",
        }
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 应用主结构
pub struct App<M = LlmService, E = Embedder> {
    config: Config,
    store: Arc<Store>,
    embedder: Arc<E>,
    llm: Arc<M>,
}

impl App<LlmService, Embedder> {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件: {}", config.output_log_file))?;

        let store = Store::open(&config.database_path)
            .with_context(|| format!("无法打开数据库: {}", config.database_path))?;

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，模型调用可能失败");
        }
        let llm = LlmService::new(&config);
        // 向量器在启动时显式创建，之后只共享引用
        let embedder = Embedder::new(&config);

        Ok(Self::with_parts(
            config,
            Arc::new(store),
            Arc::new(llm),
            Arc::new(embedder),
        ))
    }
}

impl<M: ModelClient + 'static, E: EmbeddingClient> App<M, E> {
    /// 用已有的存储、模型客户端和向量器组装应用
    pub fn with_parts(config: Config, store: Arc<Store>, llm: Arc<M>, embedder: Arc<E>) -> Self {
        Self {
            config,
            store,
            embedder,
            llm,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// 运行一个子命令并输出统计
    pub async fn run(&self, command: &Command) -> Result<RunStats> {
        log_startup(command.name(), self.config.max_concurrency);

        let stats = match command {
            Command::Validate => self.run_validate().await?,
            Command::Embed { file, material_id } => self.run_embed(file, material_id).await?,
            Command::Generate { job_file } => self.run_generate(job_file).await?,
        };

        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );
        Ok(stats)
    }

    fn validation_flow(&self) -> ValidationFlow<M> {
        ValidationFlow::new(
            Arc::clone(&self.store),
            Arc::clone(&self.llm),
            self.config.max_concurrency,
        )
    }

    /// 评审所有试卷
    async fn run_validate(&self) -> Result<RunStats> {
        info!("\n📁 正在扫描待处理的试卷...");
        let exams = load_all_exam_files(&self.config.exam_folder).await?;

        if exams.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(RunStats::default());
        }
        info!("✓ 找到 {} 份待处理的试卷", exams.len());

        self.process_all_exams(&exams).await
    }

    /// 逐份处理试卷；单份失败不影响其余试卷
    async fn process_all_exams(&self, exams: &[ExamFile]) -> Result<RunStats> {
        let validation = self.validation_flow();
        let writer = ReportWriter::new(&self.config.output_log_file);
        let processor = ExamProcessor {
            store: &self.store,
            llm: self.llm.as_ref(),
            validation: &validation,
            writer: &writer,
        };

        let mut stats = RunStats {
            total: exams.len(),
            ..Default::default()
        };

        for (idx, exam) in exams.iter().enumerate() {
            let exam_index = idx + 1;
            match processor.process_exam(exam, exam_index, exams.len()).await {
                Ok(_) => stats.success += 1,
                Err(e) => {
                    error!("[试卷 {}] ❌ 处理过程中发生错误: {:#}", exam_index, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// 素材入库
    async fn run_embed(&self, file: &Path, material_id: &str) -> Result<RunStats> {
        let flow = EmbeddingFlow::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.config.chunk_size,
            self.config.chunk_overlap,
        );

        let chunk_count = flow
            .run_embedding(material_id, file)
            .await
            .with_context(|| format!("素材入库失败: {}", file.display()))?;
        info!("✓ 素材 {} 共写入 {} 个片段", material_id, chunk_count);

        Ok(RunStats {
            success: 1,
            failed: 0,
            total: 1,
        })
    }

    /// 执行出题任务文件
    async fn run_generate(&self, job_file: &Path) -> Result<RunStats> {
        let job = load_generation_job(job_file).await?;

        // 任务指向的试卷不存在时先建一份空试卷
        if self
            .store
            .create_exam_if_missing(&ExamRecord::new(&job.exam_id, &job.exam_id))
            .await?
        {
            info!("📄 新建试卷 {}", job.exam_id);
        }

        let job_id = self.store.upsert_job(&job).await?;

        let flow = GenerationFlow::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            Arc::clone(&self.llm),
            self.validation_flow(),
            self.config.retrieval_top_k,
        );

        match flow.run_generation(&job_id).await {
            Ok(question_ids) => {
                info!("✓ 任务 {} 生成 {} 道题", job_id, question_ids.len());
                Ok(RunStats {
                    success: 1,
                    failed: 0,
                    total: 1,
                })
            }
            Err(e) => {
                error!("❌ 任务 {} 失败: {}", job_id, e);
                Ok(RunStats {
                    success: 0,
                    failed: 1,
                    total: 1,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Validate);
        assert_eq!(
            Command::parse(&args(&["embed", "boek.txt", "mat-1"])).unwrap(),
            Command::Embed {
                file: PathBuf::from("boek.txt"),
                material_id: "mat-1".into()
            }
        );
        assert_eq!(
            Command::parse(&args(&["generate", "job.toml"])).unwrap().name(),
            "generate"
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Command::parse(&args(&["embed", "boek.txt"])),
            Err(AppError::Config(ConfigError::MissingArgument { .. }))
        ));
        assert!(matches!(
            Command::parse(&args(&["upload"])),
            Err(AppError::Config(ConfigError::UnknownCommand { .. }))
        ));
    }
}
