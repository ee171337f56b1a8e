//! 存储 - 基础设施层
//!
//! 基于 SQLite（rusqlite）的仓储。唯一键与计数都由数据库保证：
//! - `questions`：`UNIQUE(exam_id, position)`，重复导入时原地更新并保留 id
//! - `assessments`：`UNIQUE(question_id, question_version)`，重新评审覆盖旧结果
//! - `exams.questions_analyzed`：用 `SET x = x + 1` 在一条语句内自增
//!
//! 连接放在 `Mutex` 里，所有 SQL 在 `spawn_blocking` 中执行，不阻塞异步运行时。

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{AppResult, StoreError};
use crate::models::assessment::Assessment;
use crate::models::chunk::{MaterialRecord, Metadata, StoredChunk};
use crate::models::generation::{GenerationJob, JobStatus};
use crate::models::question::{ExamRecord, QuestionSource, StoredQuestion};

pub const EXAMS: &str = "exams";
pub const QUESTIONS: &str = "questions";
pub const ASSESSMENTS: &str = "assessments";
pub const MATERIALS: &str = "materials";
pub const CHUNKS: &str = "chunks";
pub const GENERATION_JOBS: &str = "generation_jobs";

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS exams (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        analysis_status TEXT NOT NULL DEFAULT 'pending',
        question_count INTEGER NOT NULL DEFAULT 0,
        questions_analyzed INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS questions (
        id TEXT PRIMARY KEY,
        exam_id TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1,
        position INTEGER NOT NULL,
        stem TEXT NOT NULL,
        options TEXT NOT NULL,
        correct_option INTEGER NOT NULL,
        bloom_level TEXT,
        learning_goal TEXT NOT NULL DEFAULT '',
        category TEXT,
        source TEXT NOT NULL,
        UNIQUE(exam_id, position)
    );

    CREATE TABLE IF NOT EXISTS assessments (
        question_id TEXT NOT NULL,
        question_version INTEGER NOT NULL,
        assessed_at TEXT NOT NULL,
        result TEXT NOT NULL,
        UNIQUE(question_id, question_version)
    );

    CREATE TABLE IF NOT EXISTS materials (
        id TEXT PRIMARY KEY,
        file_path TEXT NOT NULL,
        content_text TEXT NOT NULL,
        chunk_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        material_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        content TEXT NOT NULL,
        page INTEGER,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        UNIQUE(material_id, position)
    );

    CREATE TABLE IF NOT EXISTS generation_jobs (
        id TEXT PRIMARY KEY,
        exam_id TEXT NOT NULL,
        material_id TEXT NOT NULL,
        specification TEXT NOT NULL,
        status TEXT NOT NULL,
        result_question_ids TEXT NOT NULL DEFAULT '[]',
        error_message TEXT,
        completed_at TEXT
    );
";

const QUESTION_COLUMNS: &str = "id, exam_id, version, position, stem, options, correct_option, \
                                bloom_level, learning_goal, category, source";
const JOB_COLUMNS: &str = "id, exam_id, material_id, specification, status, result_question_ids, \
                           error_message, completed_at";

/// 给 rusqlite / serde_json 错误补上表名
trait InTable<T> {
    fn in_table(self, table: &str) -> Result<T, StoreError>;
}

impl<T> InTable<T> for Result<T, rusqlite::Error> {
    fn in_table(self, table: &str) -> Result<T, StoreError> {
        self.map_err(|source| StoreError::Sqlite {
            table: table.to_string(),
            source,
        })
    }
}

impl<T> InTable<T> for Result<T, serde_json::Error> {
    fn in_table(self, table: &str) -> Result<T, StoreError> {
        self.map_err(|source| StoreError::Serde {
            table: table.to_string(),
            source,
        })
    }
}

/// SQLite 仓储
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// 打开（必要时创建）数据库文件
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;
        info!("🗄️ 打开数据库: {}", path.display());
        Self::with_connection(conn)
    }

    /// 不落盘的内存数据库
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA).in_table("schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池中持锁执行
    async fn call<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|source| StoreError::Task { source })?;
        Ok(result?)
    }

    // ========== exams ==========

    /// 写入试卷；已存在时覆盖名称、状态和进度
    pub async fn upsert_exam(&self, exam: &ExamRecord) -> AppResult<()> {
        let exam = exam.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO exams (id, name, analysis_status, question_count, questions_analyzed)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     analysis_status = excluded.analysis_status,
                     question_count = excluded.question_count,
                     questions_analyzed = excluded.questions_analyzed",
                params![
                    exam.id,
                    exam.name,
                    exam.analysis_status.as_str(),
                    exam.question_count as i64,
                    exam.questions_analyzed as i64
                ],
            )
            .in_table(EXAMS)?;
            Ok(())
        })
        .await
    }

    /// 试卷不存在时创建，返回是否新建
    pub async fn create_exam_if_missing(&self, exam: &ExamRecord) -> AppResult<bool> {
        let exam = exam.clone();
        self.call(move |conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO exams (id, name, analysis_status) VALUES (?1, ?2, ?3)",
                    params![exam.id, exam.name, exam.analysis_status.as_str()],
                )
                .in_table(EXAMS)?;
            Ok(inserted > 0)
        })
        .await
    }

    pub async fn get_exam(&self, id: &str) -> AppResult<Option<ExamRecord>> {
        let id = id.to_string();
        let row = self
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, name, analysis_status, question_count, questions_analyzed
                     FROM exams WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .optional()
                .in_table(EXAMS)
            })
            .await?;

        let Some((id, name, status, question_count, questions_analyzed)) = row else {
            return Ok(None);
        };
        Ok(Some(ExamRecord {
            id,
            name,
            analysis_status: parse_enum(status).in_table(EXAMS)?,
            question_count: question_count as usize,
            questions_analyzed: questions_analyzed as usize,
        }))
    }

    pub async fn set_exam_status(&self, id: &str, status: JobStatus) -> AppResult<()> {
        let id = id.to_string();
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE exams SET analysis_status = ?2 WHERE id = ?1",
                    params![id, status.as_str()],
                )
                .in_table(EXAMS)?;
            ensure_changed(changed, EXAMS, id)
        })
        .await
    }

    pub async fn set_exam_progress(
        &self,
        id: &str,
        question_count: usize,
        questions_analyzed: usize,
    ) -> AppResult<()> {
        let id = id.to_string();
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE exams SET question_count = ?2, questions_analyzed = ?3 WHERE id = ?1",
                    params![id, question_count as i64, questions_analyzed as i64],
                )
                .in_table(EXAMS)?;
            ensure_changed(changed, EXAMS, id)
        })
        .await
    }

    /// 评审进度加一，返回新值
    pub async fn increment_questions_analyzed(&self, id: &str) -> AppResult<usize> {
        let id = id.to_string();
        self.call(move |conn| {
            let value = conn
                .query_row(
                    "UPDATE exams SET questions_analyzed = questions_analyzed + 1
                     WHERE id = ?1 RETURNING questions_analyzed",
                    params![id],
                    |row| row.get::<_, i64>(0),
                )
                .optional()
                .in_table(EXAMS)?;
            value.map(|v| v as usize).ok_or(StoreError::NotFound {
                table: EXAMS.to_string(),
                id,
            })
        })
        .await
    }

    // ========== questions ==========

    /// 按 (exam_id, position) 写入题目，返回 id
    ///
    /// 已有题目保留原 id；题干或选项变化时版本号加一。
    pub async fn upsert_question(&self, question: &StoredQuestion) -> AppResult<String> {
        let options = serde_json::to_string(&question.options).in_table(QUESTIONS)?;
        let question = question.clone();
        let id = new_id_if_empty(&question.id);

        self.call(move |conn| {
            conn.query_row(
                "INSERT INTO questions (id, exam_id, version, position, stem, options,
                                        correct_option, bloom_level, learning_goal, category, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(exam_id, position) DO UPDATE SET
                     version = CASE
                         WHEN questions.stem <> excluded.stem OR questions.options <> excluded.options
                         THEN questions.version + 1
                         ELSE questions.version
                     END,
                     stem = excluded.stem,
                     options = excluded.options,
                     correct_option = excluded.correct_option,
                     bloom_level = excluded.bloom_level,
                     learning_goal = excluded.learning_goal,
                     category = excluded.category,
                     source = excluded.source
                 RETURNING id",
                params![
                    id,
                    question.exam_id,
                    question.version,
                    question.position as i64,
                    question.stem,
                    options,
                    question.correct_option as i64,
                    question.bloom_level.map(|b| b.as_str()),
                    question.learning_goal,
                    question.category,
                    question.source.as_str()
                ],
                |row| row.get::<_, String>(0),
            )
            .in_table(QUESTIONS)
        })
        .await
    }

    pub async fn get_question(&self, id: &str) -> AppResult<Option<StoredQuestion>> {
        let id = id.to_string();
        let row = self
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS),
                    params![id],
                    QuestionRow::read,
                )
                .optional()
                .in_table(QUESTIONS)
            })
            .await?;
        Ok(row.map(QuestionRow::into_question).transpose()?)
    }

    /// 试卷的所有题目，按位置排序
    pub async fn questions_for_exam(&self, exam_id: &str) -> AppResult<Vec<StoredQuestion>> {
        let exam_id = exam_id.to_string();
        let rows = self
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM questions WHERE exam_id = ?1 ORDER BY position",
                        QUESTION_COLUMNS
                    ))
                    .in_table(QUESTIONS)?;
                let rows = stmt
                    .query_map(params![exam_id], QuestionRow::read)
                    .in_table(QUESTIONS)?
                    .collect::<Result<Vec<_>, _>>()
                    .in_table(QUESTIONS)?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(QuestionRow::into_question)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// 试卷中下一个可用的位置（从 1 开始）
    pub async fn next_question_position(&self, exam_id: &str) -> AppResult<usize> {
        let exam_id = exam_id.to_string();
        self.call(move |conn| {
            let max = conn
                .query_row(
                    "SELECT MAX(position) FROM questions WHERE exam_id = ?1",
                    params![exam_id],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .in_table(QUESTIONS)?;
            Ok(max.map_or(1, |m| m as usize + 1))
        })
        .await
    }

    // ========== assessments ==========

    /// 按 (question_id, question_version) 写入评估，已存在时覆盖
    pub async fn upsert_assessment(&self, assessment: &Assessment) -> AppResult<()> {
        let result = serde_json::to_string(assessment).in_table(ASSESSMENTS)?;
        let question_id = assessment.question_id.clone();
        let version = assessment.question_version;
        let assessed_at = assessment.assessed_at.clone();

        self.call(move |conn| {
            conn.execute(
                "INSERT INTO assessments (question_id, question_version, assessed_at, result)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(question_id, question_version) DO UPDATE SET
                     assessed_at = excluded.assessed_at,
                     result = excluded.result",
                params![question_id, version, assessed_at, result],
            )
            .in_table(ASSESSMENTS)?;
            Ok(())
        })
        .await
    }

    pub async fn get_assessment(
        &self,
        question_id: &str,
        question_version: u32,
    ) -> AppResult<Option<Assessment>> {
        let question_id = question_id.to_string();
        let result = self
            .call(move |conn| {
                conn.query_row(
                    "SELECT result FROM assessments WHERE question_id = ?1 AND question_version = ?2",
                    params![question_id, question_version],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .in_table(ASSESSMENTS)
            })
            .await?;

        Ok(result
            .map(|json| serde_json::from_str(&json).in_table(ASSESSMENTS))
            .transpose()?)
    }

    /// 试卷所有题目的评估，按题目位置和版本排序
    pub async fn assessments_for_exam(&self, exam_id: &str) -> AppResult<Vec<Assessment>> {
        let exam_id = exam_id.to_string();
        let rows = self
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT a.result FROM assessments a
                         JOIN questions q ON q.id = a.question_id
                         WHERE q.exam_id = ?1
                         ORDER BY q.position, a.question_version",
                    )
                    .in_table(ASSESSMENTS)?;
                let rows = stmt
                    .query_map(params![exam_id], |row| row.get::<_, String>(0))
                    .in_table(ASSESSMENTS)?
                    .collect::<Result<Vec<_>, _>>()
                    .in_table(ASSESSMENTS)?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .iter()
            .map(|json| serde_json::from_str(json).in_table(ASSESSMENTS))
            .collect::<Result<Vec<_>, _>>()?)
    }

    // ========== materials / chunks ==========

    pub async fn upsert_material(&self, material: &MaterialRecord) -> AppResult<()> {
        let material = material.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO materials (id, file_path, content_text, chunk_count)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     file_path = excluded.file_path,
                     content_text = excluded.content_text,
                     chunk_count = excluded.chunk_count",
                params![
                    material.id,
                    material.file_path,
                    material.content_text,
                    material.chunk_count as i64
                ],
            )
            .in_table(MATERIALS)?;
            Ok(())
        })
        .await
    }

    pub async fn get_material(&self, id: &str) -> AppResult<Option<MaterialRecord>> {
        let id = id.to_string();
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, file_path, content_text, chunk_count FROM materials WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MaterialRecord {
                        id: row.get(0)?,
                        file_path: row.get(1)?,
                        content_text: row.get(2)?,
                        chunk_count: row.get::<_, i64>(3)? as usize,
                    })
                },
            )
            .optional()
            .in_table(MATERIALS)
        })
        .await
    }

    /// 用新片段替换素材原有的全部片段（同一事务内），返回写入数
    pub async fn replace_chunks(&self, material_id: &str, chunks: &[StoredChunk]) -> AppResult<usize> {
        let rows = chunks
            .iter()
            .map(|c| -> Result<_, serde_json::Error> {
                let metadata = serde_json::to_string(&c.metadata)?;
                Ok((c.clone(), metadata))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .in_table(CHUNKS)?;
        let material_id = material_id.to_string();

        self.call(move |conn| {
            let tx = conn.transaction().in_table(CHUNKS)?;
            let removed = tx
                .execute("DELETE FROM chunks WHERE material_id = ?1", params![material_id])
                .in_table(CHUNKS)?;
            if removed > 0 {
                debug!("素材 {} 删除 {} 个旧片段", material_id, removed);
            }

            for (chunk, metadata) in &rows {
                tx.execute(
                    "INSERT INTO chunks (id, material_id, position, content, page, metadata, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        new_id_if_empty(&chunk.id),
                        material_id,
                        chunk.position as i64,
                        chunk.content,
                        chunk.page,
                        metadata,
                        embedding_to_blob(&chunk.embedding)
                    ],
                )
                .in_table(CHUNKS)?;
            }
            tx.commit().in_table(CHUNKS)?;
            Ok(rows.len())
        })
        .await
    }

    /// 素材的所有片段，按位置排序
    pub async fn chunks_for_material(&self, material_id: &str) -> AppResult<Vec<StoredChunk>> {
        let material_id = material_id.to_string();
        let rows = self
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, material_id, position, content, page, metadata, embedding
                         FROM chunks WHERE material_id = ?1 ORDER BY position",
                    )
                    .in_table(CHUNKS)?;
                let rows = stmt
                    .query_map(params![material_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<u32>>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, Vec<u8>>(6)?,
                        ))
                    })
                    .in_table(CHUNKS)?
                    .collect::<Result<Vec<_>, _>>()
                    .in_table(CHUNKS)?;
                Ok(rows)
            })
            .await?;

        let mut chunks = Vec::with_capacity(rows.len());
        for (id, material_id, position, content, page, metadata, embedding) in rows {
            let metadata: Metadata = serde_json::from_str(&metadata).in_table(CHUNKS)?;
            chunks.push(StoredChunk {
                id,
                material_id,
                content,
                embedding: embedding_from_blob(&embedding),
                page,
                position: position as usize,
                metadata,
            });
        }
        Ok(chunks)
    }

    // ========== generation_jobs ==========

    /// 写入出题任务，返回 id（缺省时分配）
    pub async fn upsert_job(&self, job: &GenerationJob) -> AppResult<String> {
        let specification = serde_json::to_string(&job.specification).in_table(GENERATION_JOBS)?;
        let result_ids = serde_json::to_string(&job.result_question_ids).in_table(GENERATION_JOBS)?;
        let job = job.clone();
        let id = new_id_if_empty(&job.id);

        self.call(move |conn| {
            conn.execute(
                "INSERT INTO generation_jobs (id, exam_id, material_id, specification, status,
                                              result_question_ids, error_message, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     exam_id = excluded.exam_id,
                     material_id = excluded.material_id,
                     specification = excluded.specification,
                     status = excluded.status,
                     result_question_ids = excluded.result_question_ids,
                     error_message = excluded.error_message,
                     completed_at = excluded.completed_at",
                params![
                    id,
                    job.exam_id,
                    job.material_id,
                    specification,
                    job.status.as_str(),
                    result_ids,
                    job.error_message,
                    job.completed_at
                ],
            )
            .in_table(GENERATION_JOBS)?;
            Ok(id)
        })
        .await
    }

    pub async fn get_job(&self, id: &str) -> AppResult<Option<GenerationJob>> {
        let id = id.to_string();
        let row = self
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM generation_jobs WHERE id = ?1", JOB_COLUMNS),
                    params![id],
                    JobRow::read,
                )
                .optional()
                .in_table(GENERATION_JOBS)
            })
            .await?;
        Ok(row.map(JobRow::into_job).transpose()?)
    }

    /// 某份试卷的所有出题任务
    pub async fn jobs_for_exam(&self, exam_id: &str) -> AppResult<Vec<GenerationJob>> {
        let exam_id = exam_id.to_string();
        let rows = self
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM generation_jobs WHERE exam_id = ?1 ORDER BY rowid",
                        JOB_COLUMNS
                    ))
                    .in_table(GENERATION_JOBS)?;
                let rows = stmt
                    .query_map(params![exam_id], JobRow::read)
                    .in_table(GENERATION_JOBS)?
                    .collect::<Result<Vec<_>, _>>()
                    .in_table(GENERATION_JOBS)?;
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(JobRow::into_job)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn set_job_status(&self, id: &str, status: JobStatus) -> AppResult<()> {
        let id = id.to_string();
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE generation_jobs SET status = ?2 WHERE id = ?1",
                    params![id, status.as_str()],
                )
                .in_table(GENERATION_JOBS)?;
            ensure_changed(changed, GENERATION_JOBS, id)
        })
        .await
    }

    /// 任务完成：记录生成的题目和完成时间
    pub async fn complete_job(&self, id: &str, question_ids: &[String]) -> AppResult<()> {
        let result_ids = serde_json::to_string(question_ids).in_table(GENERATION_JOBS)?;
        let id = id.to_string();
        let completed_at = chrono::Utc::now().to_rfc3339();
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE generation_jobs
                     SET status = 'completed', result_question_ids = ?2, completed_at = ?3,
                         error_message = NULL
                     WHERE id = ?1",
                    params![id, result_ids, completed_at],
                )
                .in_table(GENERATION_JOBS)?;
            ensure_changed(changed, GENERATION_JOBS, id)
        })
        .await
    }

    /// 任务失败：记录错误信息
    pub async fn fail_job(&self, id: &str, message: &str) -> AppResult<()> {
        let id = id.to_string();
        let message = message.to_string();
        self.call(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE generation_jobs SET status = 'failed', error_message = ?2 WHERE id = ?1",
                    params![id, message],
                )
                .in_table(GENERATION_JOBS)?;
            ensure_changed(changed, GENERATION_JOBS, id)
        })
        .await
    }
}

/// `questions` 的原始列
struct QuestionRow {
    id: String,
    exam_id: String,
    version: u32,
    position: i64,
    stem: String,
    options: String,
    correct_option: i64,
    bloom_level: Option<String>,
    learning_goal: String,
    category: Option<String>,
    source: String,
}

impl QuestionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            exam_id: row.get(1)?,
            version: row.get(2)?,
            position: row.get(3)?,
            stem: row.get(4)?,
            options: row.get(5)?,
            correct_option: row.get(6)?,
            bloom_level: row.get(7)?,
            learning_goal: row.get(8)?,
            category: row.get(9)?,
            source: row.get(10)?,
        })
    }

    fn into_question(self) -> Result<StoredQuestion, StoreError> {
        let source: QuestionSource = parse_enum(self.source).in_table(QUESTIONS)?;
        Ok(StoredQuestion {
            id: self.id,
            exam_id: self.exam_id,
            version: self.version,
            position: self.position as usize,
            stem: self.stem,
            options: serde_json::from_str(&self.options).in_table(QUESTIONS)?,
            correct_option: self.correct_option as usize,
            bloom_level: self.bloom_level.map(parse_enum).transpose().in_table(QUESTIONS)?,
            learning_goal: self.learning_goal,
            category: self.category,
            source,
        })
    }
}

/// `generation_jobs` 的原始列
struct JobRow {
    id: String,
    exam_id: String,
    material_id: String,
    specification: String,
    status: String,
    result_question_ids: String,
    error_message: Option<String>,
    completed_at: Option<String>,
}

impl JobRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            exam_id: row.get(1)?,
            material_id: row.get(2)?,
            specification: row.get(3)?,
            status: row.get(4)?,
            result_question_ids: row.get(5)?,
            error_message: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }

    fn into_job(self) -> Result<GenerationJob, StoreError> {
        Ok(GenerationJob {
            id: self.id,
            exam_id: self.exam_id,
            material_id: self.material_id,
            specification: serde_json::from_str(&self.specification).in_table(GENERATION_JOBS)?,
            status: parse_enum(self.status).in_table(GENERATION_JOBS)?,
            result_question_ids: serde_json::from_str(&self.result_question_ids)
                .in_table(GENERATION_JOBS)?,
            error_message: self.error_message,
            completed_at: self.completed_at,
        })
    }
}

/// 小写字符串列还原为枚举
fn parse_enum<T: DeserializeOwned>(text: String) -> Result<T, serde_json::Error> {
    serde_json::from_value(JsonValue::String(text))
}

fn ensure_changed(changed: usize, table: &str, id: String) -> Result<(), StoreError> {
    if changed == 0 {
        return Err(StoreError::NotFound {
            table: table.to_string(),
            id,
        });
    }
    Ok(())
}

fn new_id_if_empty(id: &str) -> String {
    if id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        id.to_string()
    }
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn embedding_from_blob(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::generation::GenerationSpec;
    use crate::models::question::{ParsedQuestion, QuestionOption};
    use crate::workflow::test_support::{fixed_assessment, sample_question};

    fn store() -> Store {
        Store::in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_exam_roundtrip_and_missing() {
        let store = store();
        store.upsert_exam(&ExamRecord::new("e1", "Toets 1")).await.unwrap();

        let exam = store.get_exam("e1").await.unwrap().unwrap();
        assert_eq!(exam.name, "Toets 1");
        assert_eq!(exam.analysis_status, JobStatus::Pending);
        assert!(store.get_exam("e2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_exam_if_missing_keeps_existing() {
        let store = store();
        let mut exam = ExamRecord::new("e1", "Origineel");
        exam.analysis_status = JobStatus::Completed;
        store.upsert_exam(&exam).await.unwrap();

        let created = store
            .create_exam_if_missing(&ExamRecord::new("e1", "Nieuw"))
            .await
            .unwrap();
        assert!(!created);
        let exam = store.get_exam("e1").await.unwrap().unwrap();
        assert_eq!(exam.name, "Origineel");
        assert_eq!(exam.analysis_status, JobStatus::Completed);

        assert!(store
            .create_exam_if_missing(&ExamRecord::new("e2", "Nieuw"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_status_and_progress_updates() {
        let store = store();
        store.upsert_exam(&ExamRecord::new("e1", "Toets")).await.unwrap();

        store.set_exam_status("e1", JobStatus::Processing).await.unwrap();
        store.set_exam_progress("e1", 4, 0).await.unwrap();
        assert_eq!(store.increment_questions_analyzed("e1").await.unwrap(), 1);
        assert_eq!(store.increment_questions_analyzed("e1").await.unwrap(), 2);

        let exam = store.get_exam("e1").await.unwrap().unwrap();
        assert_eq!(exam.analysis_status, JobStatus::Processing);
        assert_eq!(exam.question_count, 4);
        assert_eq!(exam.questions_analyzed, 2);
    }

    #[tokio::test]
    async fn test_updates_on_missing_exam_fail() {
        let store = store();
        let err = store
            .set_exam_status("nope", JobStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Store(StoreError::NotFound { ref id, .. }) if id == "nope"
        ));
        assert!(store.increment_questions_analyzed("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = store();
        store.upsert_exam(&ExamRecord::new("e1", "Toets")).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_questions_analyzed("e1").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let exam = store.get_exam("e1").await.unwrap().unwrap();
        assert_eq!(exam.questions_analyzed, 20);
    }

    #[tokio::test]
    async fn test_question_upsert_keeps_id_and_bumps_version() {
        let store = store();
        let first = sample_question("e1", 1, "Welk organel maakt ATP?");
        let id = store.upsert_question(&first).await.unwrap();

        // 相同内容：id 和版本都不变
        assert_eq!(store.upsert_question(&first).await.unwrap(), id);
        assert_eq!(store.get_question(&id).await.unwrap().unwrap().version, 1);

        // 题干变化：同一行，版本加一
        let changed = sample_question("e1", 1, "Welk organel levert energie?");
        assert_eq!(store.upsert_question(&changed).await.unwrap(), id);
        let stored = store.get_question(&id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.stem, "Welk organel levert energie?");

        assert_eq!(store.questions_for_exam("e1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_questions_sorted_and_next_position() {
        let store = store();
        assert_eq!(store.next_question_position("e1").await.unwrap(), 1);

        for position in [3, 1, 2] {
            let q = sample_question("e1", position, &format!("Vraag {}", position));
            store.upsert_question(&q).await.unwrap();
        }
        store
            .upsert_question(&sample_question("e2", 1, "Andere toets"))
            .await
            .unwrap();

        let positions: Vec<usize> = store
            .questions_for_exam("e1")
            .await
            .unwrap()
            .iter()
            .map(|q| q.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(store.next_question_position("e1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_question_fields_survive_storage() {
        let store = store();
        let parsed = ParsedQuestion {
            stem: "Wat is osmose?".into(),
            options: vec![
                QuestionOption {
                    text: "Diffusie van water".into(),
                    position: 0,
                    is_correct: true,
                },
                QuestionOption {
                    text: "Celdeling".into(),
                    position: 1,
                    is_correct: false,
                },
            ],
            bloom_level: Some(crate::models::question::BloomLevel::Begrijpen),
            category: Some("Celbiologie".into()),
            ..Default::default()
        };
        let question = StoredQuestion::from_parsed("e1", 1, &parsed);
        let id = store.upsert_question(&question).await.unwrap();

        let stored = store.get_question(&id).await.unwrap().unwrap();
        assert_eq!(stored.options, question.options);
        assert_eq!(stored.bloom_level, question.bloom_level);
        assert_eq!(stored.category.as_deref(), Some("Celbiologie"));
        assert_eq!(stored.source, QuestionSource::Imported);
    }

    #[tokio::test]
    async fn test_assessment_upsert_on_question_version() {
        let store = store();
        let question_id = store
            .upsert_question(&sample_question("e1", 1, "Vraag"))
            .await
            .unwrap();

        let mut first = fixed_assessment(&question_id, 1);
        first.validation.bet_score = 2;
        store.upsert_assessment(&first).await.unwrap();

        let mut again = fixed_assessment(&question_id, 1);
        again.validation.bet_score = 4;
        store.upsert_assessment(&again).await.unwrap();
        store
            .upsert_assessment(&fixed_assessment(&question_id, 2))
            .await
            .unwrap();

        let all = store.assessments_for_exam("e1").await.unwrap();
        assert_eq!(all.len(), 2);
        let v1 = store.get_assessment(&question_id, 1).await.unwrap().unwrap();
        assert_eq!(v1.validation.bet_score, 4);
        assert_eq!(v1.question_id, question_id);
    }

    #[tokio::test]
    async fn test_replace_chunks_and_blob_embeddings() {
        let store = store();
        let chunk = |position: usize, embedding: Vec<f32>| StoredChunk {
            id: String::new(),
            material_id: "m1".into(),
            content: format!("Stuk {}", position),
            embedding,
            page: Some(2),
            position,
            metadata: Metadata::from([("material_id".to_string(), JsonValue::from("m1"))]),
        };

        store
            .replace_chunks("m1", &[chunk(0, vec![1.0, 0.0]), chunk(1, vec![0.0, 1.0])])
            .await
            .unwrap();
        let written = store
            .replace_chunks("m1", &[chunk(0, vec![0.25, -0.5, 0.75])])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let chunks = store.chunks_for_material("m1").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].embedding, vec![0.25, -0.5, 0.75]);
        assert_eq!(chunks[0].page, Some(2));
        assert_eq!(chunks[0].metadata["material_id"], "m1");
        assert!(store.chunks_for_material("m2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let store = store();
        let job = GenerationJob {
            id: String::new(),
            exam_id: "e1".into(),
            material_id: "m1".into(),
            specification: GenerationSpec {
                learning_goal: "Fotosynthese".into(),
                ..Default::default()
            },
            status: JobStatus::Pending,
            result_question_ids: vec![],
            error_message: None,
            completed_at: None,
        };
        let id = store.upsert_job(&job).await.unwrap();
        assert!(!id.is_empty());

        store.set_job_status(&id, JobStatus::Processing).await.unwrap();
        store.fail_job(&id, "geen stukken").await.unwrap();
        let failed = store.get_job(&id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("geen stukken"));

        store
            .complete_job(&id, &["q1".to_string(), "q2".to_string()])
            .await
            .unwrap();
        let done = store.get_job(&id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result_question_ids, vec!["q1", "q2"]);
        assert!(done.completed_at.is_some());
        assert!(done.error_message.is_none());
        assert_eq!(done.specification.learning_goal, "Fotosynthese");

        assert_eq!(store.jobs_for_exam("e1").await.unwrap().len(), 1);
        assert!(store.complete_job("nope", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("mc.db");
        {
            let store = Store::open(&path).unwrap();
            store.upsert_exam(&ExamRecord::new("e1", "Biologie")).await.unwrap();
        }

        let store = Store::open(&path).unwrap();
        let exam = store.get_exam("e1").await.unwrap().unwrap();
        assert_eq!(exam.name, "Biologie");
    }
}
