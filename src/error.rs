use thiserror::Error;

/// 应用程序错误类型
///
/// 规则分析与切分是全函数，不会产生错误；这里只覆盖外围协作方。
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 打开数据库失败
    #[error("打开数据库 {path} 失败: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    /// 创建数据库目录失败
    #[error("创建目录 {path} 失败: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// SQL 执行失败
    #[error("表 {table} 的 SQL 执行失败: {source}")]
    Sqlite {
        table: String,
        #[source]
        source: rusqlite::Error,
    },
    /// 列中的 JSON 无法读写
    #[error("表 {table} 数据格式错误: {source}")]
    Serde {
        table: String,
        #[source]
        source: serde_json::Error,
    },
    /// 行不存在
    #[error("表 {table} 中不存在记录 {id}")]
    NotFound { table: String, id: String },
    /// 阻塞任务异常结束
    #[error("存储任务执行失败: {source}")]
    Task {
        #[source]
        source: tokio::task::JoinError,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
    /// 不支持的素材格式
    #[error("不支持的文件格式: {extension}")]
    UnsupportedFormat { extension: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 输出被截断
    #[error("LLM输出被截断 (模型: {model})，达到 max_tokens 上限")]
    Truncated { model: String },
    /// 返回内容不是合法 JSON
    #[error("无法解析LLM返回的JSON: {source}")]
    InvalidJson {
        response: String,
        #[source]
        source: serde_json::Error,
    },
    /// 向量数量或维度与预期不符
    #[error("向量化结果不符 (模型: {model})：预期 {expected}，实际 {actual}")]
    EmbeddingMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },
    /// 字段取值越界
    #[error("LLM返回的字段 {field} 取值 {value} 超出范围")]
    SchemaViolation { field: String, value: String },
}

/// 业务逻辑错误
#[derive(Debug, Error)]
pub enum BusinessError {
    /// 试卷没有题目
    #[error("试卷 {exam_id} 没有题目")]
    EmptyExam { exam_id: String },
    /// 素材没有检索到任何片段
    #[error("素材 {material_id} 没有找到相关片段")]
    NoRelevantChunks { material_id: String },
    /// 生成任务不存在
    #[error("生成任务不存在: {job_id}")]
    JobNotFound { job_id: String },
    /// 题目不存在
    #[error("题目不存在: {question_id}")]
    QuestionNotFound { question_id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 命令行参数缺失
    #[error("缺少参数: {name}")]
    MissingArgument { name: String },
    /// 未知子命令
    #[error("未知命令: {command}")]
    UnknownCommand { command: String },
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Llm(LlmError::InvalidJson {
            response: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否值得重试（只有 API 调用本身失败才重试）
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::ApiCallFailed { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
