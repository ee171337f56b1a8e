use crate::rag::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时进行的模型调用数量上限
    pub max_concurrency: usize,
    /// 试卷 TOML 文件存放目录
    pub exam_folder: String,
    /// SQLite 数据库文件
    pub database_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 评审用模型（便宜、确定性）
    pub validation_model: String,
    /// 出题用模型
    pub generation_model: String,
    /// API 调用失败时的最大尝试次数
    pub llm_max_retries: usize,
    // --- 检索配置 ---
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// 向量模型（OpenAI 兼容的 embeddings 接口）
    pub embedding_model: String,
    pub embedding_api_base_url: String,
    pub embedding_dimensions: usize,
    pub retrieval_top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            exam_folder: "exams".to_string(),
            database_path: "mc_quality.db".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            validation_model: "gpt-4o-mini".to_string(),
            generation_model: "gpt-4o".to_string(),
            llm_max_retries: 3,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_model: "intfloat/multilingual-e5-base".to_string(),
            embedding_api_base_url: "https://api.openai.com/v1".to_string(),
            embedding_dimensions: 768,
            retrieval_top_k: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrency: env_parse("MAX_CONCURRENCY").unwrap_or(default.max_concurrency),
            exam_folder: std::env::var("EXAM_FOLDER").unwrap_or(default.exam_folder),
            database_path: std::env::var("DATABASE_PATH").unwrap_or(default.database_path),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            validation_model: std::env::var("VALIDATION_MODEL").unwrap_or(default.validation_model),
            generation_model: std::env::var("GENERATION_MODEL").unwrap_or(default.generation_model),
            llm_max_retries: env_parse("LLM_MAX_RETRIES").unwrap_or(default.llm_max_retries),
            chunk_size: env_parse("CHUNK_SIZE").unwrap_or(default.chunk_size),
            chunk_overlap: env_parse("CHUNK_OVERLAP").unwrap_or(default.chunk_overlap),
            embedding_model: std::env::var("EMBEDDING_MODEL").unwrap_or(default.embedding_model),
            embedding_api_base_url: std::env::var("EMBEDDING_API_BASE_URL").unwrap_or(default.embedding_api_base_url),
            embedding_dimensions: env_parse("EMBEDDING_DIMENSIONS").unwrap_or(default.embedding_dimensions),
            retrieval_top_k: env_parse("RETRIEVAL_TOP_K").unwrap_or(default.retrieval_top_k),
        }
    }
}

/// 读取并解析环境变量，不存在或无法解析时返回 None
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
