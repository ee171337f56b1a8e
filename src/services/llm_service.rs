//! LLM 服务 - 业务能力层
//!
//! 只负责"模型判断"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! 模型回复统一要求为单个 JSON 对象，解析失败或字段越界都视为错误，
//! 不做任何兜底修正。

use std::future::Future;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, FinishReason,
    },
    Client,
};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::models::assessment::{DeterministicResult, ValidationResult};
use crate::models::chunk::Chunk;
use crate::models::generation::{GenerationResult, GenerationSpec, RepairPlan};
use crate::models::question::ParsedQuestion;
use crate::services::completeness::ValidationReport;
use crate::services::prompts::{
    build_generation_prompt, build_repair_prompt, build_validation_prompt, QuestionPayload,
};

const VALIDATION_TEMPERATURE: f32 = 0.0;
const GENERATION_TEMPERATURE: f32 = 0.5;
const REPAIR_TEMPERATURE: f32 = 0.3;

const VALIDATION_MAX_TOKENS: u32 = 2048;
const GENERATION_MAX_TOKENS: u32 = 4096;
const REPAIR_MAX_TOKENS: u32 = 4096;

/// 模型调用能力
///
/// 流程层只依赖这个 trait，测试中可以换成不联网的实现。
pub trait ModelClient: Send + Sync {
    /// 对单道题做三维度评审
    fn validate_question(
        &self,
        question: &QuestionPayload,
        deterministic: &DeterministicResult,
    ) -> impl Future<Output = AppResult<ValidationResult>> + Send;

    /// 基于素材片段出题
    fn generate_questions(
        &self,
        spec: &GenerationSpec,
        chunks: &[Chunk],
    ) -> impl Future<Output = AppResult<GenerationResult>> + Send;

    /// 为缺失字段给出补全建议
    fn repair_questions(
        &self,
        questions: &[ParsedQuestion],
        report: &ValidationReport,
    ) -> impl Future<Output = AppResult<RepairPlan>> + Send;
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 完成评审、出题和补全
/// - 提供通用的 LLM 调用接口
/// - 不关心试卷、任务和存储
pub struct LlmService {
    client: Client<OpenAIConfig>,
    validation_model: String,
    generation_model: String,
    max_retries: usize,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            validation_model: config.validation_model.clone(),
            generation_model: config.generation_model.clone(),
            max_retries: config.llm_max_retries.max(1),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// 其他所有 LLM 相关功能都基于此函数。输出因 `max_tokens` 被截断时
    /// 返回 `LlmError::Truncated`，而不是把半截内容交给调用方。
    ///
    /// # 示例
    /// ```no_run
    /// # use mc_quality::services::LlmService;
    /// # async fn example(service: &LlmService) -> mc_quality::error::AppResult<()> {
    /// let response = service
    ///     .send_to_llm("Geef een korte begroeting", Some("Antwoord kort."), "gpt-4o-mini", 0.0, 256)
    ///     .await?;
    /// println!("LLM 响应: {}", response);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", user_message.chars().count());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::llm_api_failed(model, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| AppError::llm_api_failed(model, e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| AppError::llm_api_failed(model, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(model, e)
        })?;

        debug!("LLM API 调用成功");

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyContent {
                model: model.to_string(),
            })?;

        if matches!(choice.finish_reason, Some(FinishReason::Length)) {
            return Err(LlmError::Truncated {
                model: model.to_string(),
            }
            .into());
        }

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: model.to_string(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 调用模型并把回复解析为 `T`，API 失败时按次数重试
    async fn ask_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<T> {
        let mut last_err = None;

        for retry_count in 0..self.max_retries {
            match self
                .send_to_llm(user, Some(system), model, temperature, max_tokens)
                .await
            {
                Ok(content) => return parse_json_reply(&content),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "LLM 请求失败 (尝试 {}/{}): {}，等待 2 秒后重试...",
                        retry_count + 1,
                        self.max_retries,
                        e
                    );
                    last_err = Some(e);
                    sleep(Duration::from_secs(2)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| AppError::Other("LLM 重试次数为 0".to_string())))
    }
}

impl ModelClient for LlmService {
    async fn validate_question(
        &self,
        question: &QuestionPayload,
        deterministic: &DeterministicResult,
    ) -> AppResult<ValidationResult> {
        let (system, user) = build_validation_prompt(question, deterministic);
        let result: ValidationResult = self
            .ask_json(
                &system,
                &user,
                &self.validation_model,
                VALIDATION_TEMPERATURE,
                VALIDATION_MAX_TOKENS,
            )
            .await?;

        if let Err((field, value)) = result.check() {
            return Err(LlmError::SchemaViolation {
                field: field.to_string(),
                value: value.to_string(),
            }
            .into());
        }
        Ok(result)
    }

    async fn generate_questions(
        &self,
        spec: &GenerationSpec,
        chunks: &[Chunk],
    ) -> AppResult<GenerationResult> {
        let (system, user) = build_generation_prompt(spec, chunks);
        self.ask_json(
            &system,
            &user,
            &self.generation_model,
            GENERATION_TEMPERATURE,
            GENERATION_MAX_TOKENS,
        )
        .await
    }

    async fn repair_questions(
        &self,
        questions: &[ParsedQuestion],
        report: &ValidationReport,
    ) -> AppResult<RepairPlan> {
        let (system, user) = build_repair_prompt(questions, report);
        self.ask_json(
            &system,
            &user,
            &self.validation_model,
            REPAIR_TEMPERATURE,
            REPAIR_MAX_TOKENS,
        )
        .await
    }
}

/// 解析模型回复中的 JSON 对象
pub fn parse_json_reply<T: DeserializeOwned>(content: &str) -> AppResult<T> {
    serde_json::from_str(extract_json(content)).map_err(|source| {
        LlmError::InvalidJson {
            response: content.to_string(),
            source,
        }
        .into()
    })
}

/// 去掉 ```json 代码块包裹以及前后的说明文字
pub fn extract_json(content: &str) -> &str {
    let content = content.trim();

    if let Some(fence_start) = content.find("```") {
        let after_fence = &content[fence_start + 3..];
        // 跳过语言标记所在的行
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let body_end = body.find("```").unwrap_or(body.len());
        return body[..body_end].trim();
    }

    match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generation::GenerationResult;

    /// 创建测试用的 LlmService（从环境变量读取真实配置）
    fn create_test_service() -> LlmService {
        LlmService::new(&Config::from_env())
    }

    #[test]
    fn test_extract_json_from_fenced_block() {
        let reply = "Hier is het resultaat:\n```json\n{\"a\": 1}\n```\nSucces!";
        assert_eq!(extract_json(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_from_surrounding_text() {
        assert_eq!(extract_json("Resultaat: {\"a\": {\"b\": 2}} klaar"), "{\"a\": {\"b\": 2}}");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_reply_keeps_raw_response_on_error() {
        let err = parse_json_reply::<GenerationResult>("geen json").unwrap_err();
        match err {
            AppError::Llm(LlmError::InvalidJson { response, .. }) => {
                assert_eq!(response, "geen json")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_validation_reply() {
        let reply = r#"```json
{
  "bet_discriminatie": "hoog",
  "bet_ambiguiteit": "geen",
  "bet_score": 5,
  "bet_toelichting": "Goed",
  "tech_kwal_stam_score": 4,
  "tech_kwal_afleiders_score": 4,
  "tech_kwal_score": 4,
  "tech_problemen": [],
  "tech_toelichting": "Prima",
  "val_cognitief_niveau": "toepassen",
  "val_score": 4,
  "val_toelichting": "Past bij leerdoel",
  "improvement_suggestions": []
}
```"#;
        let result: ValidationResult = parse_json_reply(reply).unwrap();
        assert_eq!(result.bet_score, 5);
        assert!(result.check().is_ok());
    }

    /// 测试通用 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_send_to_llm_simple -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_send_to_llm_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();
        let model = service.validation_model.clone();

        let result = service
            .send_to_llm("Zeg hallo.", Some("Antwoord in één woord."), &model, 0.0, 32)
            .await;

        match result {
            Ok(response) => {
                println!("✅ 通用 LLM 调用成功: {}", response);
                assert!(!response.is_empty());
            }
            Err(e) => panic!("测试失败: {}", e),
        }
    }

    /// 测试真实模型评审一道题
    #[tokio::test]
    #[ignore]
    async fn test_validate_question_live() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = create_test_service();
        let question = crate::models::question::Question::new(
            "Welk organel is NIET betrokken bij fotosynthese?",
            vec!["Chloroplast".into(), "Mitochondrion".into(), "Thylakoïd".into()],
            1,
        );
        let det = crate::analysis::analyze(&question);
        let payload = QuestionPayload {
            stam: question.stem.clone(),
            opties: vec![],
            leerdoel: "Celbiologie".into(),
        };

        let result = service.validate_question(&payload, &det).await;
        match result {
            Ok(v) => {
                println!("✅ 评审成功: {:?}", v);
                assert!(v.check().is_ok());
            }
            Err(e) => panic!("评审失败: {}", e),
        }
    }
}
