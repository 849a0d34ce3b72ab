//! OpenAI 兼容生成服务
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；回复文本经 parse_decision 转为 TurnDecision。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::prompt::{render, RenderedPrompt};
use crate::llm::{parse_decision, GenerationService, TurnContext, TurnDecision};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    /// (prompt, completion, total)
    pub fn get(&self) -> (u64, u64, u64) {
        let p = self.prompt_tokens.load(Ordering::Relaxed);
        let c = self.completion_tokens.load(Ordering::Relaxed);
        (p, c, p + c)
    }
}

pub(crate) fn openai_config(base_url: Option<&str>, api_key: Option<&str>) -> OpenAIConfig {
    let api_key = api_key
        .map(String::from)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_default();
    let config = OpenAIConfig::new().with_api_key(api_key);
    match base_url {
        Some(url) => config.with_api_base(url),
        None => config,
    }
}

pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    pub usage: TokenUsage,
}

impl OpenAiGenerator {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::with_config(openai_config(base_url, api_key)),
            model: model.to_string(),
            usage: TokenUsage::default(),
        }
    }

    fn to_openai_messages(prompt: &RenderedPrompt) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt.system.clone())
            .build()
            .map_err(|e| e.to_string())?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user.clone())
            .build()
            .map_err(|e| e.to_string())?;
        Ok(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
    }
}

#[async_trait]
impl GenerationService for OpenAiGenerator {
    async fn complete(&self, context: &TurnContext) -> Result<TurnDecision, String> {
        let prompt = render(context);
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_openai_messages(&prompt)?)
            .build()
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| "response has no message content".to_string())?;

        parse_decision(&content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
