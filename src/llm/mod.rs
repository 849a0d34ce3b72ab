//! 服务层：生成 / 嵌入抽象与实现（OpenAI 兼容 / Mock）

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod parse;
pub mod prompt;
pub mod traits;

use std::sync::Arc;

pub use embedding::OpenAiEmbedder;
pub use mock::{HashEmbedder, MockGenerator, ScriptedGenerator};
pub use openai::{OpenAiGenerator, TokenUsage};
pub use parse::parse_decision;
pub use traits::{EmbeddingService, GenerationService, TurnContext, TurnDecision};

use crate::config::LlmSection;

/// 一对生成 + 嵌入服务
#[derive(Clone)]
pub struct Services {
    pub generator: Arc<dyn GenerationService>,
    pub embedder: Arc<dyn EmbeddingService>,
}

impl Services {
    pub fn new(generator: Arc<dyn GenerationService>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { generator, embedder }
    }

    pub fn mock() -> Self {
        Self::new(Arc::new(MockGenerator), Arc::new(HashEmbedder::default()))
    }
}

/// 根据配置与环境变量选择后端：provider = openai 且有 OPENAI_API_KEY 时走 OpenAI，否则 Mock
pub fn create_services(cfg: &LlmSection) -> Services {
    let has_key = std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.trim().is_empty());
    if cfg.provider.eq_ignore_ascii_case("openai") && has_key {
        tracing::info!("Using OpenAI generation ({}) and embeddings ({})", cfg.model, cfg.embedding_model);
        let base = cfg.base_url.as_deref();
        Services::new(
            Arc::new(OpenAiGenerator::new(base, &cfg.model, None)),
            Arc::new(OpenAiEmbedder::new(base, &cfg.embedding_model, None)),
        )
    } else {
        if !cfg.provider.eq_ignore_ascii_case("mock") {
            tracing::warn!("Provider '{}' unavailable (no OPENAI_API_KEY?), using Mock services", cfg.provider);
        }
        Services::mock()
    }
}
