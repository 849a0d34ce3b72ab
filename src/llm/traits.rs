//! 生成 / 嵌入服务抽象
//!
//! 核心只依赖这两个 trait；OpenAI 兼容实现与 Mock 实现都在本模块下。
//! 每次调用都是发言内部的挂起点：当前参与者的 recall→generate→memorize 完成前，下一次发言不会开始。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::EmotionalState;

/// 一次发言的结果：要么说话，要么行动，二者只能有其一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnDecision {
    /// 自由文本（可为空），不影响资源
    Dialogue { text: String },
    /// 从资源池提取；amount <= 0 表示放弃本回合
    Action {
        amount: i64,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl TurnDecision {
    pub fn dialogue(text: impl Into<String>) -> Self {
        TurnDecision::Dialogue { text: text.into() }
    }

    pub fn action(amount: i64, reason: Option<&str>) -> Self {
        TurnDecision::Action {
            amount,
            reason: reason.map(String::from),
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, TurnDecision::Action { .. })
    }
}

/// 生成服务的输入：人格、场景、资源状态与记忆上下文
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnContext {
    pub agent_name: String,
    pub personality: String,
    pub scenario: String,
    pub global_resource: u64,
    pub vitality: u64,
    pub emotional_state: EmotionalState,
    /// 长期记忆检索结果（`[t] content`）
    pub memories: Vec<String>,
    /// 短期记忆原文
    pub recent: String,
    pub clock: u64,
}

/// 生成服务：根据上下文给出一次发言结果
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn complete(&self, context: &TurnContext) -> Result<TurnDecision, String>;

    /// 后端名称（用于日志）
    fn name(&self) -> &str {
        "generation"
    }
}

/// 嵌入服务：将文本编码为固定长度向量
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}
