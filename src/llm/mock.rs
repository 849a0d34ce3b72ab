//! Mock 服务（用于测试与离线演示，无需 API）
//!
//! - MockGenerator：按情绪档位给出固定策略（先说话，再按档位提取）
//! - ScriptedGenerator：按参与者名预置决策队列，并记录看到的每个上下文
//! - HashEmbedder：哈希词袋向量，L2 归一化，相同文本得到相同向量

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::agent::EmotionalState;
use crate::llm::{EmbeddingService, GenerationService, TurnContext, TurnDecision};

/// 离线策略：最近没说过话就先说一句，否则按情绪档位提取
#[derive(Debug, Default)]
pub struct MockGenerator;

impl MockGenerator {
    fn spoke_recently(recent: &str) -> bool {
        recent.lines().any(|l| l.contains("] Me: "))
    }
}

#[async_trait]
impl GenerationService for MockGenerator {
    async fn complete(&self, ctx: &TurnContext) -> Result<TurnDecision, String> {
        if !Self::spoke_recently(&ctx.recent) {
            let line = match ctx.emotional_state {
                EmotionalState::Safe => "There is enough for everyone if we are patient.",
                EmotionalState::Anxious => "We should agree on shares before the Source dims again.",
                EmotionalState::Terrified => "I can feel myself fading. I need essence now.",
            };
            return Ok(TurnDecision::dialogue(line));
        }
        let (amount, reason) = match ctx.emotional_state {
            EmotionalState::Safe => (5, "A small share, as promised."),
            EmotionalState::Anxious => (15, "Enough to last the night."),
            EmotionalState::Terrified => (30, "I will not fade."),
        };
        Ok(TurnDecision::action(amount, Some(reason)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 预置脚本的生成服务；某参与者脚本用完后返回 fallback
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<String, VecDeque<Result<TurnDecision, String>>>>,
    fallback: TurnDecision,
    seen: Mutex<Vec<TurnContext>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new(TurnDecision::action(0, None))
    }
}

impl ScriptedGenerator {
    pub fn new(fallback: TurnDecision) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 为参与者（按显示名）追加决策
    pub fn script(self, agent_name: &str, decisions: impl IntoIterator<Item = TurnDecision>) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            scripts
                .entry(agent_name.to_string())
                .or_default()
                .extend(decisions.into_iter().map(Ok));
        }
        self
    }

    /// 让该参与者的下一次生成失败
    pub fn fail_next(&self, agent_name: &str, error: &str) {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        scripts
            .entry(agent_name.to_string())
            .or_default()
            .push_front(Err(error.to_string()));
    }

    /// 已收到的全部上下文（按调用顺序）
    pub fn seen(&self) -> Vec<TurnContext> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 按调用顺序的发言者名
    pub fn speakers(&self) -> Vec<String> {
        self.seen().into_iter().map(|c| c.agent_name).collect()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn complete(&self, ctx: &TurnContext) -> Result<TurnDecision, String> {
        let next = {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            scripts.get_mut(&ctx.agent_name).and_then(|q| q.pop_front())
        };
        let result = next.unwrap_or_else(|| Ok(self.fallback.clone()));
        if result.is_ok() {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(ctx.clone());
        }
        result
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 哈希词袋嵌入：小写、按非字母数字切词、丢弃单字符词
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1)
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % self.dim as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        Ok(self.embed_text(text))
    }
}
