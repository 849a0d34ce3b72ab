//! 双层记忆：短期 FIFO 缓冲 + 长期向量存储
//!
//! 每条交互同时写入两层。写入分两步：prepare（调用嵌入服务并校验向量）与 commit（只做内存写入），
//! 嵌入失败时两层都不变，调度器据此保证整次发言的原子性。

use std::sync::Arc;

use crate::core::EngineError;
use crate::llm::EmbeddingService;
use crate::memory::{LongTermStore, MemoryItem, ShortTermBuffer};

/// 已完成嵌入、待写入的交互
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInteraction {
    pub content: String,
    pub embedding: Vec<f32>,
    pub timestamp: u64,
}

/// 校验嵌入结果：非空、全部有限值
pub fn check_embedding(embedding: &[f32]) -> Result<(), EngineError> {
    if embedding.is_empty() {
        return Err(EngineError::Service("embedding service returned an empty vector".into()));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(EngineError::Service(
            "embedding service returned a non-finite component".into(),
        ));
    }
    Ok(())
}

/// 调用嵌入服务并校验
pub async fn embed_checked(
    embedder: &dyn EmbeddingService,
    text: &str,
) -> Result<Vec<f32>, EngineError> {
    let embedding = embedder.embed(text).await.map_err(EngineError::Service)?;
    check_embedding(&embedding)?;
    Ok(embedding)
}

/// 旁听到的消息在记忆中的写法：`{sender}: {content}`
pub fn listen_entry(sender: &str, content: &str) -> String {
    format!("{}: {}", sender, content)
}

pub struct AgentMemory {
    short_term: ShortTermBuffer,
    long_term: LongTermStore,
    embedder: Arc<dyn EmbeddingService>,
}

impl AgentMemory {
    pub fn new(embedder: Arc<dyn EmbeddingService>, short_term_limit: usize) -> Self {
        Self {
            short_term: ShortTermBuffer::new(short_term_limit),
            long_term: LongTermStore::new(),
            embedder,
        }
    }

    /// 写入一条交互：短期存 `[t] content`，长期存 {content, embed(content), t}
    pub async fn add_interaction(&mut self, content: &str, timestamp: u64) -> Result<(), EngineError> {
        let prepared = self.prepare_interaction(content, timestamp).await?;
        self.commit(prepared);
        Ok(())
    }

    pub async fn prepare_interaction(
        &self,
        content: &str,
        timestamp: u64,
    ) -> Result<PreparedInteraction, EngineError> {
        let embedding = embed_checked(self.embedder.as_ref(), content).await?;
        self.check_dimension(&embedding)?;
        Ok(PreparedInteraction {
            content: content.to_string(),
            embedding,
            timestamp,
        })
    }

    /// 向量维度须与已存条目一致
    pub fn check_dimension(&self, embedding: &[f32]) -> Result<(), EngineError> {
        match self.long_term.dimension() {
            Some(dim) if dim != embedding.len() => Err(EngineError::Service(format!(
                "embedding dimension {} does not match stored dimension {}",
                embedding.len(),
                dim
            ))),
            _ => Ok(()),
        }
    }

    pub fn commit(&mut self, prepared: PreparedInteraction) {
        let item = MemoryItem {
            content: prepared.content,
            embedding: prepared.embedding,
            timestamp: prepared.timestamp,
        };
        self.short_term.push(item.formatted());
        self.long_term.push(item);
    }

    pub fn get_short_term_context(&self) -> String {
        self.short_term.context()
    }

    /// 按余弦相似度检索最相关的 top_k 条，格式 `[t] content`；长期记忆为空时不调用嵌入服务
    pub async fn retrieve_relevant(&self, query: &str, top_k: usize) -> Result<Vec<String>, EngineError> {
        if self.long_term.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = embed_checked(self.embedder.as_ref(), query).await?;
        self.check_dimension(&query_embedding)?;
        Ok(self
            .long_term
            .search(&query_embedding, top_k)
            .into_iter()
            .map(|(_, item)| item.formatted())
            .collect())
    }

    pub fn short_term(&self) -> &ShortTermBuffer {
        &self.short_term
    }

    pub fn long_term(&self) -> &LongTermStore {
        &self.long_term
    }
}
