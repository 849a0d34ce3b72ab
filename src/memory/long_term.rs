//! 长期记忆：只追加的向量存储 + 余弦相似度检索
//!
//! 每次检索都对全部条目线性扫描，没有索引；条目从不删除。
//! 只适合小规模存储，规模上限是已知限制。

use std::cmp::Ordering;

/// 单条长期记忆
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryItem {
    pub content: String,
    pub embedding: Vec<f32>,
    pub timestamp: u64,
}

impl MemoryItem {
    /// `[timestamp] content`
    pub fn formatted(&self) -> String {
        format!("[{}] {}", self.timestamp, self.content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LongTermStore {
    items: Vec<MemoryItem>,
}

impl LongTermStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: MemoryItem) {
        self.items.push(item);
    }

    /// 已存向量的维度（空存储返回 None）
    pub fn dimension(&self) -> Option<usize> {
        self.items.first().map(|i| i.embedding.len())
    }

    /// 按相似度降序返回前 k 条；相同分数保持插入顺序（稳定排序）
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(f32, &MemoryItem)> {
        let mut scored: Vec<(f32, &MemoryItem)> = self
            .items
            .iter()
            .map(|item| (cosine_similarity(query, &item.embedding), item))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 余弦相似度；任一向量范数为 0 或维度不一致时为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
