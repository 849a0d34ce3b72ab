//! 短期记忆：最近 N 条格式化交互
//!
//! 超出上限时丢弃最旧的一条（FIFO），供 Recall 阶段直接拼入上下文。

use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct ShortTermBuffer {
    entries: VecDeque<String>,
    limit: usize,
}

impl ShortTermBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, entry: impl Into<String>) {
        if self.limit == 0 {
            return;
        }
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    /// 按插入顺序换行拼接；为空时返回空字符串
    pub fn context(&self) -> String {
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
