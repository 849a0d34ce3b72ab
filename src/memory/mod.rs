//! 记忆层：短期（FIFO 缓冲）、长期（向量检索）、双层协调（AgentMemory）

pub mod agent_memory;
pub mod long_term;
pub mod short_term;

pub use agent_memory::{
    check_embedding, embed_checked, listen_entry, AgentMemory, PreparedInteraction,
};
pub use long_term::{cosine_similarity, LongTermStore, MemoryItem};
pub use short_term::ShortTermBuffer;
