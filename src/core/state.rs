//! 状态定义：模拟阶段、回合状态与对外快照
//!
//! 引擎内部维护 SimPhase + RoundState；宿主只拿到可序列化的 SimulationSnapshot / AdvanceOutcome。

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

/// 参与者 ID（配置中的 id 字段）
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 模拟阶段：决定哪些操作合法
///
/// `Uninitialized → Selected → RoundActive → RoundComplete → {RoundActive | Ended}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimPhase {
    Uninitialized,
    Selected,
    RoundActive,
    RoundComplete,
    Ended,
}

/// 单个回合：开始时创建，完成后由下一回合替换
#[derive(Clone, Debug, Default)]
pub struct RoundState {
    pub number: u32,
    pub turns_taken: u32,
    /// 待发言队列（队首先发言）
    pub pending: VecDeque<AgentId>,
    /// 本回合已行动（锁定）的参与者
    pub done: HashSet<AgentId>,
}

impl RoundState {
    /// 进入下一回合：编号加一，计数与集合清零
    pub fn next(&self) -> Self {
        Self {
            number: self.number + 1,
            ..Default::default()
        }
    }
}

/// advance 的结果状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    RoundCompleted,
    SimulationEnded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub status: AdvanceStatus,
    pub round_number: u32,
}

/// 单个参与者的对外状态
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub id: AgentId,
    pub name: String,
    pub vitality: u64,
    pub alive: bool,
}

/// 引擎状态的只读投影（供宿主展示 / 调试）
#[derive(Clone, Debug, Serialize)]
pub struct SimulationSnapshot {
    pub phase: SimPhase,
    pub round_number: u32,
    pub turns_taken: u32,
    pub global_resource: u64,
    pub clock: u64,
    pub agents: Vec<AgentStatus>,
    pub pending: Vec<AgentId>,
    pub done: Vec<AgentId>,
}
