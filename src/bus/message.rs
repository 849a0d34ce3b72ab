//! 广播消息与轮询结果的协议定义

use serde::{Deserialize, Serialize};

/// 系统消息的发送者名
pub const SYSTEM_SENDER: &str = "SYSTEM";

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// 参与者发言
    Text,
    /// 引擎通告（回合开始、提取、凋零等）
    System,
}

/// 总线上的单条消息，只能被 poll 消费一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub content: String,
    pub kind: MessageKind,
    /// 模拟时钟
    pub timestamp: u64,
}

impl Message {
    pub fn text(sender: impl Into<String>, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            kind: MessageKind::Text,
            timestamp,
        }
    }

    pub fn system(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            sender: SYSTEM_SENDER.to_string(),
            content: content.into(),
            kind: MessageKind::System,
            timestamp,
        }
    }
}

/// poll 的返回：真实消息优先，其次是按需推导的信号，最后是 none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollResult {
    Text {
        sender: String,
        content: String,
        timestamp: u64,
    },
    System {
        sender: String,
        content: String,
        timestamp: u64,
    },
    /// 当前回合已结束，尚未开始下一回合
    TurnOver,
    /// 模拟已结束
    SimulationEnded,
    /// 暂无消息
    #[serde(rename = "none")]
    Idle,
}

impl From<Message> for PollResult {
    fn from(m: Message) -> Self {
        match m.kind {
            MessageKind::Text => PollResult::Text {
                sender: m.sender,
                content: m.content,
                timestamp: m.timestamp,
            },
            MessageKind::System => PollResult::System {
                sender: m.sender,
                content: m.content,
                timestamp: m.timestamp,
            },
        }
    }
}
