//! 消息总线：严格 FIFO 的广播出件箱，供外部轮询
//!
//! 单写者：只有推进回合的一方（引擎）持有 MessageBus，可以 push 与发布回合状态；
//! 轮询方持有 BusPoller，只能弹出消息。turn_over / simulation_ended 是按需推导的信号，不入队。
//! 队列与回合状态在同一把锁下，poll 看到的消息与状态总是一致的。

pub mod message;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use message::{Message, MessageKind, PollResult, SYSTEM_SENDER};

/// 写端发布的回合状态，轮询端据此推导信号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusState {
    /// 至少开始过一个回合
    pub started: bool,
    pub round_number: u32,
    pub max_rounds: u32,
    /// 当前回合已完全结束且下一回合尚未开始
    pub finished: bool,
    /// 模拟已结束（含全部凋零的情况）
    pub ended: bool,
}

#[derive(Debug, Default)]
struct Outbox {
    queue: VecDeque<Message>,
    state: BusState,
}

type Shared = Arc<Mutex<Outbox>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Outbox> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 写端
pub struct MessageBus {
    shared: Shared,
}

/// 读端（可克隆，多个轮询方共享同一队列）
#[derive(Clone)]
pub struct BusPoller {
    shared: Shared,
}

impl MessageBus {
    pub fn new() -> (Self, BusPoller) {
        let shared: Shared = Arc::new(Mutex::new(Outbox::default()));
        (
            Self {
                shared: shared.clone(),
            },
            BusPoller { shared },
        )
    }

    pub fn push(&self, message: Message) {
        tracing::debug!(sender = %message.sender, kind = ?message.kind, "{}", message.content);
        lock(&self.shared).queue.push_back(message);
    }

    /// 发布最新回合状态（只保留最新值）
    pub fn publish(&self, state: BusState) {
        lock(&self.shared).state = state;
    }

    /// 清空队列并重置状态（reset / 重新选人时使用）
    pub fn clear(&self) {
        let mut outbox = lock(&self.shared);
        outbox.queue.clear();
        outbox.state = BusState::default();
    }

    /// 新建一个读端
    pub fn poller(&self) -> BusPoller {
        BusPoller {
            shared: self.shared.clone(),
        }
    }
}

impl BusPoller {
    /// 优先级：队列中的消息 > 推导信号 > none
    pub fn poll(&self) -> PollResult {
        let mut outbox = lock(&self.shared);
        if let Some(message) = outbox.queue.pop_front() {
            return message.into();
        }
        let state = outbox.state;
        if state.ended {
            return PollResult::SimulationEnded;
        }
        if state.started && state.finished {
            if state.round_number >= state.max_rounds {
                return PollResult::SimulationEnded;
            }
            return PollResult::TurnOver;
        }
        PollResult::Idle
    }

    /// 取出当前所有排队消息（不含信号）
    pub fn drain(&self) -> Vec<Message> {
        lock(&self.shared).queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (bus, poller) = MessageBus::new();
        bus.push(Message::text("A", "one", 1));
        bus.push(Message::system("two", 2));
        bus.push(Message::text("B", "three", 3));

        let contents: Vec<String> = poller.drain().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(poller.poll(), PollResult::Idle);
    }

    #[test]
    fn test_messages_take_precedence_over_signals() {
        let (bus, poller) = MessageBus::new();
        bus.publish(BusState {
            started: true,
            round_number: 1,
            max_rounds: 3,
            finished: true,
            ended: false,
        });
        bus.push(Message::system("Discussion time limit reached. Round ending.", 9));

        assert!(matches!(poller.poll(), PollResult::System { .. }));
        assert_eq!(poller.poll(), PollResult::TurnOver);
        // 信号按需推导，重复轮询结果不变
        assert_eq!(poller.poll(), PollResult::TurnOver);
    }

    #[test]
    fn test_last_round_finished_signals_end() {
        let (bus, poller) = MessageBus::new();
        bus.publish(BusState {
            started: true,
            round_number: 3,
            max_rounds: 3,
            finished: true,
            ended: false,
        });
        assert_eq!(poller.poll(), PollResult::SimulationEnded);
    }

    #[test]
    fn test_not_started_is_idle() {
        let (bus, poller) = MessageBus::new();
        bus.publish(BusState {
            finished: true,
            ..Default::default()
        });
        assert_eq!(poller.poll(), PollResult::Idle);
    }

    #[test]
    fn test_active_round_is_idle() {
        let (bus, poller) = MessageBus::new();
        bus.publish(BusState {
            started: true,
            round_number: 2,
            max_rounds: 3,
            finished: false,
            ended: false,
        });
        assert_eq!(poller.poll(), PollResult::Idle);
    }

    #[test]
    fn test_clear_resets_queue_and_state() {
        let (bus, poller) = MessageBus::new();
        bus.push(Message::text("A", "x", 1));
        bus.publish(BusState {
            started: true,
            ended: true,
            ..Default::default()
        });
        bus.clear();
        assert!(poller.drain().is_empty());
        assert_eq!(poller.poll(), PollResult::Idle);
    }

    #[test]
    fn test_extra_poller_shares_queue() {
        let (bus, first) = MessageBus::new();
        let second = bus.poller();
        bus.push(Message::text("A", "only once", 1));
        assert!(matches!(second.poll(), PollResult::Text { .. }));
        assert_eq!(first.poll(), PollResult::Idle);
    }
}
