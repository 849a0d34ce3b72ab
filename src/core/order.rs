//! 发言顺序策略：回合开始时对存活参与者洗牌
//!
//! 由宿主注入；测试用固定种子或 FixedOrder 获得确定的发言顺序。

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::core::AgentId;

pub trait TurnOrder: Send + Sync {
    /// 原地重排本回合的发言顺序
    fn arrange(&mut self, agents: &mut [AgentId]);
}

/// 基于 SmallRng 的随机顺序；同一种子得到同一序列
pub struct SeededOrder {
    rng: SmallRng,
}

impl SeededOrder {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// 有种子用种子，否则用系统熵
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map(Self::from_seed).unwrap_or_else(Self::from_entropy)
    }
}

impl TurnOrder for SeededOrder {
    fn arrange(&mut self, agents: &mut [AgentId]) {
        agents.shuffle(&mut self.rng);
    }
}

/// 保持选中顺序不变
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedOrder;

impl TurnOrder for FixedOrder {
    fn arrange(&mut self, _agents: &mut [AgentId]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<AgentId> {
        ["a", "b", "c", "d", "e", "f"].into_iter().map(AgentId::from).collect()
    }

    #[test]
    fn test_same_seed_same_order() {
        let mut first = ids();
        let mut second = ids();
        SeededOrder::from_seed(42).arrange(&mut first);
        SeededOrder::from_seed(42).arrange(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut order = SeededOrder::from_seed(7);
        let mut agents = ids();
        order.arrange(&mut agents);
        let mut sorted = agents.clone();
        sorted.sort();
        assert_eq!(sorted, ids());
    }

    #[test]
    fn test_fixed_order_keeps_input() {
        let mut agents = ids();
        FixedOrder.arrange(&mut agents);
        assert_eq!(agents, ids());
    }
}
