//! 资源账本：共享资源池与个体活力计数
//!
//! 纯记账，无 I/O。衰减会销毁资源（不回流到资源池），因此账本不满足守恒。

use std::collections::HashMap;

use crate::core::{AgentId, EngineError};

#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    global_resource: u64,
    vitality: HashMap<AgentId, u64>,
}

impl ResourceLedger {
    pub fn new(global_initial: u64) -> Self {
        Self {
            global_resource: global_initial,
            vitality: HashMap::new(),
        }
    }

    /// 登记参与者（重复登记会覆盖旧值）
    pub fn register(&mut self, id: AgentId, initial: u64) {
        self.vitality.insert(id, initial);
    }

    pub fn global_resource(&self) -> u64 {
        self.global_resource
    }

    pub fn set_global_resource(&mut self, amount: u64) {
        self.global_resource = amount;
    }

    pub fn vitality(&self, id: &AgentId) -> Option<u64> {
        self.vitality.get(id).copied()
    }

    pub fn is_alive(&self, id: &AgentId) -> bool {
        self.vitality(id).is_some_and(|v| v > 0)
    }

    pub fn replenish(&mut self, amount: u64) {
        self.global_resource = self.global_resource.saturating_add(amount);
    }

    /// 扣减活力并在 0 处截断；仅当本次调用使其从存活变为 0 时返回 true
    pub fn decay(&mut self, id: &AgentId, amount: u64) -> Result<bool, EngineError> {
        let v = self.vitality_mut(id)?;
        let before = *v;
        *v = before.saturating_sub(amount);
        Ok(before > 0 && *v == 0)
    }

    /// 从资源池提取：请求量先截到 >= 0，再截到池中余量；超额请求静默截断，不是错误
    pub fn take(&mut self, id: &AgentId, requested: i64) -> Result<u64, EngineError> {
        let clamped = u64::try_from(requested.max(0)).unwrap_or(0);
        let actual = clamped.min(self.global_resource);
        let v = self.vitality_mut(id)?;
        *v = v.saturating_add(actual);
        self.global_resource -= actual;
        Ok(actual)
    }

    fn vitality_mut(&mut self, id: &AgentId) -> Result<&mut u64, EngineError> {
        self.vitality
            .get_mut(id)
            .ok_or_else(|| EngineError::State(format!("unknown agent '{}' in ledger", id)))
    }
}
