//! 宿主侧句柄：引擎放在异步互斥锁后面，轮询端独立于引擎锁
//!
//! advance 持锁期间 poll 仍可用，消息随发言实时可见。

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::bus::{BusPoller, PollResult};
use crate::config::SettingsUpdate;
use crate::core::{AdvanceOutcome, EngineError, SimulationEngine, SimulationSnapshot};

#[derive(Clone)]
pub struct SimulationHandle {
    engine: Arc<Mutex<SimulationEngine>>,
    poller: BusPoller,
}

impl SimulationHandle {
    pub fn new(engine: SimulationEngine) -> Self {
        let poller = engine.poller();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            poller,
        }
    }

    pub async fn select<S: AsRef<str>>(&self, agent_ids: &[S]) -> Result<(), EngineError> {
        self.engine.lock().await.select(agent_ids)
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) {
        self.engine.lock().await.update_settings(update);
    }

    pub async fn reset(&self) {
        self.engine.lock().await.reset();
    }

    pub async fn advance(&self) -> Result<AdvanceOutcome, EngineError> {
        self.engine.lock().await.advance().await
    }

    /// 在后台任务中推进一个回合，调用方可同时 poll
    pub fn advance_in_background(&self) -> JoinHandle<Result<AdvanceOutcome, EngineError>> {
        let engine = self.engine.clone();
        tokio::spawn(async move { engine.lock().await.advance().await })
    }

    pub fn poll(&self) -> PollResult {
        self.poller.poll()
    }

    pub fn poller(&self) -> BusPoller {
        self.poller.clone()
    }

    pub async fn snapshot(&self) -> SimulationSnapshot {
        self.engine.lock().await.snapshot()
    }
}
