//! 核心层：错误、状态、资源账本、发言顺序、模拟引擎与宿主句柄

pub mod engine;
pub mod error;
pub mod handle;
pub mod ledger;
pub mod order;
pub mod state;

pub use engine::SimulationEngine;
pub use error::EngineError;
pub use handle::SimulationHandle;
pub use ledger::ResourceLedger;
pub use order::{FixedOrder, SeededOrder, TurnOrder};
pub use state::{
    AdvanceOutcome, AdvanceStatus, AgentId, AgentStatus, RoundState, SimPhase, SimulationSnapshot,
};
