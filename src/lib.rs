//! Fading Light - 多智能体资源争夺模拟
//!
//! 若干参与者共享一个会衰减的资源池（essence），每回合轮流发言或提取资源。
//!
//! 模块划分：
//! - **agent**: 参与者控制器与情绪档位
//! - **bus**: 消息总线（广播出件箱 + 轮询信号）
//! - **config**: 配置加载（TOML / YAML + 环境变量）与校验
//! - **core**: 错误、状态、资源账本、发言顺序、模拟引擎与宿主句柄
//! - **llm**: 生成 / 嵌入服务抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 短期 / 长期双层记忆
//! - **observability**: 日志初始化

pub mod agent;
pub mod bus;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;

pub use crate::config::{load_config, SettingsUpdate, SimConfig};
pub use crate::core::{EngineError, SimulationEngine, SimulationHandle};
