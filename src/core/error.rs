//! 引擎错误类型
//!
//! 三类：配置错误（启动即中止）、状态错误（非法阶段调用，状态不变）、服务错误（生成 / 嵌入失败，中止当前发言）。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// 名册或经济参数缺失 / 不合法
    #[error("Config error: {0}")]
    Config(String),

    /// 在非法阶段调用操作，或引用了未知的 agent id
    #[error("State error: {0}")]
    State(String),

    /// 生成或嵌入服务调用失败、返回格式不合法
    #[error("Service error: {0}")]
    Service(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl EngineError {
    /// 服务错误可由上层重试（队列已恢复到失败前）
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Service(_))
    }
}
