//! 模拟配置：从 config/default.{toml,yaml} 与环境变量加载
//!
//! 加载顺序：先读默认配置文件，再读显式传入的文件，最后用环境变量 `FADING__*` 覆盖
//! （双下划线表示嵌套，如 `FADING__RESOURCES__AGENT_DECAY=5`）。

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::EngineError;

/// 配置根（对应配置文件的顶层）
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SimConfig {
    /// 参与者名册
    pub agents: Vec<AgentProfile>,
    pub resources: ResourcesSection,
    pub scenario: ScenarioSection,
    pub settings: SettingsSection,
    pub llm: LlmSection,
}

/// [[agents]]：单个参与者的身份与人格描述
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    /// 人格描述（原样传给生成服务）
    #[serde(default)]
    pub personality: String,
}

/// [resources] 段：共享资源池与个体活力的经济参数
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResourcesSection {
    pub global_initial: u64,
    pub global_replenish: u64,
    pub agent_initial: u64,
    pub agent_decay: u64,
    /// 单回合内的发言 + 行动总次数上限
    pub max_discussion_turns: u32,
}

impl Default for ResourcesSection {
    fn default() -> Self {
        Self {
            global_initial: 50,
            global_replenish: 0,
            agent_initial: 50,
            agent_decay: 10,
            max_discussion_turns: 20,
        }
    }
}

/// [scenario] 段：开场白与回合数
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScenarioSection {
    pub initial_message: String,
    pub max_rounds: u32,
}

impl Default for ScenarioSection {
    fn default() -> Self {
        Self {
            initial_message: "Simulation Start.".to_string(),
            max_rounds: 5,
        }
    }
}

/// [settings] 段：记忆容量、检索条数、随机种子、回合节奏
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SettingsSection {
    /// 短期记忆条数上限
    pub short_term_limit: usize,
    /// 长期记忆检索条数
    pub retrieval_top_k: usize,
    /// 发言顺序的随机种子；未设置时使用系统熵
    pub seed: Option<u64>,
    /// 两次发言之间的停顿（毫秒），0 表示不停顿
    pub turn_delay_ms: u64,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            short_term_limit: 5,
            retrieval_top_k: 3,
            seed: None,
            turn_delay_ms: 0,
        }
    }
}

/// [llm] 段：生成 / 嵌入后端选择
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmSection {
    /// mock / openai
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub embedding_model: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

impl SimConfig {
    /// 校验名册与参数；不合法时返回 ConfigError，启动应就此中止
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.agents.is_empty() {
            return Err(EngineError::Config("agent roster is empty".into()));
        }
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(EngineError::Config("agent id must not be blank".into()));
            }
            if agent.name.trim().is_empty() {
                return Err(EngineError::Config(format!(
                    "agent '{}' has a blank name",
                    agent.id
                )));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
        }
        if self.settings.short_term_limit == 0 {
            return Err(EngineError::Config(
                "settings.short_term_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn profile(&self, id: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.id == id)
    }
}

/// update_settings 的部分覆盖：只有出现的字段才会生效
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SettingsUpdate {
    pub global_initial: Option<u64>,
    pub global_replenish: Option<u64>,
    pub agent_initial: Option<u64>,
    pub agent_decay: Option<u64>,
    pub max_discussion_turns: Option<u32>,
    pub initial_message: Option<String>,
    pub max_rounds: Option<u32>,
}

impl SettingsUpdate {
    /// 将出现的字段写入配置
    pub fn apply_to(&self, cfg: &mut SimConfig) {
        let res = &mut cfg.resources;
        if let Some(v) = self.global_initial {
            res.global_initial = v;
        }
        if let Some(v) = self.global_replenish {
            res.global_replenish = v;
        }
        if let Some(v) = self.agent_initial {
            res.agent_initial = v;
        }
        if let Some(v) = self.agent_decay {
            res.agent_decay = v;
        }
        if let Some(v) = self.max_discussion_turns {
            res.max_discussion_turns = v;
        }
        if let Some(ref v) = self.initial_message {
            cfg.scenario.initial_message = v.clone();
        }
        if let Some(v) = self.max_rounds {
            cfg.scenario.max_rounds = v;
        }
    }
}

/// 加载并校验配置
///
/// 1. 按顺序查找 config/default、../config/default（toml 或 yaml），找到则作为第一源
/// 2. 若传入 config_path 则追加该文件（文件必须存在，可覆盖前面的键）
/// 3. 最后叠加环境变量 FADING__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<SimConfig, EngineError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default"];
    'outer: for name in default_names {
        for ext in ["toml", "yaml", "yml"] {
            if std::path::Path::new(&format!("{}.{}", name, ext)).exists() {
                builder = builder.add_source(config::File::with_name(name).required(false));
                break 'outer;
            }
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FADING")
            .separator("__")
            .try_parsing(true),
    );

    let cfg: SimConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}
