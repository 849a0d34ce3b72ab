//! 模拟引擎：回合状态机 + 发言调度
//!
//! 负责：选人、回合开始（补充资源池、扣减活力、洗牌）、逐个发言（行动 / 发言分类）、
//! 回合结束（队列清空或达到发言上限）以及向消息总线发布消息与回合状态。
//!
//! 单写者：只有持有 `&mut SimulationEngine` 的一方能修改账本、队列或向总线写入。
//! 一次发言中的生成 / 嵌入调用是挂起点；所有调用完成之前不修改任何状态，
//! 因此服务失败时回合保持在该次发言之前的样子，调用方可以直接重试 advance。

use std::time::Duration;

use crate::agent::{AgentController, WorldView};
use crate::bus::{BusPoller, BusState, Message, MessageBus};
use crate::config::{AgentProfile, SettingsUpdate, SimConfig};
use crate::core::{
    AdvanceOutcome, AdvanceStatus, AgentId, AgentStatus, EngineError, ResourceLedger, RoundState,
    SeededOrder, SimPhase, SimulationSnapshot, TurnOrder,
};
use crate::llm::{Services, TurnDecision};
use crate::memory::{embed_checked, listen_entry, AgentMemory, PreparedInteraction};

pub struct SimulationEngine {
    /// 加载时的配置（reset 恢复到这里）
    defaults: SimConfig,
    /// 当前生效的配置（含 update_settings 覆盖）
    config: SimConfig,
    services: Services,
    order: Box<dyn TurnOrder>,
    /// 顺序由配置种子构造（reset 时按种子重建）
    seeded_order: bool,
    phase: SimPhase,
    ledger: ResourceLedger,
    /// 已选参与者（按选择顺序）
    agents: Vec<AgentController>,
    round: RoundState,
    clock: u64,
    bus: MessageBus,
}

impl SimulationEngine {
    /// 使用配置中的种子（无种子则用系统熵）决定发言顺序
    pub fn new(config: SimConfig, services: Services) -> Result<Self, EngineError> {
        let order = SeededOrder::from_optional_seed(config.settings.seed);
        let mut engine = Self::with_order(config, services, Box::new(order))?;
        engine.seeded_order = true;
        Ok(engine)
    }

    pub fn with_order(
        config: SimConfig,
        services: Services,
        order: Box<dyn TurnOrder>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let (bus, _) = MessageBus::new();
        Ok(Self {
            ledger: ResourceLedger::new(config.resources.global_initial),
            defaults: config.clone(),
            config,
            services,
            order,
            seeded_order: false,
            phase: SimPhase::Uninitialized,
            agents: Vec::new(),
            round: RoundState::default(),
            clock: 0,
            bus,
        })
    }

    pub fn poller(&self) -> BusPoller {
        self.bus.poller()
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn agent(&self, id: &str) -> Option<&AgentController> {
        self.agents.iter().find(|a| a.id().as_str() == id)
    }

    /// 初始化所选参与者的活力与记忆，重置回合计数；阶段 → Selected
    pub fn select<S: AsRef<str>>(&mut self, agent_ids: &[S]) -> Result<(), EngineError> {
        let mut profiles: Vec<&AgentProfile> = Vec::with_capacity(agent_ids.len());
        for id in agent_ids {
            let id = id.as_ref();
            let profile = self
                .config
                .profile(id)
                .ok_or_else(|| EngineError::State(format!("unknown agent id '{}'", id)))?;
            if profiles.iter().any(|p| p.id == id) {
                return Err(EngineError::State(format!("agent id '{}' selected twice", id)));
            }
            profiles.push(profile);
        }

        let res = &self.config.resources;
        let settings = &self.config.settings;
        let mut ledger = ResourceLedger::new(res.global_initial);
        let mut agents = Vec::with_capacity(profiles.len());
        for profile in profiles {
            ledger.register(AgentId::new(profile.id.clone()), res.agent_initial);
            let memory = AgentMemory::new(self.services.embedder.clone(), settings.short_term_limit);
            agents.push(AgentController::new(profile, memory, settings.retrieval_top_k));
        }

        self.ledger = ledger;
        self.agents = agents;
        self.round = RoundState::default();
        self.clock = 0;
        self.phase = SimPhase::Selected;
        self.bus.clear();
        self.bus
            .push(Message::system(self.config.scenario.initial_message.clone(), self.clock));
        self.publish_state();

        tracing::info!(
            agents = ?self.agents.iter().map(|a| a.name()).collect::<Vec<_>>(),
            essence = self.ledger.global_resource(),
            "simulation initialized"
        );
        Ok(())
    }

    /// 部分覆盖经济 / 场景参数；回合开始前修改 global_initial 会同步重置资源池
    pub fn update_settings(&mut self, update: &SettingsUpdate) {
        update.apply_to(&mut self.config);
        if let Some(initial) = update.global_initial {
            if matches!(self.phase, SimPhase::Uninitialized | SimPhase::Selected) {
                self.ledger.set_global_resource(initial);
            }
        }
        self.publish_state();
        tracing::info!(?update, "settings updated");
    }

    /// 恢复到加载时的配置；阶段 → Uninitialized
    ///
    /// 由 `new` 构造的引擎会按配置种子重建发言顺序，注入的顺序策略保持不变。
    pub fn reset(&mut self) {
        self.config = self.defaults.clone();
        if self.seeded_order {
            self.order = Box::new(SeededOrder::from_optional_seed(self.config.settings.seed));
        }
        self.ledger = ResourceLedger::new(self.config.resources.global_initial);
        self.agents.clear();
        self.round = RoundState::default();
        self.clock = 0;
        self.phase = SimPhase::Uninitialized;
        self.bus.clear();
        self.publish_state();
        tracing::info!("simulation reset");
    }

    /// 推进一个完整回合：必要时先开始新回合，然后逐个发言直到回合结束
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, EngineError> {
        match self.phase {
            SimPhase::Uninitialized => {
                return Err(EngineError::State("advance() called before select()".into()));
            }
            SimPhase::Ended => return Ok(self.outcome(AdvanceStatus::SimulationEnded)),
            SimPhase::Selected | SimPhase::RoundComplete => {
                if self.round.number >= self.config.scenario.max_rounds {
                    self.end_simulation();
                    return Ok(self.outcome(AdvanceStatus::SimulationEnded));
                }
                self.start_round().await?;
                if self.phase == SimPhase::Ended {
                    return Ok(self.outcome(AdvanceStatus::SimulationEnded));
                }
            }
            // 上次 advance 因服务错误中断，从原处继续
            SimPhase::RoundActive => {}
        }

        while !self.round_should_close() {
            if let Err(e) = self.step_turn().await {
                tracing::warn!(
                    round = self.round.number,
                    turns = self.round.turns_taken,
                    "turn aborted: {}",
                    e
                );
                return Err(e);
            }
        }
        Ok(self.finish_round())
    }

    fn outcome(&self, status: AdvanceStatus) -> AdvanceOutcome {
        AdvanceOutcome {
            status,
            round_number: self.round.number,
        }
    }

    /// 回合开始：补充资源池、扣减活力、处理凋零、洗牌生成待发言队列
    ///
    /// 凋零通告要写入幸存者记忆，嵌入全部完成后才提交；失败时回合不开始，可直接重试。
    async fn start_round(&mut self) -> Result<(), EngineError> {
        let res = self.config.resources.clone();

        // 先在账本副本上结算
        let mut ledger = self.ledger.clone();
        ledger.replenish(res.global_replenish);
        let mut faded = Vec::new();
        let mut survivors = Vec::new();
        for (i, agent) in self.agents.iter().enumerate() {
            if !ledger.is_alive(agent.id()) {
                continue;
            }
            if ledger.decay(agent.id(), res.agent_decay)? {
                faded.push(i);
            } else {
                survivors.push(i);
            }
        }

        let mut notices = Vec::with_capacity(faded.len());
        for &i in &faded {
            let message = Message::system(
                format!("{} has faded away (0 essence).", self.agents[i].name()),
                self.clock,
            );
            let heard = self.prepare_heard(&message, &survivors).await?;
            notices.push((message, heard));
        }

        // 提交：先发布进行中的回合状态，再推送本回合消息
        self.round = self.round.next();
        let n = self.round.number;
        self.phase = SimPhase::RoundActive;
        self.publish_state();
        self.ledger = ledger;

        self.bus.push(Message::system(format!("Round {} begins.", n), self.clock));
        self.bus.push(Message::system(
            format!(
                "Global essence replenishes by {}. Total: {}.",
                res.global_replenish,
                self.ledger.global_resource()
            ),
            self.clock,
        ));
        for (message, heard) in notices {
            tracing::info!(round = n, "{}", message.content);
            self.bus.push(message);
            self.commit_heard(&survivors, heard);
        }

        if survivors.is_empty() {
            self.bus.push(Message::system(
                "All agents have faded. Simulation over.",
                self.clock,
            ));
            self.end_simulation();
            return Ok(());
        }

        let mut order: Vec<AgentId> = survivors
            .iter()
            .map(|&i| self.agents[i].id().clone())
            .collect();
        self.order.arrange(&mut order);
        tracing::info!(
            round = n,
            essence = self.ledger.global_resource(),
            order = ?order,
            "round started"
        );
        self.round.pending = order.into();
        Ok(())
    }

    /// 为旁听者准备同一条记忆（只嵌入一次）；无旁听者时不调用嵌入服务
    async fn prepare_heard(
        &self,
        message: &Message,
        listeners: &[usize],
    ) -> Result<Option<PreparedInteraction>, EngineError> {
        if listeners.is_empty() {
            return Ok(None);
        }
        let content = listen_entry(&message.sender, &message.content);
        let embedding = embed_checked(self.services.embedder.as_ref(), &content).await?;
        for &i in listeners {
            self.agents[i].memory().check_dimension(&embedding)?;
        }
        Ok(Some(PreparedInteraction {
            content,
            embedding,
            timestamp: message.timestamp,
        }))
    }

    fn commit_heard(&mut self, listeners: &[usize], heard: Option<PreparedInteraction>) {
        if let Some(heard) = heard {
            for &i in listeners {
                self.agents[i].memory_mut().commit(heard.clone());
            }
        }
    }

    fn round_should_close(&self) -> bool {
        self.round.pending.is_empty()
            || self.round.turns_taken >= self.config.resources.max_discussion_turns
    }

    /// 一次发言：先完成所有服务调用，再一次性提交状态变更
    async fn step_turn(&mut self) -> Result<(), EngineError> {
        let Some(id) = self.round.pending.front().cloned() else {
            return Ok(());
        };
        let idx = self.agent_index(&id)?;
        let now = self.clock + 1;

        let world = WorldView {
            scenario: &self.config.scenario.initial_message,
            global_resource: self.ledger.global_resource(),
            vitality: self.ledger.vitality(&id).unwrap_or(0),
            clock: now,
        };
        let agent = &self.agents[idx];
        let decision = agent
            .deliberate(self.services.generator.as_ref(), world)
            .await?;
        let own = agent.prepare_memorize(&decision, now).await?;

        // 行动在账本副本上结算，提交时整体替换
        let mut ledger = self.ledger.clone();
        let notice = match &decision {
            TurnDecision::Action { amount, reason } => {
                let actual = ledger.take(&id, *amount)?;
                let mut content = format!(
                    "{} took {} essence. (Global remaining: {})",
                    agent.name(),
                    actual,
                    ledger.global_resource()
                );
                if let Some(reason) = reason.as_deref().filter(|r| !r.trim().is_empty()) {
                    content.push_str(&format!(" Reason: {}", reason));
                }
                tracing::info!(
                    agent = %id,
                    requested = amount,
                    actual,
                    remaining = ledger.global_resource(),
                    "action"
                );
                Some(Message::system(content, now))
            }
            TurnDecision::Dialogue { text } if !text.is_empty() => {
                tracing::debug!(agent = %id, "dialogue");
                Some(Message::text(agent.name(), text.clone(), now))
            }
            TurnDecision::Dialogue { .. } => None,
        };

        let listeners: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(i, a)| *i != idx && self.ledger.is_alive(a.id()))
            .map(|(i, _)| i)
            .collect();

        let heard = match &notice {
            Some(message) => self.prepare_heard(message, &listeners).await?,
            None => None,
        };

        // 提交
        self.clock = now;
        self.round.pending.pop_front();
        self.round.turns_taken += 1;
        self.agents[idx].memory_mut().commit(own);
        if decision.is_action() {
            self.ledger = ledger;
            self.round.done.insert(id);
        } else {
            self.round.pending.push_back(id);
        }
        self.commit_heard(&listeners, heard);
        if let Some(msg) = notice {
            self.bus.push(msg);
        }

        let delay = self.config.settings.turn_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(())
    }

    /// 回合结束：未发言完就达到上限时强制结束并通告
    fn finish_round(&mut self) -> AdvanceOutcome {
        if !self.round.pending.is_empty() {
            self.round.pending.clear();
            self.bus.push(Message::system(
                "Discussion time limit reached. Round ending.",
                self.clock,
            ));
            tracing::info!(round = self.round.number, "discussion limit reached");
        }

        if self.round.number >= self.config.scenario.max_rounds {
            self.end_simulation();
            return self.outcome(AdvanceStatus::SimulationEnded);
        }
        self.phase = SimPhase::RoundComplete;
        self.publish_state();
        tracing::info!(
            round = self.round.number,
            turns = self.round.turns_taken,
            "round completed"
        );
        self.outcome(AdvanceStatus::RoundCompleted)
    }

    fn end_simulation(&mut self) {
        self.phase = SimPhase::Ended;
        self.publish_state();
        tracing::info!(round = self.round.number, "simulation ended");
    }

    fn publish_state(&self) {
        let finished = matches!(self.phase, SimPhase::RoundComplete | SimPhase::Ended);
        self.bus.publish(BusState {
            started: self.round.number > 0,
            round_number: self.round.number,
            max_rounds: self.config.scenario.max_rounds,
            finished: finished && self.round.number > 0,
            ended: self.phase == SimPhase::Ended,
        });
    }

    fn agent_index(&self, id: &AgentId) -> Result<usize, EngineError> {
        self.agents
            .iter()
            .position(|a| a.id() == id)
            .ok_or_else(|| EngineError::State(format!("agent '{}' is not selected", id)))
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            phase: self.phase,
            round_number: self.round.number,
            turns_taken: self.round.turns_taken,
            global_resource: self.ledger.global_resource(),
            clock: self.clock,
            agents: self
                .agents
                .iter()
                .map(|a| {
                    let vitality = self.ledger.vitality(a.id()).unwrap_or(0);
                    AgentStatus {
                        id: a.id().clone(),
                        name: a.name().to_string(),
                        vitality,
                        alive: vitality > 0,
                    }
                })
                .collect(),
            pending: self.round.pending.iter().cloned().collect(),
            done: {
                let mut done: Vec<AgentId> = self.round.done.iter().cloned().collect();
                done.sort();
                done
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::PollResult;
    use crate::config::AgentProfile;
    use crate::core::FixedOrder;
    use crate::llm::{EmbeddingService, HashEmbedder, ScriptedGenerator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// 开关控制的嵌入服务，用于模拟发言中途失败
    #[derive(Default)]
    struct SwitchEmbedder {
        down: AtomicBool,
        inner: HashEmbedder,
    }

    #[async_trait]
    impl EmbeddingService for SwitchEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
            if self.down.load(Ordering::SeqCst) {
                return Err("embedding backend unavailable".into());
            }
            Ok(self.inner.embed_text(text))
        }
    }

    fn config() -> SimConfig {
        let mut cfg = SimConfig::default();
        cfg.agents = vec![
            AgentProfile {
                id: "a".into(),
                name: "Ada".into(),
                personality: "Careful.".into(),
            },
            AgentProfile {
                id: "b".into(),
                name: "Bram".into(),
                personality: "Greedy.".into(),
            },
        ];
        cfg
    }

    fn engine(generator: Arc<ScriptedGenerator>) -> SimulationEngine {
        let services = Services::new(generator, Arc::new(HashEmbedder::default()));
        SimulationEngine::with_order(config(), services, Box::new(FixedOrder)).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let services = Services::mock();
        let err = SimulationEngine::new(SimConfig::default(), services).err();
        assert!(matches!(err, Some(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_advance_before_select_is_state_error() {
        let mut eng = engine(Arc::new(ScriptedGenerator::default()));
        assert!(matches!(eng.advance().await, Err(EngineError::State(_))));
        assert_eq!(eng.phase(), SimPhase::Uninitialized);
    }

    #[test]
    fn test_select_rejects_unknown_and_duplicate_ids() {
        let mut eng = engine(Arc::new(ScriptedGenerator::default()));
        assert!(matches!(eng.select(&["a", "zed"]), Err(EngineError::State(_))));
        assert!(matches!(eng.select(&["a", "a"]), Err(EngineError::State(_))));
        assert_eq!(eng.phase(), SimPhase::Uninitialized);
        assert!(eng.snapshot().agents.is_empty());
    }

    #[test]
    fn test_select_initializes_and_announces_scenario() {
        let mut eng = engine(Arc::new(ScriptedGenerator::default()));
        let poller = eng.poller();
        eng.select(&["b", "a"]).unwrap();

        let snap = eng.snapshot();
        assert_eq!(snap.phase, SimPhase::Selected);
        assert_eq!(snap.global_resource, 50);
        assert_eq!(snap.agents.len(), 2);
        assert_eq!(snap.agents[0].name, "Bram");
        assert!(snap.agents.iter().all(|a| a.vitality == 50 && a.alive));

        match poller.poll() {
            PollResult::System { content, .. } => assert_eq!(content, "Simulation Start."),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(poller.poll(), PollResult::Idle);
    }

    #[test]
    fn test_update_settings_before_first_round_resets_pool() {
        let mut eng = engine(Arc::new(ScriptedGenerator::default()));
        eng.select(&["a"]).unwrap();
        eng.update_settings(&SettingsUpdate {
            global_initial: Some(120),
            max_rounds: Some(2),
            ..Default::default()
        });
        assert_eq!(eng.ledger().global_resource(), 120);
        assert_eq!(eng.config().scenario.max_rounds, 2);
    }

    #[tokio::test]
    async fn test_reset_restores_loaded_config() {
        let mut eng = engine(Arc::new(ScriptedGenerator::default()));
        eng.select(&["a", "b"]).unwrap();
        eng.update_settings(&SettingsUpdate {
            agent_decay: Some(1),
            ..Default::default()
        });
        eng.advance().await.unwrap();
        eng.reset();

        assert_eq!(eng.phase(), SimPhase::Uninitialized);
        assert_eq!(eng.config().resources.agent_decay, 10);
        assert_eq!(eng.round().number, 0);
        assert_eq!(eng.clock(), 0);
        assert_eq!(eng.poller().poll(), PollResult::Idle);
    }

    #[tokio::test]
    async fn test_round_message_sequence() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .script("Ada", [TurnDecision::dialogue("Share it.")])
                .script("Bram", [TurnDecision::action(12, Some("mine"))]),
        );
        let mut eng = engine(generator);
        let poller = eng.poller();
        eng.select(&["a", "b"]).unwrap();
        let outcome = eng.advance().await.unwrap();
        assert_eq!(outcome.status, AdvanceStatus::RoundCompleted);
        assert_eq!(outcome.round_number, 1);

        let contents: Vec<String> = poller.drain().into_iter().map(|m| m.content).collect();
        assert_eq!(
            contents,
            vec![
                "Simulation Start.",
                "Round 1 begins.",
                "Global essence replenishes by 0. Total: 50.",
                "Share it.",
                "Bram took 12 essence. (Global remaining: 38) Reason: mine",
                "Ada took 0 essence. (Global remaining: 38)",
            ]
        );
        assert_eq!(poller.poll(), PollResult::TurnOver);

        // Ada 的记忆：自己的发言、Bram 的行动公告、自己的行动
        let ada = eng.agent("a").unwrap();
        assert_eq!(
            ada.memory().get_short_term_context(),
            "[1] Me: Share it.\n\
             [2] SYSTEM: Bram took 12 essence. (Global remaining: 38) Reason: mine\n\
             [3] [ACTION] took 0 essence. Reason: "
        );
        // Bram 锁定后仍会听到 Ada 的行动公告
        let bram = eng.agent("b").unwrap();
        assert_eq!(
            bram.memory().get_short_term_context(),
            "[1] Ada: Share it.\n\
             [2] [ACTION] took 12 essence. Reason: mine\n\
             [3] SYSTEM: Ada took 0 essence. (Global remaining: 38)"
        );
    }

    #[tokio::test]
    async fn test_failed_embedding_leaves_turn_uncommitted() {
        let generator = Arc::new(
            ScriptedGenerator::default()
                .script("Ada", [TurnDecision::action(20, None), TurnDecision::action(20, None)]),
        );
        let embedder = Arc::new(SwitchEmbedder::default());
        let services = Services::new(generator.clone(), embedder.clone());
        let mut eng =
            SimulationEngine::with_order(config(), services, Box::new(FixedOrder)).unwrap();
        eng.select(&["a", "b"]).unwrap();

        embedder.down.store(true, Ordering::SeqCst);
        let err = eng.advance().await.unwrap_err();
        assert!(matches!(err, EngineError::Service(_)));
        assert_eq!(eng.phase(), SimPhase::RoundActive);
        let snap = eng.snapshot();
        assert_eq!(snap.turns_taken, 0);
        assert_eq!(snap.clock, 0);
        assert_eq!(snap.global_resource, 50);
        assert_eq!(snap.pending, vec![AgentId::from("a"), AgentId::from("b")]);
        assert!(eng.agent("a").unwrap().memory().short_term().is_empty());

        // 恢复后重试，从同一个发言者继续
        embedder.down.store(false, Ordering::SeqCst);
        let outcome = eng.advance().await.unwrap();
        assert_eq!(outcome.status, AdvanceStatus::RoundCompleted);
        assert_eq!(eng.ledger().global_resource(), 30);
        assert_eq!(eng.ledger().vitality(&AgentId::from("a")), Some(60));
    }
}
