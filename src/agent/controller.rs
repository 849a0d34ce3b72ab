//! 参与者控制器：单次发言的 recall → generate → memorize
//!
//! 严格串行，无内部并发。memorize 只准备自己这次发言的记忆条目，由调度器连同整次发言一起提交；
//! 他人的记忆由调度器的广播步骤更新。

use crate::agent::EmotionalState;
use crate::config::AgentProfile;
use crate::core::{AgentId, EngineError};
use crate::llm::{GenerationService, TurnContext, TurnDecision};
use crate::memory::{AgentMemory, PreparedInteraction};

/// Recall 阶段的产物
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recall {
    pub recent: String,
    pub memories: Vec<String>,
}

/// 发言时刻的外部状态（由调度器提供）
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    pub scenario: &'a str,
    pub global_resource: u64,
    pub vitality: u64,
    pub clock: u64,
}

pub struct AgentController {
    id: AgentId,
    name: String,
    personality: String,
    memory: AgentMemory,
    retrieval_top_k: usize,
}

impl AgentController {
    pub fn new(profile: &AgentProfile, memory: AgentMemory, retrieval_top_k: usize) -> Self {
        Self {
            id: AgentId::new(profile.id.clone()),
            name: profile.name.clone(),
            personality: profile.personality.clone(),
            memory,
            retrieval_top_k,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut AgentMemory {
        &mut self.memory
    }

    /// 以短期记忆原文作为查询检索长期记忆；短期为空时不检索
    pub async fn recall(&self) -> Result<Recall, EngineError> {
        let recent = self.memory.get_short_term_context();
        let memories = if recent.is_empty() {
            Vec::new()
        } else {
            self.memory
                .retrieve_relevant(&recent, self.retrieval_top_k)
                .await?
        };
        Ok(Recall { recent, memories })
    }

    pub fn build_context(&self, recall: Recall, world: WorldView<'_>) -> TurnContext {
        TurnContext {
            agent_name: self.name.clone(),
            personality: self.personality.clone(),
            scenario: world.scenario.to_string(),
            global_resource: world.global_resource,
            vitality: world.vitality,
            emotional_state: EmotionalState::from_vitality(world.vitality),
            memories: recall.memories,
            recent: recall.recent,
            clock: world.clock,
        }
    }

    /// recall + generate，不修改任何状态
    pub async fn deliberate(
        &self,
        generator: &dyn GenerationService,
        world: WorldView<'_>,
    ) -> Result<TurnDecision, EngineError> {
        let recall = self.recall().await?;
        let context = self.build_context(recall, world);
        generator.complete(&context).await.map_err(|e| {
            tracing::warn!(agent = %self.id, backend = generator.name(), "generation failed: {}", e);
            EngineError::Service(e)
        })
    }

    /// memorize：为本次发言结果准备记忆条目（已嵌入，尚未写入）
    pub async fn prepare_memorize(
        &self,
        decision: &TurnDecision,
        clock: u64,
    ) -> Result<PreparedInteraction, EngineError> {
        self.memory
            .prepare_interaction(&memory_entry(decision), clock)
            .await
    }
}

/// 自己这次发言在记忆中的写法
pub fn memory_entry(decision: &TurnDecision) -> String {
    match decision {
        TurnDecision::Action { amount, reason } => format!(
            "[ACTION] took {} essence. Reason: {}",
            amount,
            reason.as_deref().unwrap_or("")
        ),
        TurnDecision::Dialogue { text } => format!("Me: {}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{HashEmbedder, ScriptedGenerator};
    use crate::memory::listen_entry;
    use std::sync::Arc;

    fn controller() -> AgentController {
        let profile = AgentProfile {
            id: "elias".into(),
            name: "Elias".into(),
            personality: "A weary archivist.".into(),
        };
        let memory = AgentMemory::new(Arc::new(HashEmbedder::default()), 5);
        AgentController::new(&profile, memory, 3)
    }

    fn world(vitality: u64, clock: u64) -> WorldView<'static> {
        WorldView {
            scenario: "The light is fading.",
            global_resource: 40,
            vitality,
            clock,
        }
    }

    #[test]
    fn test_memory_entry_format() {
        assert_eq!(
            memory_entry(&TurnDecision::action(12, Some("hungry"))),
            "[ACTION] took 12 essence. Reason: hungry"
        );
        assert_eq!(
            memory_entry(&TurnDecision::action(0, None)),
            "[ACTION] took 0 essence. Reason: "
        );
        assert_eq!(memory_entry(&TurnDecision::dialogue("hi")), "Me: hi");
    }

    #[tokio::test]
    async fn test_first_turn_has_no_recall() {
        let agent = controller();
        let recall = agent.recall().await.unwrap();
        assert_eq!(recall, Recall::default());
    }

    #[tokio::test]
    async fn test_turn_builds_context_and_memorizes() {
        let mut agent = controller();
        agent
            .memory_mut()
            .add_interaction(&listen_entry("Mara", "The pool is shrinking."), 1)
            .await
            .unwrap();

        let generator = ScriptedGenerator::new(TurnDecision::dialogue("unused"))
            .script("Elias", [TurnDecision::dialogue("Then we share it.")]);
        let decision = agent.deliberate(&generator, world(85, 2)).await.unwrap();
        assert_eq!(decision, TurnDecision::dialogue("Then we share it."));
        // 准备阶段不写入
        let prepared = agent.prepare_memorize(&decision, 2).await.unwrap();
        assert_eq!(agent.memory().short_term().len(), 1);
        agent.memory_mut().commit(prepared);

        let seen = generator.seen();
        assert_eq!(seen.len(), 1);
        let ctx = &seen[0];
        assert_eq!(ctx.agent_name, "Elias");
        assert_eq!(ctx.personality, "A weary archivist.");
        assert_eq!(ctx.global_resource, 40);
        assert_eq!(ctx.emotional_state, EmotionalState::Safe);
        assert_eq!(ctx.recent, "[1] Mara: The pool is shrinking.");
        assert_eq!(ctx.memories, vec!["[1] Mara: The pool is shrinking."]);

        assert_eq!(
            agent.memory().get_short_term_context(),
            "[1] Mara: The pool is shrinking.\n[2] Me: Then we share it."
        );
    }

    #[tokio::test]
    async fn test_generation_failure_is_service_error_and_no_memory_written() {
        let agent_gen = ScriptedGenerator::default();
        agent_gen.fail_next("Elias", "timeout");
        let agent = controller();
        let err = agent.deliberate(&agent_gen, world(50, 1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Service(_)));
        assert!(agent.memory().short_term().is_empty());
    }
}
