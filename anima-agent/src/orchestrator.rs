//! The per-turn cognitive loop.
//!
//! ```text
//! Start → MemoryWrite → QueryBuild → Retrieve → ImportancePredict
//!       → ReflectDecision → [Reflect] → PromptAssemble → Plan
//!       → ActionDispatch → ImportanceScore → TracePersist → Done
//! ```
//!
//! Only a missing NPC, persona or world aborts a turn, and that check runs
//! before anything is written.  An index/embedding width mismatch also
//! surfaces as an error because it needs a reindex.  Every other failure
//! falls back to a documented default so the turn completes with a trace.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anima_core::memory::persona::contains_content;
use anima_core::memory::{Npc, PersonaFact, PersonaProfile, TraceHit, TurnTrace, WorldKnowledge};
use anima_core::retrieval::DimensionClassifier;
use anima_core::store::DocumentStore;
use anima_core::{
    short_id, AnimaConfig, AnimaError, EmbeddingService, FactDimension, IndexKind, MemorySource,
    MemoryTier, MemoryTiering, PipelineSet, RetrievalOutcome, Retriever, StoredMemory,
};
use anima_llm::parse::parse_tool_arguments;
use anima_llm::{ChatMessage, CompletionOutput, CompletionService, PromptEngine, PromptId};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::context::{
    conversation_block, memory_block, persona_block, reflection_block, render_prompt, world_block,
};
use crate::error::{Result, TurnError};
use crate::importance::ImportanceScorer;
use crate::observation::Observation;
use crate::query::{build_retrieval_query, recent_utterances};
use crate::reflection::{
    accept_fact_updates, emotion_delta, ReflectionSignals, ReflectionTrigger, Reflector,
};
use crate::tools::{Action, ActionResult, ToolContext, ToolRegistry};

/// Emotion assumed when the NPC state has none.
const DEFAULT_EMOTION: &str = "neutral";

/// What a turn produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    /// Turn identifier (`turn_xxxxxxxx`).
    pub turn_id: String,
    /// Trace written for this turn.
    pub trace_id: String,
    /// Action that ran.
    pub action: Action,
    /// Its outcome.
    pub result: ActionResult,
    /// Precise post-action importance.
    pub importance_score: f32,
    /// Why the scorer chose that importance.
    pub importance_justification: String,
    /// Whether the turn reflected.
    pub reflection_used: bool,
}

/// Drives NPC turns against a document store, the three indices, a
/// completion service and a tool registry.
///
/// Construct one per process and share it; turns for different NPCs can
/// run concurrently.
pub struct TurnOrchestrator {
    config: Arc<AnimaConfig>,
    store: Arc<dyn DocumentStore>,
    pipelines: PipelineSet,
    retriever: Retriever,
    tiering: MemoryTiering,
    llm: Arc<dyn CompletionService>,
    prompts: Arc<PromptEngine>,
    tools: Arc<ToolRegistry>,
    scorer: ImportanceScorer,
    reflector: Reflector,
}

impl TurnOrchestrator {
    /// Wire an orchestrator with the built-in prompt templates.
    #[must_use]
    pub fn new(
        config: AnimaConfig,
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn EmbeddingService>,
        llm: Arc<dyn CompletionService>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let pipelines = PipelineSet::from_config(&config, Arc::clone(&embedder));
        let retriever = Retriever::new(pipelines.clone(), embedder, &config.retrieval);
        let tiering = MemoryTiering::new(
            Arc::clone(&store),
            Arc::clone(pipelines.get(IndexKind::Episodic)),
            config.memory.long_term_threshold,
        );
        let prompts = Arc::new(PromptEngine::builtin());
        let scorer = ImportanceScorer::new(Arc::clone(&llm), Arc::clone(&prompts));
        let reflector = Reflector::new(Arc::clone(&llm), Arc::clone(&prompts), config.reflection.max_memories);
        Self {
            config: Arc::new(config),
            store,
            pipelines,
            retriever,
            tiering,
            llm,
            prompts,
            tools,
            scorer,
            reflector,
        }
    }

    /// Use a different prompt engine (e.g. templates loaded from disk).
    #[must_use]
    pub fn with_prompts(mut self, prompts: Arc<PromptEngine>) -> Self {
        self.scorer = ImportanceScorer::new(Arc::clone(&self.llm), Arc::clone(&prompts));
        self.reflector = Reflector::new(
            Arc::clone(&self.llm),
            Arc::clone(&prompts),
            self.config.reflection.max_memories,
        );
        self.prompts = prompts;
        self
    }

    /// Use a different dimension classifier for retrieval.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn DimensionClassifier>) -> Self {
        self.retriever = self.retriever.with_classifier(classifier);
        self
    }

    /// Global configuration.
    #[must_use]
    pub fn config(&self) -> &AnimaConfig {
        &self.config
    }

    /// The document store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The three vectorization pipelines.
    #[must_use]
    pub fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    /// The tool registry.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    // -----------------------------------------------------------------------
    // Turn
    // -----------------------------------------------------------------------

    /// Run one cognitive turn for `npc_id`.
    ///
    /// # Errors
    ///
    /// [`TurnError::NotFound`] if the NPC, its persona or its world is
    /// missing (nothing is written in that case);
    /// [`TurnError::DimensionMismatch`] if an index needs rebuilding;
    /// [`TurnError::Core`] if the document store rejects a write.
    pub async fn run_turn(&self, npc_id: &str, observation: &Observation) -> Result<TurnResult> {
        let started = Instant::now();
        let (npc, persona, world) = self.load_npc_context(npc_id).await?;
        let npc_config = npc.effective_config(&self.config);
        let turn_id = short_id("turn");
        debug!(npc_id, turn_id = %turn_id, "turn started");

        // MemoryWrite: capture prior context first so this event is not
        // part of its own conversation history.
        let summary = observation.summary();
        let prior = self
            .store
            .recent_memories(npc_id, self.config.memory.recent_memory_scan, Some(MemoryTier::Ephemeral))
            .await?;
        let utterances = recent_utterances(&prior);
        self.tiering
            .write_memory(
                npc_id,
                &summary,
                MemorySource::Observation,
                self.config.memory.observation_importance,
                vec!["observation".into()],
                Some(npc_config.importance_threshold),
            )
            .await?;

        // QueryBuild + Retrieve
        let window = self.config.memory.recent_conversation_window;
        let query = build_retrieval_query(&utterances, window, &summary, npc.current_state.goal.as_deref());
        let retrieved = self
            .retrieve_or_empty(npc_id, &query, npc_config.retrieval_top_k, observation.event_type())
            .await?;

        // ImportancePredict + ReflectDecision
        let predicted = self.scorer.predict(&summary).await;
        let previous_emotion = npc.current_state.emotion.as_deref().unwrap_or(DEFAULT_EMOTION);
        let current_emotion = observation.observed_emotion().unwrap_or(previous_emotion);
        let signals = ReflectionSignals {
            predicted_importance: predicted,
            relationship_changed: observation.relationship_changed(),
            quest_changed: observation.quest_changed(),
            emotion_delta: emotion_delta(previous_emotion, current_emotion),
            explicit_request: false,
        };
        let trigger = ReflectionTrigger {
            importance_threshold: npc_config.reflection_threshold,
            emotion_delta_threshold: self.config.reflection.emotion_delta_threshold,
        };
        let reflection_used = trigger.should_reflect(&signals);
        debug!(npc_id, ?signals, reflect = reflection_used, "reflection decision");

        let reflection_summary = if reflection_used {
            Some(self.reflect(&npc, &persona, &summary, &retrieved).await?)
        } else {
            None
        };

        // PromptAssemble
        let facts = self.visible_facts(&persona.id, npc_id).await?;
        let persona_text = persona_block(&persona, &facts, npc_config.max_facts_per_dimension);
        let world_text = world_block(&world);
        let memories_text = memory_block(
            &retrieved.results,
            self.config.prompt.max_memories,
            self.config.prompt.memory_snippet_chars,
        );
        let conversation_text = conversation_block(&utterances, window);
        let reflection_text = reflection_block(reflection_summary.as_deref());
        let (system, user) = render_prompt(
            &self.prompts,
            PromptId::Planning,
            &[
                ("persona", &persona_text),
                ("world", &world_text),
                ("memories", &memories_text),
                ("conversation", &conversation_text),
                ("observation", &summary),
                ("reflection", &reflection_text),
            ],
        );
        let prompt_snapshot = format!("{system}\n\n{user}");

        // Plan + ActionDispatch
        let (action, raw_model_output) = self.plan(npc_id, system, user).await;
        let ctx = tool_context(&npc);
        let result = self.tools.execute(&action, &ctx);

        // ImportanceScore
        let result_value = result.to_value();
        let importance = self
            .scorer
            .score(&summary, &result_value, reflection_summary.as_deref())
            .await;

        // TracePersist
        let trace = TurnTrace {
            trace_id: short_id("trace"),
            npc_id: npc_id.to_string(),
            turn_id: turn_id.clone(),
            observation: summary,
            retrieval_query: query,
            indices_searched: retrieved.indices_searched.clone(),
            retrieved: retrieved
                .results
                .iter()
                .map(|r| TraceHit {
                    index: r.index,
                    ordinal: r.ordinal,
                    similarity: r.breakdown.similarity,
                    adjusted_score: r.breakdown.adjusted,
                    source_type: r.record.source_type,
                    source_id: r.record.source_id.clone(),
                })
                .collect(),
            persona_used: Some(persona.id.clone()),
            world_used: Some(world.id.clone()),
            reflection_used,
            prompt_snapshot,
            raw_model_output,
            chosen_action: action.action_type.clone(),
            tool_arguments: Value::Object(action.arguments.clone()),
            tool_execution_result: result_value,
            importance_score: importance.score,
            created_at: Utc::now(),
        };
        self.store.insert_trace(&trace).await?;

        info!(
            npc_id,
            turn_id = %turn_id,
            trace_id = %trace.trace_id,
            action = %action.action_type,
            success = result.success,
            importance = importance.score,
            reflection_used,
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            "turn complete"
        );
        Ok(TurnResult {
            turn_id,
            trace_id: trace.trace_id,
            action,
            result,
            importance_score: importance.score,
            importance_justification: importance.justification,
            reflection_used,
        })
    }

    async fn load_npc_context(&self, npc_id: &str) -> Result<(Npc, PersonaProfile, WorldKnowledge)> {
        let npc = self.load_npc(npc_id).await?;
        let persona = self
            .store
            .get_persona(&npc.persona_id)
            .await?
            .ok_or_else(|| TurnError::not_found("persona", &npc.persona_id))?;
        let world = self
            .store
            .get_world(&npc.world_id)
            .await?
            .ok_or_else(|| TurnError::not_found("world", &npc.world_id))?;
        Ok((npc, persona, world))
    }

    async fn load_npc(&self, npc_id: &str) -> Result<Npc> {
        self.store
            .get_npc(npc_id)
            .await?
            .ok_or_else(|| TurnError::not_found("npc", npc_id))
    }

    /// Retrieval that only fails on a width mismatch.
    async fn retrieve_or_empty(
        &self,
        npc_id: &str,
        query: &str,
        k: usize,
        event_type: Option<&str>,
    ) -> Result<RetrievalOutcome> {
        match self.retriever.retrieve_for_npc(npc_id, query, k, event_type).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                warn!(npc_id, error = %err, "retrieval failed; continuing without memories");
                Ok(RetrievalOutcome {
                    query_text: query.to_string(),
                    indices_searched: self.config.retrieval.indices.clone(),
                    top_k: k,
                    results: Vec::new(),
                    relevant_dimensions: Default::default(),
                })
            }
        }
    }

    /// Reflect, store the insight, and learn any accepted facts.
    ///
    /// Returns the reflection summary for the later prompts.
    async fn reflect(
        &self,
        npc: &Npc,
        persona: &PersonaProfile,
        summary: &str,
        retrieved: &RetrievalOutcome,
    ) -> Result<String> {
        let out = self.reflector.reflect(summary, &retrieved.results, persona).await;

        // Insights are always kept long-term.
        self.tiering
            .write_memory(
                &npc.id,
                &out.insights,
                MemorySource::Reflection,
                out.importance_score,
                vec!["reflection".into()],
                Some(0.0),
            )
            .await?;

        if !out.persona_fact_updates.is_empty() {
            let existing = self.store.facts_by_persona(&persona.id).await?;
            let accepted = accept_fact_updates(
                &persona.id,
                &npc.id,
                &out.persona_fact_updates,
                &existing,
                self.config.reflection.fact_importance_threshold,
            );
            let learned = self.store_learned_facts(&accepted).await?;
            debug!(
                npc_id = %npc.id,
                candidates = out.persona_fact_updates.len(),
                learned,
                "persona facts updated from reflection"
            );
        }
        Ok(format!("Insights: {}", out.insights))
    }

    /// Insert and vectorize each fact on its own; a failure skips that fact.
    async fn store_learned_facts(&self, facts: &[PersonaFact]) -> Result<usize> {
        let pipeline = self.pipelines.get(IndexKind::Persona);
        let mut stored = 0;
        for fact in facts {
            if let Err(err) = self.store.insert_fact(fact).await {
                warn!(fact_id = %fact.id, error = %err, "failed to store learned fact; skipped");
                continue;
            }
            match pipeline.vectorize_persona_fact(fact).await {
                Ok(ordinal) => {
                    debug!(fact_id = %fact.id, ordinal, "learned fact vectorized");
                    stored += 1;
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(fact_id = %fact.id, error = %err, "failed to vectorize learned fact; skipped");
                }
            }
        }
        Ok(stored)
    }

    /// Persona facts shared by the persona or owned by this NPC.
    async fn visible_facts(&self, persona_id: &str, npc_id: &str) -> Result<Vec<PersonaFact>> {
        let mut facts = self.store.facts_by_persona(persona_id).await?;
        facts.retain(|f| f.npc_id.as_deref().is_none_or(|owner| owner == npc_id));
        Ok(facts)
    }

    /// One bounded planning call; every failure becomes `wait`.
    async fn plan(&self, npc_id: &str, system: String, user: String) -> (Action, String) {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let specs = self.tools.specs();
        let limit = Duration::from_millis(self.config.llm.plan_timeout_ms);
        match tokio::time::timeout(limit, self.llm.call_with_tools(&messages, &specs)).await {
            Ok(Ok(output)) => {
                let action = choose_action(&output, &self.tools);
                debug!(npc_id, action = %action.action_type, "action planned");
                (action, raw_output(&output))
            }
            Ok(Err(err)) => {
                warn!(npc_id, error = %err, "planning call failed; defaulting to wait");
                (
                    Action::wait("Planning unavailable", "LLM planning call failed, defaulting to wait"),
                    String::new(),
                )
            }
            Err(_) => {
                warn!(npc_id, timeout_ms = self.config.llm.plan_timeout_ms, "planning timed out; defaulting to wait");
                (
                    Action::wait("Planning timed out", "LLM planning call timed out, defaulting to wait"),
                    String::new(),
                )
            }
        }
    }

    // -----------------------------------------------------------------------
    // Other entry points
    // -----------------------------------------------------------------------

    /// Retrieve what `npc_id` may recall about `query`.
    ///
    /// `k` defaults to the NPC's configured `retrieval_top_k`.
    ///
    /// # Errors
    ///
    /// [`TurnError::NotFound`] for an unknown NPC; embedding and index
    /// errors otherwise.
    pub async fn retrieve_for_npc(&self, npc_id: &str, query: &str, k: Option<usize>) -> Result<RetrievalOutcome> {
        let npc = self.load_npc(npc_id).await?;
        let k = k.unwrap_or_else(|| npc.effective_config(&self.config).retrieval_top_k);
        Ok(self.retriever.retrieve_for_npc(npc_id, query, k, None).await?)
    }

    /// Rebuild one index from the document store.
    ///
    /// Returns the number of vectors written.  A failure part-way leaves a
    /// partial index on disk; run the reindex again.
    ///
    /// # Errors
    ///
    /// Document-store, embedding and I/O errors.
    pub async fn reindex(&self, kind: IndexKind) -> Result<usize> {
        let pipeline = self.pipelines.get(kind);
        pipeline.reindex();
        let mut written = 0;
        match kind {
            IndexKind::Episodic => {
                for memory in self.store.durable_memories().await? {
                    pipeline.vectorize_memory(&memory).await?;
                    written += 1;
                }
            }
            IndexKind::Persona => {
                for persona in self.store.list_personas().await? {
                    written += pipeline.vectorize_persona_chunks(&persona).await?.len();
                }
                let facts = self.store.all_facts().await?;
                written += pipeline.vectorize_persona_facts_bulk(&facts).await?.len();
            }
            IndexKind::World => {
                for world in self.store.list_worlds().await? {
                    written += pipeline.vectorize_world_chunks(&world).await?.len();
                }
            }
        }
        pipeline.persist()?;
        info!(index = %kind, vectors = written, "reindex complete");
        Ok(written)
    }

    /// Run a tool directly, skipping retrieval and planning.
    ///
    /// # Errors
    ///
    /// [`TurnError::NotFound`] for an unknown NPC.  Tool failures are
    /// reported in the returned result.
    pub async fn force_action(
        &self,
        npc_id: &str,
        action_type: &str,
        arguments: Map<String, Value>,
    ) -> Result<ActionResult> {
        let npc = self.load_npc(npc_id).await?;
        let action = Action {
            action_type: action_type.to_string(),
            arguments,
            reason: "Manually triggered action".into(),
        };
        info!(npc_id, action = action_type, "forced action");
        Ok(self.tools.execute(&action, &tool_context(&npc)))
    }

    /// Seed static persona facts, skipping content already present.
    ///
    /// Returns the facts that were created.
    ///
    /// # Errors
    ///
    /// [`TurnError::NotFound`] for an unknown persona; store and embedding
    /// errors otherwise.
    pub async fn seed_persona_facts(
        &self,
        persona_id: &str,
        npc_id: Option<&str>,
        facts: Vec<(FactDimension, String)>,
    ) -> Result<Vec<PersonaFact>> {
        if self.store.get_persona(persona_id).await?.is_none() {
            return Err(TurnError::not_found("persona", persona_id));
        }
        let existing = self.store.facts_by_persona(persona_id).await?;
        let mut created: Vec<PersonaFact> = Vec::new();
        for (dimension, content) in facts {
            let content = content.trim();
            if content.is_empty() || contains_content(&existing, content) || contains_content(&created, content)
            {
                continue;
            }
            created.push(PersonaFact::seeded(persona_id, npc_id.map(str::to_string), dimension, content));
        }
        for fact in &created {
            self.store.insert_fact(fact).await?;
        }
        if !created.is_empty() {
            self.pipelines
                .get(IndexKind::Persona)
                .vectorize_persona_facts_bulk(&created)
                .await?;
        }
        info!(persona_id, seeded = created.len(), "persona facts seeded");
        Ok(created)
    }

    /// Promote an ephemeral memory to durable and vectorize it.
    ///
    /// # Errors
    ///
    /// [`TurnError::NotFound`] for an unknown memory id.
    pub async fn promote_memory(&self, memory_id: &str) -> Result<StoredMemory> {
        self.tiering.promote(memory_id).await.map_err(|e| match e {
            AnimaError::NotFound { .. } => TurnError::not_found("memory", memory_id),
            other => other.into(),
        })
    }
}

fn tool_context(npc: &Npc) -> ToolContext {
    ToolContext {
        npc_id: npc.id.clone(),
        current_location: npc
            .current_state
            .location
            .clone()
            .unwrap_or_else(|| "unknown".into()),
        world_id: npc.world_id.clone(),
        persona_id: npc.persona_id.clone(),
    }
}

/// Turn planning output into an action, falling back to `wait`.
///
/// Only the first tool call counts.  It must name a registered tool and
/// carry a JSON-object argument string.
#[must_use]
pub fn choose_action(output: &CompletionOutput, tools: &ToolRegistry) -> Action {
    let Some(call) = output.tool_calls.first() else {
        return Action::wait("No tool call from LLM", "LLM did not provide a tool call, defaulting to wait");
    };
    let invalid = || Action::wait("Invalid tool call", "LLM provided invalid tool call, defaulting to wait");
    if !tools.is_valid(&call.name) {
        warn!(tool = %call.name, "model called an unregistered tool");
        return invalid();
    }
    match parse_tool_arguments(&call.arguments) {
        Ok(arguments) => {
            let text = output.text.trim();
            Action {
                action_type: call.name.clone(),
                arguments,
                reason: if text.is_empty() {
                    "No reason provided".into()
                } else {
                    text.to_string()
                },
            }
        }
        Err(err) => {
            warn!(tool = %call.name, error = %err, "model sent malformed tool arguments");
            invalid()
        }
    }
}

/// Text plus tool-call payloads, as recorded in the trace.
fn raw_output(output: &CompletionOutput) -> String {
    let mut raw = output.text.clone();
    for call in &output.tool_calls {
        if !raw.is_empty() {
            raw.push('\n');
        }
        let _ = write!(raw, "[tool_call] {}({})", call.name, call.arguments);
    }
    raw
}
