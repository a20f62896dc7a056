// SPDX-License-Identifier: MIT

//! Retrieval agent - bounded decide/retrieve loop ending in one answer call
//!
//! ```text
//! received -> deciding -> retrieving -> reasoning -> deciding ... -> answering -> done
//! ```
//!
//! The loop is capped at `max_iterations` decisions. Hitting the cap moves
//! straight to `answering` with whatever passages were gathered and flags
//! the answer as incomplete.

use once_cell::sync::Lazy;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::knowledge::{Passage, Retriever};
use super::prompts::{answer_prompt, decision_prompt, ANSWER_SYSTEM, DECISION_SYSTEM};
use crate::adk::cancel::CancellationFlag;
use crate::adk::client::{LlmClient, RawOutput, RetryPolicy, ValidatedCallError};
use crate::adk::error::{PipelineError, SchemaViolation};
use crate::adk::trail::{ErrorEntry, ErrorTrail, RunStatus};
use crate::adk::usage::{UsageMeter, UsageSummary};
use crate::cvsense::config::RagConfig;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    Retrieve,
    Answer,
}

/// Validated output of a decision call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Decision {
    pub action: AgentAction,
    /// Refined retrieval query
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

static DECISION_SCHEMA: Lazy<Value> =
    Lazy::new(|| serde_json::to_value(schema_for!(Decision)).unwrap_or(Value::Null));

fn validate_decision(raw: &RawOutput) -> Result<Decision, SchemaViolation> {
    serde_json::from_value(raw.json()?)
        .map_err(|e| SchemaViolation::new(format!("does not match decision: {}", e)))
}

/// One entry of the decision trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub iteration: u32,
    pub action: AgentAction,
    pub query: Option<String>,
    pub reason: Option<String>,
    /// Decision came from the heuristic, not the model
    pub fallback: bool,
    /// New passages the retrieval added
    pub retrieved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitedSource {
    pub id: String,
    /// First 200 chars, with "..." when cut
    pub excerpt: String,
    pub score: f32,
    /// Chunk metadata from the store, e.g. doc_id and title
    pub metadata: Value,
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}

/// Final payload of one query-answer cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub query: String,
    pub answer: String,
    pub passage_ids: Vec<String>,
    pub sources: Vec<CitedSource>,
    pub usage: UsageSummary,
    pub status: RunStatus,
    /// The loop was cut short; the answer may miss information
    pub incomplete: bool,
    pub iterations: u32,
    pub trace: Vec<DecisionRecord>,
    pub errors: Vec<ErrorEntry>,
}

/// Progress events emitted by [`RetrievalAgent::run_stream`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Decision {
        iteration: u32,
        action: AgentAction,
        query: Option<String>,
        reason: Option<String>,
        fallback: bool,
    },
    Retrieval {
        iteration: u32,
        query: String,
        new_passages: usize,
        total_passages: usize,
    },
    Answer(Box<AgentAnswer>),
    Error(ErrorEntry),
}

/// Context of one query-answer cycle
#[derive(Debug)]
pub struct AgentState {
    query: String,
    passages: Vec<Passage>,
    seen: HashSet<String>,
    queries: Vec<String>,
    iteration: u32,
    answer: Option<String>,
    incomplete: bool,
    trace: Vec<DecisionRecord>,
    usage: UsageMeter,
    errors: ErrorTrail,
}

impl AgentState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            passages: Vec::new(),
            seen: HashSet::new(),
            queries: Vec::new(),
            iteration: 0,
            answer: None,
            incomplete: false,
            trace: Vec::new(),
            usage: UsageMeter::new(),
            errors: ErrorTrail::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Retrieved passages in arrival order
    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn trace(&self) -> &[DecisionRecord] {
        &self.trace
    }

    /// Append passages not seen before; returns how many were new
    pub fn add_passages(&mut self, hits: Vec<Passage>) -> usize {
        let before = self.passages.len();
        for hit in hits {
            if self.seen.insert(hit.id.clone()) {
                self.passages.push(hit);
            }
        }
        self.passages.len() - before
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AgentStage {
    Received,
    Deciding,
    Retrieving(String),
    Reasoning(Vec<Passage>),
    Answering { incomplete: bool },
    Done,
    Failed,
}

impl AgentStage {
    fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Deciding => "deciding",
            Self::Retrieving(_) => "retrieving",
            Self::Reasoning(_) => "reasoning",
            Self::Answering { .. } => "answering",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

type Events<'a> = Option<&'a mpsc::Sender<AgentEvent>>;

async fn emit(events: Events<'_>, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

pub struct RetrievalAgent {
    name: String,
    client: LlmClient,
    retriever: Arc<dyn Retriever>,
    config: RagConfig,
}

impl RetrievalAgent {
    pub fn new(client: LlmClient, retriever: Arc<dyn Retriever>, config: RagConfig) -> Self {
        Self {
            name: "rag-agent".to_string(),
            client,
            retriever,
            config,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn run(&self, query: &str, cancel: &CancellationFlag) -> AgentAnswer {
        self.drive(query, cancel, None).await
    }

    /// Like [`run`](Self::run), also sending progress events to `tx`. The
    /// last event is always the answer.
    pub async fn run_stream(
        &self,
        query: &str,
        cancel: &CancellationFlag,
        tx: mpsc::Sender<AgentEvent>,
    ) -> AgentAnswer {
        let answer = self.drive(query, cancel, Some(&tx)).await;
        let _ = tx.send(AgentEvent::Answer(Box::new(answer.clone()))).await;
        answer
    }

    async fn drive(&self, query: &str, cancel: &CancellationFlag, events: Events<'_>) -> AgentAnswer {
        let mut state = AgentState::new(query);
        let mut stage = AgentStage::Received;

        while !stage.is_terminal() {
            if cancel.is_cancelled() {
                let err = PipelineError::Cancelled(stage.name().to_string());
                self.record(&mut state, stage.name(), None, &err, 0, events)
                    .await;
                stage = AgentStage::Failed;
                break;
            }
            log::debug!("Agent {} stage {}", self.name, stage.name());
            stage = self.step(stage, &mut state, events).await;
        }

        self.finish(state, stage)
    }

    async fn step(&self, stage: AgentStage, state: &mut AgentState, events: Events<'_>) -> AgentStage {
        match stage {
            AgentStage::Received => AgentStage::Deciding,
            AgentStage::Deciding => self.decide(state, events).await,
            AgentStage::Retrieving(query) => self.retrieve(query, state, events).await,
            AgentStage::Reasoning(hits) => self.reason(hits, state, events).await,
            AgentStage::Answering { incomplete } => self.answer(incomplete, state, events).await,
            AgentStage::Done | AgentStage::Failed => stage,
        }
    }

    async fn record(
        &self,
        state: &mut AgentState,
        stage: &str,
        scope: Option<String>,
        err: &PipelineError,
        attempts: u32,
        events: Events<'_>,
    ) {
        state.errors.record_error(stage, scope, err, attempts);
        if let Some(entry) = state.errors.entries().last() {
            emit(events, AgentEvent::Error(entry.clone())).await;
        }
    }

    /// Used when the model's decision cannot be read
    fn fallback_decision(&self, state: &AgentState) -> Decision {
        if state.passages.is_empty() {
            Decision {
                action: AgentAction::Retrieve,
                query: Some(state.query.clone()),
                reason: Some("no passages yet".to_string()),
            }
        } else {
            Decision {
                action: AgentAction::Answer,
                query: None,
                reason: Some("passages available".to_string()),
            }
        }
    }

    async fn decide(&self, state: &mut AgentState, events: Events<'_>) -> AgentStage {
        let max = self.config.max_iterations;
        if state.iteration >= max {
            log::warn!("Agent {} reached max iterations ({})", self.name, max);
            let err = PipelineError::BudgetExceeded(format!(
                "stopped after {} iterations with {} passages",
                max,
                state.passages.len()
            ));
            self.record(state, "deciding", None, &err, 0, events).await;
            return AgentStage::Answering { incomplete: true };
        }

        state.iteration += 1;
        log::info!("Agent {} iteration {}/{}", self.name, state.iteration, max);

        let prompt = decision_prompt(
            &state.query,
            &state.passages,
            &state.queries,
            state.iteration,
            max,
        );
        let outcome = self
            .client
            .invoke_validated(
                "deciding",
                DECISION_SYSTEM,
                &prompt,
                &DECISION_SCHEMA,
                RetryPolicy::new(0, Duration::ZERO),
                &mut state.usage,
                validate_decision,
            )
            .await;

        let (decision, fallback) = match outcome {
            Ok((decision, _)) => (decision, false),
            Err(ValidatedCallError::Schema { violation, .. }) => {
                log::warn!("Agent {} decision unreadable: {}", self.name, violation);
                (self.fallback_decision(state), true)
            }
            Err(ValidatedCallError::Model { error, attempts }) => {
                let err = PipelineError::ModelCall(error.to_string());
                self.record(state, "deciding", None, &err, attempts, events)
                    .await;
                (self.fallback_decision(state), true)
            }
        };

        let query = match decision.action {
            AgentAction::Retrieve => Some(
                decision
                    .query
                    .as_deref()
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .unwrap_or(&state.query)
                    .to_string(),
            ),
            AgentAction::Answer => None,
        };

        state.trace.push(DecisionRecord {
            iteration: state.iteration,
            action: decision.action,
            query: query.clone(),
            reason: decision.reason.clone(),
            fallback,
            retrieved: 0,
        });
        emit(
            events,
            AgentEvent::Decision {
                iteration: state.iteration,
                action: decision.action,
                query: query.clone(),
                reason: decision.reason,
                fallback,
            },
        )
        .await;

        match query {
            Some(query) => AgentStage::Retrieving(query),
            None => AgentStage::Answering { incomplete: false },
        }
    }

    async fn retrieve(&self, query: String, state: &mut AgentState, events: Events<'_>) -> AgentStage {
        let policy = self.config.retrieval_policy();
        let mut last_error = String::new();

        for attempt in 1..=policy.max_attempts() {
            let delay = policy.delay_for(attempt);
            if !delay.is_zero() {
                log::warn!(
                    "Agent {} retrieval attempt {} failed, retrying after {}ms...",
                    self.name,
                    attempt - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            match self.retriever.retrieve(&query, self.config.top_k).await {
                Ok(hits) => {
                    state.queries.push(query);
                    return AgentStage::Reasoning(hits);
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        let err = PipelineError::Retrieval(last_error);
        self.record(
            state,
            "retrieving",
            Some(query.clone()),
            &err,
            policy.max_attempts(),
            events,
        )
        .await;
        state.queries.push(query);

        if state.passages.is_empty() {
            AgentStage::Failed
        } else {
            AgentStage::Answering { incomplete: true }
        }
    }

    async fn reason(&self, hits: Vec<Passage>, state: &mut AgentState, events: Events<'_>) -> AgentStage {
        let min_score = self.config.min_score;
        let relevant: Vec<Passage> = hits.into_iter().filter(|p| p.score >= min_score).collect();
        let added = state.add_passages(relevant);

        if let Some(last) = state.trace.last_mut() {
            last.retrieved = added;
        }
        log::info!(
            "Agent {} gathered {} new passages ({} total)",
            self.name,
            added,
            state.passages.len()
        );
        emit(
            events,
            AgentEvent::Retrieval {
                iteration: state.iteration,
                query: state.queries.last().cloned().unwrap_or_default(),
                new_passages: added,
                total_passages: state.passages.len(),
            },
        )
        .await;
        AgentStage::Deciding
    }

    async fn answer(&self, incomplete: bool, state: &mut AgentState, events: Events<'_>) -> AgentStage {
        state.incomplete = incomplete;
        let prompt = answer_prompt(&state.query, &state.passages, incomplete);

        match self
            .client
            .invoke("answering", ANSWER_SYSTEM, &prompt, None, &mut state.usage)
            .await
        {
            Ok(raw) => {
                state.answer = Some(raw.text().trim().to_string());
                AgentStage::Done
            }
            Err(error) => {
                let err = PipelineError::ModelCall(error.to_string());
                self.record(state, "answering", None, &err, 1, events).await;
                AgentStage::Failed
            }
        }
    }

    fn finish(&self, state: AgentState, stage: AgentStage) -> AgentAnswer {
        let status = if stage == AgentStage::Failed {
            RunStatus::Failed
        } else if !state.errors.is_empty() || state.incomplete {
            RunStatus::Partial
        } else {
            RunStatus::Complete
        };

        log::info!(
            "Agent {} finished: {:?} after {} iterations, {} passages",
            self.name,
            status,
            state.iteration,
            state.passages.len()
        );

        AgentAnswer {
            query: state.query,
            answer: state.answer.unwrap_or_default(),
            passage_ids: state.passages.iter().map(|p| p.id.clone()).collect(),
            sources: state
                .passages
                .iter()
                .map(|p| CitedSource {
                    id: p.id.clone(),
                    excerpt: excerpt(&p.content),
                    score: p.score,
                    metadata: p.metadata.clone(),
                })
                .collect(),
            usage: state.usage.summary(),
            status,
            incomplete: state.incomplete,
            iterations: state.iteration,
            trace: state.trace,
            errors: state.errors.into_entries(),
        }
    }
}
