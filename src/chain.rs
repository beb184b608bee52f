//! Chain orchestration: the render → synthesize → evaluate → submit loop.
//!
//! A chain is the sequence of quiz cycles linked by "next URL"
//! continuations, originating from one accepted request. The loop is
//! explicit — chain state lives in loop variables, not call frames — and
//! bounded by the configured maximum chain length.
//!
//! Stages within one cycle are strictly sequential, and the next cycle's
//! render only begins after the current cycle's submission response is
//! known. Chains cannot be cancelled once accepted; timeouts at the render,
//! evaluation, and submission stages are the only bounded-failure
//! mechanisms.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::eval::AnswerEvaluator;
use crate::render::{PageRenderer, RenderError};
use crate::solver::SolverSynthesizer;
use crate::submit::{SubmissionDispatcher, SubmissionPayload, SubmitError};

/// An accepted quiz task. Immutable for the lifetime of its chain.
#[derive(Debug, Clone)]
pub struct QuizTask {
    pub email: String,
    pub secret: String,
    pub url: String,
}

/// Errors that terminate a chain.
///
/// Synthesis and evaluation failures are absent by design: both degrade to
/// a null answer and the cycle continues to submission.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Chain status enumeration.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Chain is running in the background
    Running,
    /// Chain ran to a normal termination
    Completed,
    /// Chain was terminated by a render or submission failure
    Failed,
}

/// Observable state of one chain, kept in the in-process registry.
///
/// Lost on restart; a chain interrupted mid-flight is simply gone.
#[derive(Debug, Clone, Serialize)]
pub struct ChainRecord {
    /// Unique chain identifier
    pub id: Uuid,

    /// Current status
    pub status: ChainStatus,

    /// URL from the original inbound request
    pub task_url: String,

    /// URL of the cycle currently (or last) in flight
    pub current_url: String,

    /// Number of cycles started
    pub cycles: usize,

    /// Terminal message once the chain finishes
    pub message: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ChainRecord {
    pub fn new(id: Uuid, task_url: String) -> Self {
        Self {
            id,
            status: ChainStatus::Running,
            current_url: task_url.clone(),
            task_url,
            cycles: 0,
            message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// In-memory registry of chains, shared between the API and the runners.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    inner: Arc<RwLock<HashMap<Uuid, ChainRecord>>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: ChainRecord) {
        self.inner.write().await.insert(record.id, record);
    }

    pub async fn advance(&self, id: Uuid, current_url: &str, cycles: usize) {
        if let Some(record) = self.inner.write().await.get_mut(&id) {
            record.current_url = current_url.to_string();
            record.cycles = cycles;
        }
    }

    pub async fn finish(&self, id: Uuid, status: ChainStatus, message: impl Into<String>) {
        if let Some(record) = self.inner.write().await.get_mut(&id) {
            record.status = status;
            record.message = Some(message.into());
            record.finished_at = Some(Utc::now());
        }
    }

    pub async fn get(&self, id: &Uuid) -> Option<ChainRecord> {
        self.inner.read().await.get(id).cloned()
    }

    /// All chains, most recent first.
    pub async fn list(&self) -> Vec<ChainRecord> {
        let mut records: Vec<_> = self.inner.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records
    }

    pub async fn active_count(&self) -> usize {
        self.inner
            .read()
            .await
            .values()
            .filter(|r| r.status == ChainStatus::Running)
            .count()
    }
}

/// Terminal summary of a chain that ran to normal completion.
#[derive(Debug)]
pub struct ChainOutcome {
    pub cycles: usize,
    pub message: String,
}

/// Runs quiz chains. One instance is shared by all chains; every
/// dependency behind it is safe for concurrent use and each chain owns its
/// own browser instance, evaluator subprocess, and HTTP connections.
pub struct ChainRunner {
    renderer: Arc<dyn PageRenderer>,
    evaluator: Arc<dyn AnswerEvaluator>,
    solver: SolverSynthesizer,
    dispatcher: SubmissionDispatcher,
    max_chain_length: usize,
}

impl ChainRunner {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        evaluator: Arc<dyn AnswerEvaluator>,
        solver: SolverSynthesizer,
        dispatcher: SubmissionDispatcher,
        max_chain_length: usize,
    ) -> Self {
        Self {
            renderer,
            evaluator,
            solver,
            dispatcher,
            max_chain_length,
        }
    }

    /// Run one chain to completion, updating the registry as it goes.
    ///
    /// # Errors
    ///
    /// Returns `ChainError` when a render or submission failure terminates
    /// the chain. Synthesis and evaluation failures degrade to a null
    /// answer instead.
    pub async fn run(
        &self,
        id: Uuid,
        task: &QuizTask,
        registry: &ChainRegistry,
    ) -> Result<ChainOutcome, ChainError> {
        let mut current_url = task.url.clone();
        let mut cycles = 0usize;

        loop {
            if cycles >= self.max_chain_length {
                return Ok(ChainOutcome {
                    cycles,
                    message: format!("chain length limit of {} reached", self.max_chain_length),
                });
            }
            cycles += 1;
            registry.advance(id, &current_url, cycles).await;
            tracing::info!(chain = %id, cycle = cycles, url = %current_url, "Starting quiz cycle");

            // A render failure aborts the cycle before anything is
            // synthesized or submitted.
            let page = self.renderer.render(&current_url).await?;

            let program = self.solver.synthesize(&page).await;
            let answer = self.evaluator.evaluate(&program).await;
            match &answer {
                Some(value) => tracing::info!(chain = %id, answer = %value, "Computed answer"),
                None => tracing::warn!(chain = %id, "No answer computed, submitting null"),
            }

            let endpoint = self.dispatcher.discover_endpoint(&page).await?;
            let payload = SubmissionPayload {
                email: task.email.clone(),
                secret: task.secret.clone(),
                url: current_url.clone(),
                answer,
            };
            let result = self.dispatcher.submit(&endpoint, &payload).await?;

            match result.continuation() {
                Some(next_url) => {
                    tracing::info!(chain = %id, next_url = %next_url, "Continuing chain");
                    current_url = next_url.to_string();
                }
                None => {
                    let message = if result.correct == Some(true) {
                        "answer accepted, no further task offered"
                    } else {
                        "terminated by submission response"
                    };
                    return Ok(ChainOutcome {
                        cycles,
                        message: message.to_string(),
                    });
                }
            }
        }
    }

    /// Run a chain and record its terminal state in the registry. This is
    /// the entry point for spawned background chains; it never panics and
    /// never returns an error.
    pub async fn run_tracked(&self, id: Uuid, task: QuizTask, registry: &ChainRegistry) {
        match self.run(id, &task, registry).await {
            Ok(outcome) => {
                tracing::info!(
                    chain = %id,
                    cycles = outcome.cycles,
                    "Chain completed: {}",
                    outcome.message
                );
                registry
                    .finish(id, ChainStatus::Completed, outcome.message)
                    .await;
            }
            Err(e) => {
                tracing::error!(chain = %id, "Chain failed: {}", e);
                registry.finish(id, ChainStatus::Failed, e.to_string()).await;
            }
        }
    }
}
