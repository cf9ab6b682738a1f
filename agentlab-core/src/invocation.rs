//! Safe-invocation wrapper
//!
//! Every query passes through [`SafeInvoker::invoke`], which walks a small
//! state machine:
//!
//! ```text
//! Idle ─dry_run──────────────────────────────────────────────▶ Done (skipped)
//!  │
//!  ├─confirm─▶ AwaitingConfirmation ─not "y"─▶ Aborted (by operator)
//!  │                  │ "y"
//!  ▼                  ▼
//! Calling ─success─▶ CoolingDown (cooldown > 0) ─▶ Done
//!    │─rate limited────────────────────────────▶ Aborted
//!    └─other failure───────────────────────────▶ Done
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentRequest, AgentRunner, AgentStep};
use crate::config::InvocationConfig;
use crate::error::ProviderError;
use crate::tools::ToolDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Idle,
    AwaitingConfirmation,
    Calling,
    CoolingDown,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The provider rejected the request as malformed
    Validation,
    RateLimited,
    Other,
}

impl FailureKind {
    pub fn classify(err: &ProviderError) -> Self {
        if err.is_rate_limited() {
            FailureKind::RateLimited
        } else if matches!(err.status, Some(400) | Some(422)) {
            FailureKind::Validation
        } else {
            FailureKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationResult {
    Success { text: String },
    Failure { kind: FailureKind, message: String },
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// Dry run; the runner was not called
    Skipped,
    /// The operator declined
    Aborted,
    Completed(InvocationResult),
}

/// What happened to one query
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub query: String,
    pub outcome: InvocationOutcome,

    /// States traversed, starting with `Idle`
    pub states: Vec<InvocationState>,

    /// Tool calls the agent made, when it ran
    pub steps: Vec<AgentStep>,
}

impl InvocationReport {
    pub fn final_state(&self) -> InvocationState {
        self.states.last().copied().unwrap_or(InvocationState::Idle)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self.outcome,
            InvocationOutcome::Completed(InvocationResult::Failure {
                kind: FailureKind::RateLimited,
                ..
            })
        )
    }
}

/// Switches applied to every invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationPolicy {
    pub dry_run: bool,
    pub confirm: bool,
    pub cooldown: Duration,
}

impl Default for InvocationPolicy {
    fn default() -> Self {
        InvocationPolicy::from(&InvocationConfig::default())
    }
}

impl From<&InvocationConfig> for InvocationPolicy {
    fn from(config: &InvocationConfig) -> Self {
        Self {
            dry_run: config.dry_run,
            confirm: config.confirm,
            cooldown: config.cooldown(),
        }
    }
}

/// Only a lone `y`, in either case and ignoring surrounding whitespace,
/// counts as consent.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Asks the operator whether a call may proceed
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Writes the prompt to `W` and reads one answer line from `R`.
///
/// End of input or a read error counts as "no".
pub struct ReaderConfirmer<R, W = std::io::Sink> {
    io: Arc<Mutex<(R, W)>>,
}

/// Prompts on stdout and reads answers from stdin
pub type StdinConfirmer = ReaderConfirmer<BufReader<Stdin>, Stdout>;

impl StdinConfirmer {
    pub fn stdin() -> Self {
        Self::with_prompt(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead + Send + 'static> ReaderConfirmer<R> {
    /// Read answers without echoing prompts
    pub fn new(reader: R) -> Self {
        Self::with_prompt(reader, std::io::sink())
    }
}

impl<R, W> ReaderConfirmer<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn with_prompt(reader: R, prompt_out: W) -> Self {
        Self {
            io: Arc::new(Mutex::new((reader, prompt_out))),
        }
    }
}

#[async_trait]
impl<R, W> Confirmer for ReaderConfirmer<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    async fn confirm(&self, prompt: &str) -> bool {
        let io = Arc::clone(&self.io);
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            let mut guard = io.lock().unwrap_or_else(|e| e.into_inner());
            let (reader, out) = &mut *guard;
            if let Err(err) = write!(out, "{} [y/N]: ", prompt).and_then(|_| out.flush()) {
                debug!(error = %err, "Failed to write confirmation prompt");
            }
            read_answer(reader)
        })
        .await
        .ok()
        .flatten();

        answer.is_some_and(|a| is_affirmative(&a))
    }
}

fn read_answer(reader: &mut impl BufRead) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            warn!(error = %err, "Failed to read confirmation");
            None
        }
    }
}

/// Replays canned answers; answers "no" once they run out
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        self.answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .is_some_and(|a| is_affirmative(&a))
    }
}

/// Guards each call to an [`AgentRunner`] with dry-run, confirmation and
/// cooldown.
pub struct SafeInvoker {
    runner: Arc<dyn AgentRunner>,
    confirmer: Arc<dyn Confirmer>,
    policy: InvocationPolicy,
    system_prompt: String,
    tools: Vec<ToolDescriptor>,
}

impl SafeInvoker {
    pub fn new(
        runner: Arc<dyn AgentRunner>,
        confirmer: Arc<dyn Confirmer>,
        policy: InvocationPolicy,
    ) -> Self {
        Self {
            runner,
            confirmer,
            policy,
            system_prompt: String::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Tools offered to the model on every call
    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn policy(&self) -> &InvocationPolicy {
        &self.policy
    }

    /// Run one query through the state machine.
    ///
    /// Never fails: every outcome, including provider errors, is part of the
    /// report.
    pub async fn invoke(&self, query: &str) -> InvocationReport {
        let mut states = vec![InvocationState::Idle];
        let report = |outcome: InvocationOutcome,
                      states: Vec<InvocationState>,
                      steps: Vec<AgentStep>| InvocationReport {
            query: query.to_string(),
            outcome,
            states,
            steps,
        };

        if self.policy.dry_run {
            info!(query = %query, "Dry run, skipping model call");
            states.push(InvocationState::Done);
            return report(InvocationOutcome::Skipped, states, Vec::new());
        }

        if self.policy.confirm {
            states.push(InvocationState::AwaitingConfirmation);
            let prompt = format!("Send query to the model: {:?}?", query);
            if !self.confirmer.confirm(&prompt).await {
                info!(query = %query, "Operator declined");
                states.push(InvocationState::Aborted);
                return report(InvocationOutcome::Aborted, states, Vec::new());
            }
        }

        states.push(InvocationState::Calling);
        let request = AgentRequest::new(query)
            .with_system_prompt(&self.system_prompt)
            .with_tools(self.tools.clone());

        match self.runner.run(&request).await {
            Ok(response) => {
                info!(query = %query, output = %response.output, "Invocation succeeded");
                if !self.policy.cooldown.is_zero() {
                    states.push(InvocationState::CoolingDown);
                    debug!(cooldown_ms = self.policy.cooldown.as_millis() as u64, "Cooling down");
                    tokio::time::sleep(self.policy.cooldown).await;
                }
                states.push(InvocationState::Done);
                report(
                    InvocationOutcome::Completed(InvocationResult::Success {
                        text: response.output,
                    }),
                    states,
                    response.steps,
                )
            }
            Err(err) => {
                let kind = FailureKind::classify(&err);
                if kind == FailureKind::RateLimited {
                    error!(query = %query, error = %err, "Rate limited, aborting");
                    states.push(InvocationState::Aborted);
                } else {
                    warn!(query = %query, error = %err, "Invocation failed");
                    states.push(InvocationState::Done);
                }
                report(
                    InvocationOutcome::Completed(InvocationResult::Failure {
                        kind,
                        message: err.to_string(),
                    }),
                    states,
                    Vec::new(),
                )
            }
        }
    }
}
