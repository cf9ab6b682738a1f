//! Sequential batch runner

use serde::Serialize;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::invocation::{InvocationOutcome, InvocationReport, InvocationResult, SafeInvoker};

/// Tally of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,

    /// Queries never attempted because the batch stopped early
    pub remaining: usize,
    pub halted_by_rate_limit: bool,
}

impl BatchSummary {
    fn record(&mut self, report: &InvocationReport) {
        match &report.outcome {
            InvocationOutcome::Skipped => self.skipped += 1,
            InvocationOutcome::Aborted => self.aborted += 1,
            InvocationOutcome::Completed(InvocationResult::Success { .. }) => self.completed += 1,
            InvocationOutcome::Completed(InvocationResult::Failure { .. }) => self.failed += 1,
        }
    }

    pub fn attempted(&self) -> usize {
        self.completed + self.failed + self.skipped + self.aborted
    }
}

/// Run `queries` one at a time through `invoker`.
///
/// Each query finishes, cooldown included, before the next starts.
/// `on_report` sees every report as soon as it is ready. A rate-limited
/// query stops the batch; the queries after it are counted as `remaining`.
pub async fn run_batch<S, F>(invoker: &SafeInvoker, queries: &[S], mut on_report: F) -> BatchSummary
where
    S: AsRef<str>,
    F: FnMut(usize, &InvocationReport),
{
    let run_id = Uuid::new_v4().to_string();
    let mut summary = BatchSummary {
        run_id: run_id.clone(),
        ..BatchSummary::default()
    };

    let span = info_span!("run", run_id = %run_id, queries = queries.len());
    async {
        info!(dry_run = invoker.policy().dry_run, "Batch started");

        for (index, query) in queries.iter().enumerate() {
            let query = query.as_ref();
            let report = invoker
                .invoke(query)
                .instrument(info_span!("query", index))
                .await;

            summary.record(&report);
            on_report(index, &report);

            if report.is_rate_limited() {
                summary.halted_by_rate_limit = true;
                summary.remaining = queries.len() - index - 1;
                error!(remaining = summary.remaining, "Rate limited, stopping batch");
                break;
            }
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            aborted = summary.aborted,
            remaining = summary.remaining,
            "Batch finished"
        );
    }
    .instrument(span)
    .await;

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentResponse, ScriptedRunner};
    use crate::error::ProviderError;
    use crate::invocation::{AutoConfirm, InvocationPolicy, ScriptedConfirmer};
    use std::sync::Arc;
    use std::time::Duration;

    fn live_policy() -> InvocationPolicy {
        InvocationPolicy {
            dry_run: false,
            confirm: false,
            cooldown: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_queries_run_in_order() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Ok(AgentResponse::text("1")),
            Err(ProviderError::with_status(500, "boom")),
            Ok(AgentResponse::text("3")),
        ]));
        let invoker = SafeInvoker::new(runner.clone(), Arc::new(AutoConfirm), live_policy());

        let mut seen = Vec::new();
        let summary = run_batch(&invoker, &["a", "b", "c"], |i, r| seen.push((i, r.query.clone()))).await;

        assert_eq!(runner.queries(), vec!["a", "b", "c"]);
        assert_eq!(seen, vec![(0, "a".into()), (1, "b".into()), (2, "c".into())]);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.halted_by_rate_limit);
        assert_eq!(summary.attempted(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_stops_batch() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            Ok(AgentResponse::text("1")),
            Err(ProviderError::with_status(429, "Too Many Requests")),
            Ok(AgentResponse::text("never")),
        ]));
        let invoker = SafeInvoker::new(runner.clone(), Arc::new(AutoConfirm), live_policy());

        let summary = run_batch(&invoker, &["a", "b", "c", "d"], |_, _| {}).await;

        assert_eq!(runner.call_count(), 2);
        assert!(summary.halted_by_rate_limit);
        assert_eq!(summary.remaining, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_declines_do_not_stop_batch() {
        let runner = Arc::new(ScriptedRunner::new(vec![Ok(AgentResponse::text("ok"))]));
        let confirmer = Arc::new(ScriptedConfirmer::new(["n", "y", "no"]));
        let policy = InvocationPolicy {
            confirm: true,
            ..live_policy()
        };
        let invoker = SafeInvoker::new(runner.clone(), confirmer, policy);

        let summary = run_batch(&invoker, &["a", "b", "c"], |_, _| {}).await;
        assert_eq!(summary.aborted, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(runner.queries(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let invoker = SafeInvoker::new(
            Arc::new(ScriptedRunner::default()),
            Arc::new(AutoConfirm),
            InvocationPolicy::default(),
        );
        let summary = run_batch::<&str, _>(&invoker, &[], |_, _| {}).await;
        assert_eq!(summary.attempted(), 0);
        assert!(!summary.run_id.is_empty());
    }
}
