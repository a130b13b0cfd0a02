//! Structured lifecycle events for pipeline runs.
//!
//! - `RunSpan`: run-scoped span attached to a run's future
//! - `emit_*`: one event per lifecycle transition
//!
//! Events are emitted at `info!` (`warn!` for stage failures) with an
//! `event` field so log pipelines can filter on it.

use tracing::{info, warn, Instrument};

/// Run-scoped tracing span. The span follows the future across awaits, so
/// every stage event carries the run and project ids.
pub struct RunSpan;

impl RunSpan {
    /// Attach a run span to `future`.
    pub fn instrument<F: std::future::Future>(
        run_id: &str,
        project_id: &str,
        future: F,
    ) -> tracing::instrument::Instrumented<F> {
        future.instrument(run_span(run_id, project_id))
    }
}

fn run_span(run_id: &str, project_id: &str) -> tracing::Span {
    tracing::info_span!("hostbuddy.run", run_id = %run_id, project_id = %project_id)
}

/// Emit event: run started.
///
/// ```ignore
/// emit_run_started("3f1c…", "persistent", "9b2e…");
/// // logs: event=run.started run_id=3f1c… mode=persistent source_digest=9b2e…
/// ```
pub fn emit_run_started(run_id: &str, mode: &str, source_digest: &str) {
    info!(event = "run.started", run_id = %run_id, mode = %mode, source_digest = %source_digest);
}

/// Emit event: the orchestrator entered a state.
pub fn emit_state_entered(run_id: &str, state: &str) {
    info!(event = "run.state", run_id = %run_id, state = %state);
}

/// Emit event: a stage failed and the run is falling back.
pub fn emit_stage_failed(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.stage_failed", run_id = %run_id, stage = %stage, error = %error);
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, final_state: &str, duration_ms: u64, diagnostics: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        final_state = %final_state,
        duration_ms = duration_ms,
        diagnostics = diagnostics,
    );
}

/// Emit event: a diagnostic could not be persisted.
pub fn emit_diagnostic_dropped(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.diagnostic_dropped", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_span_instrument() {
        let out = RunSpan::instrument("test-run-id", "demo", async { 7 }).await;
        assert_eq!(out, 7);
    }
}
