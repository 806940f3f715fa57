//! The layout synthesis pipeline.
//!
//! One request runs as a single sequential pipeline:
//! `Received → PathsValidated → DataGathered → Analyzed → Decided →
//! Assembled → Validated → Done`, with `Failed` reachable from any state.
//! Data is gathered and analysed by the decision engine through its tools, so
//! the `DataGathered` and `Analyzed` states are entered only when the engine
//! actually read or analysed something. Nothing outlives the request except
//! the shared path validator and storage client.

use crate::agent::{DecisionEngine, ToolExecutor, ToolInvocation};
use crate::error::{SynthesisError, SynthesisResult};
use crate::layout::{assemble, validate_document};
use crate::models::{ReportDocument, ReportRequest};
use crate::storage::{ObjectStore, PathValidator};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    Received,
    PathsValidated,
    DataGathered,
    Analyzed,
    Decided,
    Assembled,
    Validated,
    Done,
    Failed,
}

impl fmt::Display for SynthesisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SynthesisState::Received => "Received",
            SynthesisState::PathsValidated => "PathsValidated",
            SynthesisState::DataGathered => "DataGathered",
            SynthesisState::Analyzed => "Analyzed",
            SynthesisState::Decided => "Decided",
            SynthesisState::Assembled => "Assembled",
            SynthesisState::Validated => "Validated",
            SynthesisState::Done => "Done",
            SynthesisState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Per-process synthesis settings.
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    /// Authorship tag written into every document.
    pub created_by: String,
    /// Deadline for one whole request.
    pub request_timeout: Duration,
    /// Decision rounds allowed per request.
    pub max_tool_rounds: usize,
    /// Default row count for dataset previews handed to the engine.
    pub preview_rows: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            created_by: "agent_generated".to_string(),
            request_timeout: Duration::from_secs(300),
            max_tool_rounds: 12,
            preview_rows: 20,
        }
    }
}

/// A successful synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub document: ReportDocument,
    /// States passed through, in order.
    pub states: Vec<SynthesisState>,
    pub invocations: Vec<ToolInvocation>,
    /// Main sections removed by the section cap.
    pub dropped_sections: usize,
}

struct StateTrace {
    states: Vec<SynthesisState>,
}

impl StateTrace {
    fn new() -> Self {
        debug!("State -> {}", SynthesisState::Received);
        Self {
            states: vec![SynthesisState::Received],
        }
    }

    fn current(&self) -> SynthesisState {
        self.states
            .last()
            .copied()
            .unwrap_or(SynthesisState::Received)
    }

    fn advance(&mut self, next: SynthesisState) {
        debug!("State {} -> {}", self.current(), next);
        self.states.push(next);
    }

    fn fail(&mut self, err: &SynthesisError) {
        error!("Synthesis failed in state {}: {}", self.current(), err);
        self.advance(SynthesisState::Failed);
    }
}

/// Turns report requests into validated report documents.
pub struct LayoutSynthesizer {
    paths: Arc<PathValidator>,
    store: Arc<dyn ObjectStore>,
    settings: SynthesisSettings,
}

impl LayoutSynthesizer {
    pub fn new(
        paths: Arc<PathValidator>,
        store: Arc<dyn ObjectStore>,
        settings: SynthesisSettings,
    ) -> Self {
        Self {
            paths,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// Run one request through the pipeline under the request deadline.
    pub async fn synthesize(
        &self,
        request: &ReportRequest,
        engine: &mut dyn DecisionEngine,
    ) -> SynthesisResult<SynthesisOutput> {
        let mut trace = StateTrace::new();
        let deadline = self.settings.request_timeout;

        let outcome = match tokio::time::timeout(deadline, self.run(request, engine, &mut trace)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(SynthesisError::Timeout(deadline)),
        };

        if let Err(e) = &outcome {
            trace.fail(e);
        }
        outcome
    }

    async fn run(
        &self,
        request: &ReportRequest,
        engine: &mut dyn DecisionEngine,
        trace: &mut StateTrace,
    ) -> SynthesisResult<SynthesisOutput> {
        info!(
            "Synthesizing layout for {} data path(s) with {} engine",
            request.data_paths.len(),
            engine.name()
        );

        // Any invalid reference rejects the whole request before a tool runs.
        let references = self.paths.validate_all(&request.data_paths)?;
        trace.advance(SynthesisState::PathsValidated);

        let mut tools = ToolExecutor::new(
            Arc::clone(&self.store),
            references,
            self.settings.preview_rows,
            self.settings.max_tool_rounds,
        );

        let decision = engine.decide(request, &mut tools).await?;

        if tools.datasets_read() > 0 {
            trace.advance(SynthesisState::DataGathered);
        }
        if tools.analyses_run() > 0 {
            trace.advance(SynthesisState::Analyzed);
        }
        trace.advance(SynthesisState::Decided);

        let assembled = assemble(decision, &self.settings.created_by);
        trace.advance(SynthesisState::Assembled);

        validate_document(&assembled.document, &self.paths).into_result()?;
        trace.advance(SynthesisState::Validated);

        info!(
            "Layout {} ready: {} main sections, {} tool calls in {} rounds",
            assembled.document.report_id,
            assembled.document.sections.main.len(),
            tools.invocations().len(),
            tools.rounds_used()
        );
        trace.advance(SynthesisState::Done);

        Ok(SynthesisOutput {
            document: assembled.document,
            states: trace.states.clone(),
            invocations: tools.take_invocations(),
            dropped_sections: assembled.dropped_sections,
        })
    }
}
