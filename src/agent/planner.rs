//! The decision capability seam.
//!
//! A decision engine receives the request and a tool executor bound to the
//! request's validated references. It may call tools over several rounds,
//! starting each with `ToolExecutor::begin_round`, and ends with a layout
//! decision. Engines are free to be non-deterministic; the synthesizer
//! validates whatever they return.

use crate::agent::tools::ToolExecutor;
use crate::error::SynthesisResult;
use crate::layout::LayoutDecision;
use crate::models::ReportRequest;
use async_trait::async_trait;

#[async_trait]
pub trait DecisionEngine: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Plan the report layout for one request.
    async fn decide(
        &mut self,
        request: &ReportRequest,
        tools: &mut ToolExecutor,
    ) -> SynthesisResult<LayoutDecision>;
}
