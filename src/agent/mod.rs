//! Decision engines and the tools they call.
//!
//! `LayoutAgent` plans with an Ollama model; `HeuristicEngine` plans offline
//! from request keywords. Both drive the same `ToolExecutor`.

pub mod agent_loop;
pub mod heuristic;
pub mod planner;
pub mod tools;

pub use agent_loop::{AgentConfig, LayoutAgent};
pub use heuristic::HeuristicEngine;
pub use planner::DecisionEngine;
pub use tools::{ToolCall, ToolExecutor, ToolInvocation, ToolResult};
