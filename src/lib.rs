//! Layoutsmith - report layout synthesis.
//!
//! Takes a natural-language reporting request plus references to remote CSV
//! or JSON objects and produces a report layout document that always passes
//! its own schema and storage allow-list. A decision engine (an Ollama model
//! or the offline heuristic) picks components while calling the data tools;
//! everything around it is deterministic.

pub mod agent;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod models;
pub mod storage;
pub mod synthesizer;

pub use error::{SynthesisError, SynthesisResult};
pub use models::{ReportDocument, ReportRequest};
pub use synthesizer::{LayoutSynthesizer, SynthesisOutput, SynthesisSettings, SynthesisState};
