//! Report layout: component registry, decisions, assembly and validation.

pub mod assembler;
pub mod decision;
pub mod registry;
pub mod render;
pub mod validator;

pub use assembler::{assemble, Assembled, MAX_MAIN_SECTIONS};
pub use decision::{extract_decision, ContentDraft, LayoutDecision, SectionDraft, SectionsDraft};
pub use registry::{check_props, Component, ComponentFamily, ComponentProps};
pub use render::{render, render_json, render_markdown, write_output, OutputFormat};
pub use validator::{validate_document, ValidationResult, Violation};
