//! Schema validation for assembled report documents.
//!
//! A pure check over a finished document. Any violation is a hard failure for
//! the synthesizer; there is no warning level.

use crate::error::{SynthesisError, SynthesisResult};
use crate::layout::assembler::MAX_MAIN_SECTIONS;
use crate::layout::registry::{check_props, Component, ComponentFamily};
use crate::models::{ReportDocument, Section, Source};
use crate::storage::PathValidator;
use std::collections::HashSet;
use std::fmt;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub rule: &'static str,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.detail)
    }
}

/// Validation result.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Ok` when valid, `SchemaViolation` listing every problem otherwise.
    pub fn into_result(self) -> SynthesisResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SynthesisError::SchemaViolation(
                self.violations.iter().map(|v| v.to_string()).collect(),
            ))
        }
    }

    fn push(&mut self, rule: &'static str, detail: String) {
        self.violations.push(Violation { rule, detail });
    }
}

/// Check every document invariant.
pub fn validate_document(document: &ReportDocument, paths: &PathValidator) -> ValidationResult {
    let mut result = ValidationResult::default();

    if document.report_id.trim().is_empty() {
        result.push("REPORT_ID_PRESENT", "report id is empty".to_string());
    }
    if document.title.trim().is_empty() {
        result.push("TITLE_PRESENT", "report title is empty".to_string());
    }

    // ================================================================
    // Section lists
    // ================================================================
    let header = &document.sections.header;
    let main = &document.sections.main;

    if header.is_empty() {
        result.push("HEADER_PRESENT", "header has no sections".to_string());
    }
    if !header
        .iter()
        .any(|s| s.component == Component::MainHeader.name())
    {
        result.push(
            "MAIN_HEADER_PRESENT",
            "header has no MainHeader section".to_string(),
        );
    }
    if main.len() > MAX_MAIN_SECTIONS {
        result.push(
            "MAIN_SECTION_LIMIT",
            format!(
                "main has {} sections; at most {} are allowed",
                main.len(),
                MAX_MAIN_SECTIONS
            ),
        );
    }

    let mut seen_ids = HashSet::new();
    for (family, sections) in [(ComponentFamily::Header, header), (ComponentFamily::Main, main)] {
        for section in sections {
            if !seen_ids.insert(section.id.as_str()) {
                result.push(
                    "SECTION_ID_UNIQUE",
                    format!("section id '{}' is used more than once", section.id),
                );
            }
            validate_section(section, family, paths, &mut result);
        }
    }

    result
}

fn validate_section(
    section: &Section,
    family: ComponentFamily,
    paths: &PathValidator,
    result: &mut ValidationResult,
) {
    match Component::from_name(&section.component) {
        None => result.push(
            "KNOWN_COMPONENT",
            format!(
                "section '{}' uses unknown component '{}'",
                section.id, section.component
            ),
        ),
        Some(component) if component.family() != family => result.push(
            "COMPONENT_FAMILY",
            format!(
                "section '{}' places {} component {} in the {} list",
                section.id,
                component.family(),
                component,
                family
            ),
        ),
        Some(_) => {}
    }

    if section.contents.is_empty() {
        result.push(
            "SECTION_HAS_CONTENT",
            format!("section '{}' has no content items", section.id),
        );
    }

    for (index, item) in section.contents.iter().enumerate() {
        let location = format!("section '{}' item {}", section.id, index + 1);

        let Some(component) = Component::from_name(&item.component) else {
            result.push(
                "KNOWN_COMPONENT",
                format!("{} uses unknown component '{}'", location, item.component),
            );
            continue;
        };

        if item.component != section.component {
            result.push(
                "ITEM_MATCHES_SECTION",
                format!(
                    "{} is a {} inside a {} section",
                    location, item.component, section.component
                ),
            );
        }

        for problem in check_props(component, &item.props) {
            result.push("REQUIRED_PROPS", format!("{}: {}", location, problem));
        }

        if item.source == Source::S3 {
            if let Err(e) = paths.validate(&item.value) {
                result.push("S3_PATH_ALLOWED", format!("{}: {}", location, e));
            }
        }
    }
}
