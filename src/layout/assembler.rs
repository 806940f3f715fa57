//! Turns a layout decision into a report document.
//!
//! Assembly fills in identifiers, timestamps and defaults. It caps the main
//! section list at `MAX_MAIN_SECTIONS`, keeping the engine's first choices.
//! It does not repair anything else; the schema validator runs next.

use crate::layout::decision::{ContentDraft, LayoutDecision, SectionDraft};
use crate::layout::registry::Component;
use crate::models::{ContentItem, ReportDocument, ReportSections, Section, Source};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// Hard upper bound on main sections.
pub const MAX_MAIN_SECTIONS: usize = 10;

/// Default section display type.
pub const DEFAULT_SECTION_TYPE: &str = "Default";

/// An assembled document plus what assembly had to drop.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub document: ReportDocument,
    /// Main sections removed by the section cap.
    pub dropped_sections: usize,
}

/// Build a document from a decision.
pub fn assemble(decision: LayoutDecision, created_by: &str) -> Assembled {
    let LayoutDecision { title, sections } = decision;
    let mut main = sections.main;

    let dropped_sections = main.len().saturating_sub(MAX_MAIN_SECTIONS);
    if dropped_sections > 0 {
        warn!(
            "Decision produced {} main sections; keeping the first {}",
            main.len(),
            MAX_MAIN_SECTIONS
        );
        main.truncate(MAX_MAIN_SECTIONS);
    }

    let title = resolve_title(&title, &sections.header);

    let mut used_ids = HashSet::new();
    let header = build_sections(sections.header, "header", &mut used_ids);
    let main = build_sections(main, "main", &mut used_ids);

    let document = ReportDocument {
        report_id: format!("report_{}", Uuid::new_v4().simple()),
        title,
        created_at: Utc::now(),
        created_by: created_by.to_string(),
        sections: ReportSections { header, main },
    };

    debug!(
        "Assembled {} with {} header and {} main sections",
        document.report_id,
        document.sections.header.len(),
        document.sections.main.len()
    );

    Assembled {
        document,
        dropped_sections,
    }
}

/// The decision's title, or the main header's text when the title is blank.
fn resolve_title(title: &str, header: &[SectionDraft]) -> String {
    let title = title.trim();
    if !title.is_empty() {
        return title.to_string();
    }

    header
        .iter()
        .filter(|s| s.component == Component::MainHeader.name())
        .flat_map(|s| s.contents.iter())
        .find(|c| c.source == Source::Text)
        .map(|c| c.value_text().trim().to_string())
        .unwrap_or_default()
}

fn build_sections(
    drafts: Vec<SectionDraft>,
    family: &str,
    used_ids: &mut HashSet<String>,
) -> Vec<Section> {
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let id = section_id(draft.id.as_deref(), family, index, used_ids);
            let component = draft.component;
            let contents = draft
                .contents
                .into_iter()
                .map(|c| build_item(c, &component))
                .collect();

            Section {
                id,
                section_type: draft
                    .section_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SECTION_TYPE.to_string()),
                component,
                title: draft.title,
                description: draft.description,
                contents,
            }
        })
        .collect()
}

fn section_id(
    requested: Option<&str>,
    family: &str,
    index: usize,
    used_ids: &mut HashSet<String>,
) -> String {
    if let Some(id) = requested.map(str::trim).filter(|id| !id.is_empty()) {
        if used_ids.insert(id.to_string()) {
            return id.to_string();
        }
    }

    let mut n = index + 1;
    loop {
        let candidate = format!("section_{}_{}", family, n);
        if used_ids.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn build_item(draft: ContentDraft, section_component: &str) -> ContentItem {
    let value = draft.value_text();
    ContentItem {
        source: draft.source,
        component: draft
            .component
            .unwrap_or_else(|| section_component.to_string()),
        value,
        props: draft.props,
    }
}
