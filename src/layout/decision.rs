//! Layout decisions produced by a decision engine.
//!
//! A decision is a loosely-typed draft of the report: the engine picks
//! components, titles, ordering and content bindings, and the assembler turns
//! the draft into a `ReportDocument`. Model output is accepted as a fenced
//! JSON block, bare JSON, or the outermost `{...}` span of free text.

use crate::layout::registry::{Component, ComponentProps};
use crate::models::Source;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Draft of a whole report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutDecision {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: SectionsDraft,
}

/// Header and main drafts, in the engine's priority order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionsDraft {
    #[serde(default)]
    pub header: Vec<SectionDraft>,
    #[serde(default)]
    pub main: Vec<SectionDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub section_type: Option<String>,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub contents: Vec<ContentDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub source: Source,
    /// Defaults to the parent section's component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl SectionDraft {
    pub fn new(component: Component, title: Option<&str>) -> Self {
        Self {
            id: None,
            section_type: None,
            component: component.name().to_string(),
            title: title.map(String::from),
            description: None,
            contents: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_content(mut self, content: ContentDraft) -> Self {
        self.contents.push(content);
        self
    }
}

impl ContentDraft {
    /// A literal value rendered by the component.
    pub fn text(props: ComponentProps, value: &str) -> Self {
        Self {
            source: Source::Text,
            component: Some(props.component().name().to_string()),
            value: Value::String(value.to_string()),
            props: props.to_map(),
        }
    }

    /// A dataset reference the renderer loads itself.
    pub fn s3(props: ComponentProps, reference: &str) -> Self {
        Self {
            source: Source::S3,
            component: Some(props.component().name().to_string()),
            value: Value::String(reference.to_string()),
            props: props.to_map(),
        }
    }

    /// Text form of the value; null becomes empty.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Pull a `LayoutDecision` out of model text.
pub fn extract_decision(text: &str) -> Result<LayoutDecision, String> {
    let candidates = [fenced_json(text), Some(text.trim()), outer_braces(text)];

    let mut last_error = String::from("no JSON object found in model output");
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<LayoutDecision>(candidate) {
            Ok(decision) => return Ok(decision),
            Err(e) => last_error = format!("invalid layout JSON: {}", e),
        }
    }

    Err(last_error)
}

/// Body of the first ```json (or bare ```) fence.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"{
  "title": "Monthly Sales",
  "sections": {
    "header": [
      {"component": "MainHeader", "contents": [{"source": "TEXT", "value": "Monthly Sales"}]}
    ],
    "main": [
      {"component": "BarChart", "title": "By category", "contents": [
        {"source": "S3", "component": "BarChart", "value": "s3://bucket/category.json",
         "props": {"xField": "category", "yFields": ["sales"]}}
      ]}
    ]
  }
}"#;

    #[test]
    fn test_extract_bare_json() {
        let decision = extract_decision(LAYOUT).unwrap();
        assert_eq!(decision.title, "Monthly Sales");
        assert_eq!(decision.sections.header.len(), 1);
        assert_eq!(decision.sections.main[0].contents[0].source, Source::S3);
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = format!("Here is the layout:\n```json\n{}\n```\nLet me know!", LAYOUT);
        let decision = extract_decision(&text).unwrap();
        assert_eq!(decision.sections.main[0].component, "BarChart");
    }

    #[test]
    fn test_extract_embedded_json() {
        let text = format!("Layout follows {} and that is all.", LAYOUT);
        assert!(extract_decision(&text).is_ok());
    }

    #[test]
    fn test_extract_failure() {
        assert!(extract_decision("I could not build a layout.").is_err());
        assert!(extract_decision("{ not json }").is_err());
    }

    #[test]
    fn test_value_text() {
        let mut content = ContentDraft::text(ComponentProps::TextField, "note");
        assert_eq!(content.value_text(), "note");
        content.value = serde_json::json!(42);
        assert_eq!(content.value_text(), "42");
        content.value = Value::Null;
        assert_eq!(content.value_text(), "");
    }

    #[test]
    fn test_builders_carry_props() {
        let content = ContentDraft::s3(
            ComponentProps::BarChart {
                x_field: "category".to_string(),
                y_fields: vec!["sales".to_string()],
            },
            "s3://bucket/category.json",
        );
        assert_eq!(content.component.as_deref(), Some("BarChart"));
        assert_eq!(content.props["xField"], "category");
    }
}
