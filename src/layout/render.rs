//! Output rendering for report documents.
//!
//! JSON is the wire form. The Markdown outline is a human-readable summary of
//! the same document for terminals and reviews.

use crate::models::{ContentItem, ReportDocument, Section, Source};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Output format for a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Render in the requested format.
pub fn render(document: &ReportDocument, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => render_json(document),
        OutputFormat::Markdown => Ok(render_markdown(document)),
    }
}

/// Pretty-printed JSON.
pub fn render_json(document: &ReportDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// Markdown outline of the document.
pub fn render_markdown(document: &ReportDocument) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", document.title));

    output.push_str(&format!("- **Report ID:** `{}`\n", document.report_id));
    output.push_str(&format!(
        "- **Created:** {}\n",
        document.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("- **Created By:** {}\n", document.created_by));
    output.push_str(&format!(
        "- **Sections:** {} header, {} main\n\n",
        document.sections.header.len(),
        document.sections.main.len()
    ));

    output.push_str("## Header\n\n");
    for section in &document.sections.header {
        output.push_str(&outline_section(section));
    }

    output.push_str("## Main\n\n");
    if document.sections.main.is_empty() {
        output.push_str("_No main sections._\n\n");
    }
    for (index, section) in document.sections.main.iter().enumerate() {
        output.push_str(&format!("{}. ", index + 1));
        output.push_str(&outline_section(section));
    }

    output
}

fn outline_section(section: &Section) -> String {
    let mut text = format!(
        "**{}** `{}` ({})\n",
        section.title.as_deref().unwrap_or(&section.component),
        section.id,
        section.component
    );

    if let Some(description) = &section.description {
        text.push_str(&format!("   > {}\n", description));
    }

    for item in &section.contents {
        text.push_str(&format!("   - {}\n", outline_item(item)));
    }
    text.push('\n');

    text
}

fn outline_item(item: &ContentItem) -> String {
    let value = match item.source {
        Source::S3 => format!("`{}`", item.value),
        Source::Text => truncate(&item.value, 80),
    };

    if item.props.is_empty() {
        format!("{} {}", item.source, value)
    } else {
        let props = serde_json::to_string(&item.props).unwrap_or_default();
        format!("{} {} {}", item.source, value, props)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Write rendered output to a file.
pub fn write_output(content: &str, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportSections;
    use chrono::Utc;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn document() -> ReportDocument {
        let header = Section {
            id: "section_header_1".to_string(),
            section_type: "Default".to_string(),
            component: "MainHeader".to_string(),
            title: None,
            description: None,
            contents: vec![ContentItem {
                source: Source::Text,
                component: "MainHeader".to_string(),
                value: "Sales Report".to_string(),
                props: Map::new(),
            }],
        };
        let chart = Section {
            id: "section_main_1".to_string(),
            section_type: "Default".to_string(),
            component: "BarChart".to_string(),
            title: Some("Sales by category".to_string()),
            description: Some("Totals per category".to_string()),
            contents: vec![ContentItem {
                source: Source::S3,
                component: "BarChart".to_string(),
                value: "s3://bucket/category.json".to_string(),
                props: json!({"xField": "category", "yFields": ["sales"]})
                    .as_object()
                    .cloned()
                    .unwrap(),
            }],
        };

        ReportDocument {
            report_id: "report_abc".to_string(),
            title: "Sales Report".to_string(),
            created_at: Utc::now(),
            created_by: "agent_generated".to_string(),
            sections: ReportSections {
                header: vec![header],
                main: vec![chart],
            },
        }
    }

    #[test]
    fn test_render_markdown_outline() {
        let md = render_markdown(&document());

        assert!(md.starts_with("# Sales Report"));
        assert!(md.contains("`report_abc`"));
        assert!(md.contains("1 header, 1 main"));
        assert!(md.contains("1. **Sales by category** `section_main_1` (BarChart)"));
        assert!(md.contains("> Totals per category"));
        assert!(md.contains("S3 `s3://bucket/category.json`"));
        assert!(md.contains("\"yFields\""));
    }

    #[test]
    fn test_render_json_parses_back() {
        let doc = document();
        let json = render_json(&doc).unwrap();
        let parsed: ReportDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "a".repeat(100);
        let cut = truncate(&long, 80);
        assert_eq!(cut.len(), 83);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_write_output_creates_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out/report.json");
        write_output("{}", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    }
}
