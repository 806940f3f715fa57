//! Keyword-driven decision engine.
//!
//! Works offline, without a model. Component choice follows the wording of
//! the request:
//! - sales / trend / table words select a `DataTable` over the raw data
//! - comparison / category / "by" words select a `BarChart`
//! - KPI / summary words select a `Card` showing a computed total
//!
//! With no matching words the report gets a `Card` and a `DataTable`. Every
//! report closes with a `TextField` note naming its sources. Data-bound
//! sections are skipped when the data cannot support them.

use crate::agent::planner::DecisionEngine;
use crate::agent::tools::{ToolCall, ToolExecutor};
use crate::error::SynthesisResult;
use crate::layout::{Component, ComponentProps, ContentDraft, LayoutDecision, SectionDraft};
use crate::models::{AnalysisSummary, FieldType, KpiResult, ReportRequest};
use crate::storage::RemoteDataReference;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const TABLE_WORDS: &[&str] = &["売上", "推移", "sales", "trend", "daily", "table", "detail"];
const CHART_WORDS: &[&str] = &[
    "カテゴリ", "比較", "別", "category", "comparison", "compare", " by ", "breakdown",
];
const KPI_WORDS: &[&str] = &["kpi", "指標", "サマリー", "summary", "overview", "total"];

/// Field names preferred as the headline KPI.
const PREFERRED_KPI_FIELDS: &[&str] = &["sales", "売上", "revenue", "amount", "total"];

/// Sections a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intents {
    pub table: bool,
    pub chart: bool,
    pub kpi: bool,
}

impl Intents {
    /// Match request wording against the keyword lists.
    pub fn detect(request: &str) -> Self {
        let lowered = format!(" {} ", request.to_lowercase());
        let any = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

        let intents = Self {
            table: any(TABLE_WORDS),
            chart: any(CHART_WORDS),
            kpi: any(KPI_WORDS),
        };

        if intents == Self::default() {
            Self {
                table: true,
                chart: false,
                kpi: true,
            }
        } else {
            intents
        }
    }
}

/// Section labels in the request's language.
struct Labels {
    default_title: &'static str,
    summary_title: &'static str,
    summary_description: &'static str,
    table_title: &'static str,
    table_description: &'static str,
    chart_title: &'static str,
    chart_description: &'static str,
    note_title: &'static str,
    note_generated: &'static str,
    note_no_data: &'static str,
}

const EN: Labels = Labels {
    default_title: "Report",
    summary_title: "Summary",
    summary_description: "Key figures",
    table_title: "Detailed data",
    table_description: "Records from the source data",
    chart_title: "Comparison",
    chart_description: "Totals per group",
    note_title: "Notes",
    note_generated: "This report was generated automatically from:",
    note_no_data: "This report was generated automatically without source data.",
};

const JA: Labels = Labels {
    default_title: "レポート",
    summary_title: "サマリー",
    summary_description: "主要KPI",
    table_title: "詳細データ",
    table_description: "元データの一覧",
    chart_title: "比較",
    chart_description: "グループ別の集計",
    note_title: "補足情報",
    note_generated: "このレポートは自動生成されました。データ取得元:",
    note_no_data: "このレポートは自動生成されました。データは指定されていません。",
};

/// Offline engine choosing components from request keywords.
#[derive(Debug, Default)]
pub struct HeuristicEngine;

impl HeuristicEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecisionEngine for HeuristicEngine {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn decide(
        &mut self,
        request: &ReportRequest,
        tools: &mut ToolExecutor,
    ) -> SynthesisResult<LayoutDecision> {
        let intents = Intents::detect(&request.user_request);
        let labels = if request.user_request.is_ascii() { &EN } else { &JA };
        let title = extract_title(&request.user_request, labels.default_title);
        let references = tools.references().to_vec();

        info!(
            "Heuristic plan for '{}': table={}, chart={}, kpi={}",
            title, intents.table, intents.chart, intents.kpi
        );

        let mut decision = LayoutDecision {
            title: title.clone(),
            ..LayoutDecision::default()
        };
        decision.sections.header.push(
            SectionDraft::new(Component::MainHeader, None)
                .with_content(ContentDraft::text(ComponentProps::MainHeader, &title)),
        );

        let main = &mut decision.sections.main;

        if intents.kpi {
            main.push(kpi_section(tools, &references, labels).await?);
        }

        if intents.table {
            match pick(&references, "daily", 0) {
                Some(reference) => main.push(
                    SectionDraft::new(Component::DataTable, Some(labels.table_title))
                        .with_description(labels.table_description)
                        .with_content(ContentDraft::s3(
                            ComponentProps::DataTable { columns: None },
                            reference.as_str(),
                        )),
                ),
                None => debug!("No data path for a table; skipping"),
            }
        }

        if intents.chart {
            match pick(&references, "category", 1) {
                Some(reference) => {
                    if let Some(section) = chart_section(tools, reference, labels).await? {
                        main.push(section);
                    }
                }
                None => debug!("No data path for a chart; skipping"),
            }
        }

        main.push(note_section(&references, labels));

        Ok(decision)
    }
}

/// Run one tool in its own round; the parsed output when it succeeded.
async fn call(tools: &mut ToolExecutor, name: &str, args: Value) -> SynthesisResult<Option<Value>> {
    tools.begin_round()?;
    let result = tools.execute(&ToolCall::new(name, args)).await?;
    if !result.success {
        warn!("Tool {} failed: {}", name, result.content());
        return Ok(None);
    }
    Ok(serde_json::from_str(&result.output).ok())
}

async fn summarize(
    tools: &mut ToolExecutor,
    reference: &RemoteDataReference,
) -> SynthesisResult<Option<AnalysisSummary>> {
    let output = call(tools, "analyze_data", json!({"path": reference.as_str()})).await?;
    Ok(output
        .and_then(|v| v.get("summary").cloned())
        .and_then(|s| serde_json::from_value(s).ok()))
}

async fn kpi_section(
    tools: &mut ToolExecutor,
    references: &[RemoteDataReference],
    labels: &Labels,
) -> SynthesisResult<SectionDraft> {
    let section = SectionDraft::new(Component::Card, Some(labels.summary_title))
        .with_description(labels.summary_description);

    let headline = match pick(references, "daily", 0) {
        Some(reference) => headline_kpi(tools, reference).await?,
        None => None,
    };

    let props = match headline {
        Some((kpi, summary)) => ComponentProps::Card {
            title: format!("Total {}", kpi.field),
            description: Some(format!("Sum over {} records", summary.row_count)),
            content: Some(format_number(kpi.value)),
            footer: None,
        },
        None => ComponentProps::Card {
            title: labels.summary_title.to_string(),
            description: None,
            content: Some("-".to_string()),
            footer: None,
        },
    };

    Ok(section.with_content(ContentDraft::text(props, "")))
}

async fn headline_kpi(
    tools: &mut ToolExecutor,
    reference: &RemoteDataReference,
) -> SynthesisResult<Option<(KpiResult, AnalysisSummary)>> {
    let Some(summary) = summarize(tools, reference).await? else {
        return Ok(None);
    };
    let Some(field) = preferred_numeric_field(&summary.numeric_fields) else {
        debug!("{} has no numeric field for a KPI", reference);
        return Ok(None);
    };

    let output = call(
        tools,
        "calculate_kpi",
        json!({"path": reference.as_str(), "field": field, "operation": "sum"}),
    )
    .await?;

    let kpi = output
        .and_then(|v| v.get("results").cloned())
        .and_then(|r| serde_json::from_value::<Vec<KpiResult>>(r).ok())
        .and_then(|mut results| results.pop());

    Ok(kpi.map(|k| (k, summary)))
}

async fn chart_section(
    tools: &mut ToolExecutor,
    reference: &RemoteDataReference,
    labels: &Labels,
) -> SynthesisResult<Option<SectionDraft>> {
    let Some(summary) = summarize(tools, reference).await? else {
        return Ok(None);
    };

    let x_field = summary
        .field_types
        .iter()
        .find(|f| matches!(f.field_type, FieldType::Text | FieldType::Date))
        .map(|f| f.name.clone());
    let y_fields: Vec<String> = summary
        .numeric_fields
        .iter()
        .filter(|f| Some(*f) != x_field.as_ref())
        .cloned()
        .collect();

    let Some(x_field) = x_field else {
        warn!("{} has no category field; skipping chart", reference);
        return Ok(None);
    };
    if y_fields.is_empty() {
        warn!("{} has no numeric field; skipping chart", reference);
        return Ok(None);
    }

    Ok(Some(
        SectionDraft::new(Component::BarChart, Some(labels.chart_title))
            .with_description(labels.chart_description)
            .with_content(ContentDraft::s3(
                ComponentProps::BarChart { x_field, y_fields },
                reference.as_str(),
            )),
    ))
}

fn note_section(references: &[RemoteDataReference], labels: &Labels) -> SectionDraft {
    let text = if references.is_empty() {
        labels.note_no_data.to_string()
    } else {
        let sources: Vec<_> = references.iter().map(|r| r.as_str()).collect();
        format!("{} {}", labels.note_generated, sources.join(", "))
    };

    SectionDraft::new(Component::TextField, Some(labels.note_title))
        .with_content(ContentDraft::text(ComponentProps::TextField, &text))
}

/// First reference whose key contains `hint`, else the one at `fallback`, else the first.
fn pick<'a>(
    references: &'a [RemoteDataReference],
    hint: &str,
    fallback: usize,
) -> Option<&'a RemoteDataReference> {
    references
        .iter()
        .find(|r| r.key().to_lowercase().contains(hint))
        .or_else(|| references.get(fallback))
        .or_else(|| references.first())
}

fn preferred_numeric_field(numeric: &[String]) -> Option<&str> {
    numeric
        .iter()
        .find(|f| {
            let lowered = f.to_lowercase();
            PREFERRED_KPI_FIELDS.iter().any(|p| lowered.contains(p))
        })
        .or_else(|| numeric.first())
        .map(String::as_str)
}

/// Report title from the request's "... report" phrase.
pub fn extract_title(request: &str, default: &str) -> String {
    if let Some(idx) = request.find("レポート") {
        let title = request[..idx + "レポート".len()].trim();
        return title.to_string();
    }

    let lowered = request.to_ascii_lowercase();
    let Some(idx) = lowered.find("report") else {
        return default.to_string();
    };

    let phrase = &request[..idx + "report".len()];
    let phrase = phrase
        .rsplit(['.', '!', '?', '\n'])
        .next()
        .unwrap_or(phrase);

    const FILLER: &[&str] = &[
        "please", "create", "make", "generate", "build", "show", "me", "give", "a", "an", "the",
    ];
    let words: Vec<&str> = phrase
        .split_whitespace()
        .skip_while(|w| FILLER.contains(&w.to_ascii_lowercase().as_str()))
        .collect();

    if words.is_empty() {
        return default.to_string();
    }

    let title = words.join(" ");
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => default.to_string(),
    }
}

/// Thousands-separated integers, two decimals otherwise.
pub fn format_number(value: f64) -> String {
    if value.fract() != 0.0 {
        return format!("{:.2}", value);
    }

    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if value < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalObjectStore, PathValidator};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tools(temp_dir: &TempDir, files: &[(&str, &str)], max_rounds: usize) -> ToolExecutor {
        let bucket = temp_dir.path().join("bucket");
        std::fs::create_dir_all(&bucket).unwrap();
        let validator = PathValidator::new("s3", "bucket").unwrap();

        let references = files
            .iter()
            .map(|(name, body)| {
                std::fs::write(bucket.join(name), body).unwrap();
                validator.validate(&format!("s3://bucket/{}", name)).unwrap()
            })
            .collect();

        ToolExecutor::new(
            Arc::new(LocalObjectStore::new(temp_dir.path())),
            references,
            20,
            max_rounds,
        )
    }

    fn components(decision: &LayoutDecision) -> Vec<&str> {
        decision
            .sections
            .main
            .iter()
            .map(|s| s.component.as_str())
            .collect()
    }

    #[test]
    fn test_detect_intents() {
        let both = Intents::detect("月次売上レポート。製品カテゴリ別の売上を見たい");
        assert!(both.table && both.chart && !both.kpi);

        let chart = Intents::detect("Compare revenue by region");
        assert!(chart.chart && !chart.table);

        let fallback = Intents::detect("something about widgets");
        assert_eq!(
            fallback,
            Intents {
                table: true,
                chart: false,
                kpi: true
            }
        );
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("月次売上レポートを作成してください。", "レポート"),
            "月次売上レポート"
        );
        assert_eq!(
            extract_title("Please create a monthly sales report with trends", "Report"),
            "Monthly sales report"
        );
        assert_eq!(extract_title("Show me the numbers", "Report"), "Report");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(45280000.0), "45,280,000");
        assert_eq!(format_number(-1234.0), "-1,234");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(20.5), "20.50");
    }

    #[tokio::test]
    async fn test_chart_and_table_from_data() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = tools(
            &temp_dir,
            &[
                ("daily-sales.csv", "date,sales\n2024-01-01,10\n2024-01-02,20\n"),
                (
                    "category-sales.json",
                    r#"[{"category":"A","sales":1,"profit":1},{"category":"B","sales":2,"profit":1}]"#,
                ),
            ],
            12,
        );

        let request = ReportRequest::new(
            "Monthly sales report with a comparison by category",
            vec![],
        );
        let decision = HeuristicEngine::new().decide(&request, &mut tools).await.unwrap();

        assert_eq!(decision.title, "Monthly sales report");
        assert_eq!(components(&decision), vec!["DataTable", "BarChart", "TextField"]);

        let table = &decision.sections.main[0].contents[0];
        assert_eq!(table.value_text(), "s3://bucket/daily-sales.csv");

        let chart = &decision.sections.main[1].contents[0];
        assert_eq!(chart.value_text(), "s3://bucket/category-sales.json");
        assert_eq!(chart.props["xField"], "category");
        assert_eq!(chart.props["yFields"], json!(["sales", "profit"]));
    }

    #[tokio::test]
    async fn test_default_card_computes_total() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = tools(
            &temp_dir,
            &[("orders.csv", "region,revenue\nEU,1000\nUS,2500\nAPAC,\n")],
            12,
        );

        let request = ReportRequest::new("quarterly overview", vec![]);
        let decision = HeuristicEngine::new().decide(&request, &mut tools).await.unwrap();

        assert_eq!(components(&decision), vec!["Card", "TextField"]);
        let card = &decision.sections.main[0].contents[0];
        assert_eq!(card.props["title"], "Total revenue");
        assert_eq!(card.props["content"], "3,500");
        assert_eq!(tools.rounds_used(), 2);
    }

    #[tokio::test]
    async fn test_no_data_paths() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = tools(&temp_dir, &[], 12);

        let request = ReportRequest::new("売上比較レポート", vec![]);
        let decision = HeuristicEngine::new().decide(&request, &mut tools).await.unwrap();

        assert_eq!(decision.title, "売上比較レポート");
        assert_eq!(components(&decision), vec!["TextField"]);
        assert_eq!(tools.rounds_used(), 0);
    }

    #[tokio::test]
    async fn test_chart_skipped_without_numeric_field() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = tools(&temp_dir, &[("names.csv", "name,team\nx,a\ny,b\n")], 12);

        let request = ReportRequest::new("compare teams", vec![]);
        let decision = HeuristicEngine::new().decide(&request, &mut tools).await.unwrap();
        assert_eq!(components(&decision), vec!["TextField"]);
    }

    #[tokio::test]
    async fn test_budget_applies() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = tools(&temp_dir, &[("orders.csv", "region,revenue\nEU,1\n")], 1);

        let err = HeuristicEngine::new()
            .decide(&ReportRequest::new("kpi summary", vec![]), &mut tools)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "decision_budget_exceeded");
    }
}
