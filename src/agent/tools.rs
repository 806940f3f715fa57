//! Tool definitions for the layout decision engine.
//!
//! These are the data tools a decision engine may call while planning a
//! report: reading a dataset, summarising it, computing KPIs, checking that an
//! object exists, and submitting the final layout. The executor only ever
//! touches references that already passed path validation for the current
//! request.

use crate::analysis::{analyze, calculate_kpi, read_dataset, ReadOptions};
use crate::error::{SynthesisError, SynthesisResult};
use crate::layout::LayoutDecision;
use crate::models::{DataFormat, KpiOperation, ParsedDataset};
use crate::storage::{ObjectStore, RemoteDataReference, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tool definition for Ollama's tool-calling API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call made by the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: &str, arguments: Value) -> Self {
        Self {
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        }
    }
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    fn json(value: Value) -> Self {
        Self::success(value.to_string())
    }

    /// The text handed back to the model.
    pub fn content(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or_default())
        }
    }
}

/// One traced tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub round: usize,
    pub tool: String,
    pub ok: bool,
}

/// The tools executor that handles tool calls for one request.
pub struct ToolExecutor {
    store: Arc<dyn ObjectStore>,
    /// Validated references of the current request.
    references: Vec<RemoteDataReference>,
    /// Full reads, keyed by reference. Dropped with the executor.
    datasets: HashMap<String, ParsedDataset>,
    preview_rows: usize,
    max_rounds: usize,
    round: usize,
    analyses: usize,
    invocations: Vec<ToolInvocation>,
    submitted: Option<LayoutDecision>,
}

impl ToolExecutor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        references: Vec<RemoteDataReference>,
        preview_rows: usize,
        max_rounds: usize,
    ) -> Self {
        Self {
            store,
            references,
            datasets: HashMap::new(),
            preview_rows,
            max_rounds,
            round: 0,
            analyses: 0,
            invocations: Vec::new(),
            submitted: None,
        }
    }

    pub fn references(&self) -> &[RemoteDataReference] {
        &self.references
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Start the next decision round. Fails once the budget is spent.
    pub fn begin_round(&mut self) -> SynthesisResult<usize> {
        if self.round >= self.max_rounds {
            warn!("Decision budget of {} rounds exhausted", self.max_rounds);
            return Err(SynthesisError::DecisionBudgetExceeded(self.max_rounds));
        }
        self.round += 1;
        debug!("Decision round {}/{}", self.round, self.max_rounds);
        Ok(self.round)
    }

    pub fn rounds_used(&self) -> usize {
        self.round
    }

    /// Number of distinct references read so far.
    pub fn datasets_read(&self) -> usize {
        self.datasets.len()
    }

    /// Number of successful analysis or KPI computations.
    pub fn analyses_run(&self) -> usize {
        self.analyses
    }

    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    pub fn take_invocations(&mut self) -> Vec<ToolInvocation> {
        std::mem::take(&mut self.invocations)
    }

    /// A layout handed in through `submit_layout`, if any.
    pub fn take_submitted(&mut self) -> Option<LayoutDecision> {
        self.submitted.take()
    }

    /// Execute a tool call.
    ///
    /// Bad arguments come back as a failed `ToolResult` for the engine to
    /// correct. Data and analysis failures are returned as errors and end the
    /// request.
    pub async fn execute(&mut self, tool_call: &ToolCall) -> SynthesisResult<ToolResult> {
        let name = tool_call.function.name.as_str();
        let args = &tool_call.function.arguments;

        debug!("Executing tool: {} with args: {}", name, args);

        let outcome = match name {
            "read_data" => self.read_data(args).await,
            "analyze_data" => self.analyze_data(args).await,
            "calculate_kpi" => self.calculate_kpi(args).await,
            "validate_path" => self.validate_path(args).await,
            "submit_layout" => Ok(self.submit_layout(args)),
            _ => Ok(ToolResult::error(format!("Unknown tool: {}", name))),
        };

        let ok = matches!(&outcome, Ok(result) if result.success);
        self.invocations.push(ToolInvocation {
            round: self.round,
            tool: name.to_string(),
            ok,
        });
        info!(round = self.round, tool = name, ok, "Tool invoked");

        outcome
    }

    /// Resolve the `path` argument against the request's references.
    ///
    /// When the request carries a single reference the argument may be omitted.
    fn resolve(&self, args: &Value) -> Result<RemoteDataReference, ToolResult> {
        match args.get("path").and_then(|v| v.as_str()) {
            Some(path) => self
                .references
                .iter()
                .find(|r| r.as_str() == path.trim())
                .cloned()
                .ok_or_else(|| {
                    ToolResult::error(format!(
                        "'{}' is not one of this request's data paths: {}",
                        path,
                        self.reference_list()
                    ))
                }),
            None if self.references.len() == 1 => Ok(self.references[0].clone()),
            None => Err(ToolResult::error(
                "Missing required parameter: path".to_string(),
            )),
        }
    }

    fn reference_list(&self) -> String {
        if self.references.is_empty() {
            return "(none)".to_string();
        }
        self.references
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn load(
        &mut self,
        reference: &RemoteDataReference,
        format: Option<DataFormat>,
    ) -> SynthesisResult<&ParsedDataset> {
        let key = reference.as_str().to_string();
        let cached = self.datasets.contains_key(&key) && format.is_none();

        if !cached {
            let options = ReadOptions {
                format,
                ..ReadOptions::default()
            };
            let dataset = read_dataset(self.store.as_ref(), reference, &options).await?;
            self.datasets.insert(key.clone(), dataset);
        }

        self.datasets
            .get(&key)
            .ok_or_else(|| SynthesisError::Analysis(format!("dataset '{}' was not loaded", key)))
    }

    /// Read a dataset and return its fields plus a bounded preview.
    async fn read_data(&mut self, args: &Value) -> SynthesisResult<ToolResult> {
        let reference = match self.resolve(args) {
            Ok(r) => r,
            Err(result) => return Ok(result),
        };

        let format = match args.get("file_type").and_then(|v| v.as_str()) {
            None => None,
            Some(t) => match t.trim().to_lowercase().as_str() {
                "json" => Some(DataFormat::Json),
                "csv" => Some(DataFormat::Csv),
                other => {
                    return Ok(ToolResult::error(format!(
                        "Unsupported file_type '{}': expected json or csv",
                        other
                    )))
                }
            },
        };

        let preview_rows = args
            .get("preview_rows")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.preview_rows);

        let dataset = self.load(&reference, format).await?;
        let records: Vec<_> = dataset.records.iter().take(preview_rows).collect();

        Ok(ToolResult::json(json!({
            "path": dataset.source,
            "format": dataset.format,
            "total_records": dataset.total_records,
            "returned_records": records.len(),
            "fields": dataset.fields,
            "records": records,
        })))
    }

    /// Shape summary, optionally grouped.
    async fn analyze_data(&mut self, args: &Value) -> SynthesisResult<ToolResult> {
        let reference = match self.resolve(args) {
            Ok(r) => r,
            Err(result) => return Ok(result),
        };
        let group_by = args
            .get("group_by")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from);

        let dataset = self.load(&reference, None).await?;
        let summary = analyze(dataset, group_by.as_deref())?;
        self.analyses += 1;

        Ok(ToolResult::json(json!({
            "path": reference.as_str(),
            "summary": summary,
        })))
    }

    /// KPI over one numeric field, optionally per group.
    async fn calculate_kpi(&mut self, args: &Value) -> SynthesisResult<ToolResult> {
        let reference = match self.resolve(args) {
            Ok(r) => r,
            Err(result) => return Ok(result),
        };

        let Some(field) = args.get("field").and_then(|v| v.as_str()) else {
            return Ok(ToolResult::error(
                "Missing required parameter: field".to_string(),
            ));
        };

        let operation = match args
            .get("operation")
            .and_then(|v| v.as_str())
            .unwrap_or("sum")
            .parse::<KpiOperation>()
        {
            Ok(op) => op,
            Err(e) => return Ok(ToolResult::error(e)),
        };

        let group_by = args
            .get("group_by")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from);

        let dataset = self.load(&reference, None).await?;
        let results = calculate_kpi(dataset, field, operation, group_by.as_deref())?;
        self.analyses += 1;

        Ok(ToolResult::json(json!({
            "path": reference.as_str(),
            "results": results,
        })))
    }

    /// Existence check without downloading the object.
    async fn validate_path(&mut self, args: &Value) -> SynthesisResult<ToolResult> {
        let reference = match self.resolve(args) {
            Ok(r) => r,
            Err(result) => return Ok(result),
        };

        match self.store.exists(&reference).await {
            Ok(exists) => Ok(ToolResult::json(json!({
                "exists": exists,
                "path": reference.as_str(),
            }))),
            Err(StoreError::Timeout(after)) => Err(SynthesisError::Timeout(after)),
            Err(e) => Ok(ToolResult::error(format!(
                "Could not check {}: {}",
                reference, e
            ))),
        }
    }

    fn submit_layout(&mut self, args: &Value) -> ToolResult {
        let layout = args.get("layout").cloned().unwrap_or_else(|| args.clone());
        match serde_json::from_value::<LayoutDecision>(layout) {
            Ok(decision) => {
                debug!(
                    "Layout submitted with {} header and {} main sections",
                    decision.sections.header.len(),
                    decision.sections.main.len()
                );
                self.submitted = Some(decision);
                ToolResult::success("accepted".to_string())
            }
            Err(e) => ToolResult::error(format!("Invalid layout: {}", e)),
        }
    }
}

/// Get the tool definitions for the Ollama API.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "read_data".to_string(),
                description: "Read a CSV or JSON dataset. Returns field names with inferred types and the first rows.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "One of the request's data paths"
                        },
                        "file_type": {
                            "type": "string",
                            "enum": ["json", "csv"],
                            "description": "Override the encoding detected from the extension"
                        },
                        "preview_rows": {
                            "type": "integer",
                            "description": "Number of rows to return (default: 20)"
                        }
                    },
                    "required": ["path"]
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "analyze_data".to_string(),
                description: "Summarise a dataset: row count, fields, numeric fields, and optional per-group counts and totals.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "One of the request's data paths"
                        },
                        "group_by": {
                            "type": "string",
                            "description": "Field to group records by"
                        }
                    },
                    "required": ["path"]
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "calculate_kpi".to_string(),
                description: "Compute sum, average, max or min over a numeric field, optionally per group.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "One of the request's data paths"
                        },
                        "field": {
                            "type": "string",
                            "description": "Numeric field to aggregate"
                        },
                        "operation": {
                            "type": "string",
                            "enum": ["sum", "average", "max", "min"],
                            "description": "Aggregate to compute (default: sum)"
                        },
                        "group_by": {
                            "type": "string",
                            "description": "Field to group records by"
                        }
                    },
                    "required": ["path", "field", "operation"]
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "validate_path".to_string(),
                description: "Check that a data path exists in storage without reading it.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "One of the request's data paths"
                        }
                    },
                    "required": ["path"]
                }),
            },
        },
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "submit_layout".to_string(),
                description: "Submit the finished report layout. Call this once, when the layout is complete.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "layout": {
                            "type": "object",
                            "description": "The layout: {title, sections: {header: [...], main: [...]}}"
                        }
                    },
                    "required": ["layout"]
                }),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalObjectStore, PathValidator};
    use tempfile::TempDir;

    const SALES_CSV: &str = "category,sales,month\nA,10,2024-01\nB,n/a,2024-01\nA,30,2024-02\n";

    fn executor(temp_dir: &TempDir, paths: &[&str], max_rounds: usize) -> ToolExecutor {
        let bucket = temp_dir.path().join("bucket");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(bucket.join("sales.csv"), SALES_CSV).unwrap();
        std::fs::write(bucket.join("flags.csv"), "name,flag\nx,yes\ny,no\n").unwrap();

        let validator = PathValidator::new("s3", "bucket").unwrap();
        let references = paths
            .iter()
            .map(|p| validator.validate(p).unwrap())
            .collect();
        let store = Arc::new(LocalObjectStore::new(temp_dir.path()));

        ToolExecutor::new(store, references, 2, max_rounds)
    }

    fn output(result: &ToolResult) -> Value {
        serde_json::from_str(&result.output).unwrap()
    }

    #[tokio::test]
    async fn test_read_data_preview() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &["s3://bucket/sales.csv"], 5);

        let result = tools
            .execute(&ToolCall::new("read_data", json!({"path": "s3://bucket/sales.csv"})))
            .await
            .unwrap();

        assert!(result.success);
        let value = output(&result);
        assert_eq!(value["total_records"], 3);
        assert_eq!(value["returned_records"], 2);
        assert_eq!(value["fields"][0]["name"], "category");
        assert_eq!(tools.datasets_read(), 1);
    }

    #[tokio::test]
    async fn test_path_outside_request_is_a_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &["s3://bucket/sales.csv"], 5);

        let result = tools
            .execute(&ToolCall::new("read_data", json!({"path": "s3://bucket/flags.csv"})))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.content().starts_with("Error:"));
        assert_eq!(tools.datasets_read(), 0);
        assert!(!tools.invocations()[0].ok);
    }

    #[tokio::test]
    async fn test_single_reference_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &["s3://bucket/sales.csv"], 5);

        let result = tools
            .execute(&ToolCall::new("analyze_data", json!({"group_by": "category"})))
            .await
            .unwrap();

        let value = output(&result);
        assert_eq!(value["summary"]["row_count"], 3);
        assert_eq!(value["summary"]["groups"]["entries"][0]["key"], "A");
        assert_eq!(tools.analyses_run(), 1);
    }

    #[tokio::test]
    async fn test_kpi_average_excludes_non_numeric() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &["s3://bucket/sales.csv"], 5);

        let result = tools
            .execute(&ToolCall::new(
                "calculate_kpi",
                json!({"path": "s3://bucket/sales.csv", "field": "sales", "operation": "average"}),
            ))
            .await
            .unwrap();

        let value = output(&result);
        assert_eq!(value["results"][0]["value"], 20.0);
        assert_eq!(value["results"][0]["included"], 2);
    }

    #[tokio::test]
    async fn test_kpi_over_text_field_is_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &["s3://bucket/flags.csv"], 5);

        let err = tools
            .execute(&ToolCall::new(
                "calculate_kpi",
                json!({"field": "flag", "operation": "sum"}),
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "empty_aggregation");
        assert!(!tools.invocations()[0].ok);
    }

    #[tokio::test]
    async fn test_bad_operation_is_a_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &["s3://bucket/sales.csv"], 5);

        let result = tools
            .execute(&ToolCall::new(
                "calculate_kpi",
                json!({"field": "sales", "operation": "median"}),
            ))
            .await
            .unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_validate_path_reports_missing_object() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(
            &temp_dir,
            &["s3://bucket/sales.csv", "s3://bucket/missing.csv"],
            5,
        );

        let present = tools
            .execute(&ToolCall::new("validate_path", json!({"path": "s3://bucket/sales.csv"})))
            .await
            .unwrap();
        let missing = tools
            .execute(&ToolCall::new("validate_path", json!({"path": "s3://bucket/missing.csv"})))
            .await
            .unwrap();

        assert_eq!(output(&present)["exists"], true);
        assert_eq!(output(&missing)["exists"], false);
    }

    #[tokio::test]
    async fn test_submit_layout() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &[], 5);

        let bad = tools
            .execute(&ToolCall::new("submit_layout", json!({"layout": {"sections": 3}})))
            .await
            .unwrap();
        assert!(!bad.success);
        assert!(tools.take_submitted().is_none());

        let good = tools
            .execute(&ToolCall::new(
                "submit_layout",
                json!({"layout": {"title": "T", "sections": {"header": [], "main": []}}}),
            ))
            .await
            .unwrap();
        assert!(good.success);
        assert_eq!(tools.take_submitted().unwrap().title, "T");
    }

    #[tokio::test]
    async fn test_unknown_tool_and_missing_path() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(
            &temp_dir,
            &["s3://bucket/sales.csv", "s3://bucket/flags.csv"],
            5,
        );

        let unknown = tools
            .execute(&ToolCall::new("list_files", json!({})))
            .await
            .unwrap();
        assert_eq!(unknown.error.as_deref(), Some("Unknown tool: list_files"));

        let missing = tools
            .execute(&ToolCall::new("read_data", json!({})))
            .await
            .unwrap();
        assert_eq!(
            missing.error.as_deref(),
            Some("Missing required parameter: path")
        );
        assert_eq!(tools.take_invocations().len(), 2);
    }

    #[test]
    fn test_round_budget() {
        let temp_dir = TempDir::new().unwrap();
        let mut tools = executor(&temp_dir, &[], 2);

        assert_eq!(tools.begin_round().unwrap(), 1);
        assert_eq!(tools.begin_round().unwrap(), 2);
        let err = tools.begin_round().unwrap_err();
        assert!(matches!(err, SynthesisError::DecisionBudgetExceeded(2)));
    }

    #[test]
    fn test_tool_definitions() {
        let tools = get_tool_definitions();
        assert_eq!(tools.len(), 5);

        let names: Vec<_> = tools.iter().map(|t| t.function.name.as_str()).collect();
        assert!(names.contains(&"read_data"));
        assert!(names.contains(&"calculate_kpi"));
        assert!(names.contains(&"submit_layout"));
    }
}
