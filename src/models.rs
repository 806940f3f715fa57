//! Data models for layout synthesis.
//!
//! This module contains the request, dataset, analysis and report-document
//! structures that flow through the synthesis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A natural-language reporting request plus the data it may draw on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// What the user wants to see.
    #[serde(alias = "user_request")]
    pub user_request: String,
    /// Remote data references, in the order supplied. Duplicates are allowed.
    #[serde(default, alias = "s3_paths", alias = "data_paths")]
    pub data_paths: Vec<String>,
}

impl ReportRequest {
    pub fn new(user_request: impl Into<String>, data_paths: Vec<String>) -> Self {
        Self {
            user_request: user_request.into(),
            data_paths,
        }
    }
}

/// One parsed record: field name to scalar value, in first-seen field order.
pub type Record = Map<String, Value>;

/// Inferred type of a dataset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Numeric,
    Text,
    /// Text that looks like ISO-8601 dates. Aggregated as text.
    Date,
    /// No non-null value was observed.
    Unknown,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Numeric => write!(f, "numeric"),
            FieldType::Text => write!(f, "text"),
            FieldType::Date => write!(f, "date"),
            FieldType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A field name with its inferred type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
}

/// Encoding of a remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Json,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "csv"),
            DataFormat::Json => write!(f, "json"),
        }
    }
}

/// The immutable result of reading one data reference.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedDataset {
    /// The reference the data was read from.
    pub source: String,
    pub format: DataFormat,
    pub records: Vec<Record>,
    /// Fields in first-seen order with their inferred types.
    pub fields: Vec<FieldInfo>,
    /// Number of records in the object before any preview bound was applied.
    pub total_records: usize,
}

impl ParsedDataset {
    /// Whether only a prefix of the object's records was kept.
    pub fn is_preview(&self) -> bool {
        self.records.len() < self.total_records
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.field_type)
    }

    /// Names of the fields classified numeric.
    pub fn numeric_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::Numeric)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Totals of one numeric field within a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTotal {
    pub field: String,
    pub total: f64,
}

/// One group of a grouped aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub key: String,
    pub count: usize,
    pub totals: Vec<FieldTotal>,
}

impl GroupEntry {
    pub fn total(&self, field: &str) -> Option<f64> {
        self.totals.iter().find(|t| t.field == field).map(|t| t.total)
    }
}

/// Group table keyed by the distinct values of `group_by`, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTable {
    pub group_by: String,
    pub entries: Vec<GroupEntry>,
}

impl GroupTable {
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn get(&self, key: &str) -> Option<&GroupEntry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

/// Shape summary of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub row_count: usize,
    pub fields: Vec<String>,
    pub numeric_fields: Vec<String>,
    pub field_types: Vec<FieldInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<GroupTable>,
}

/// Scalar aggregate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiOperation {
    #[serde(alias = "total")]
    Sum,
    #[serde(alias = "avg", alias = "mean")]
    Average,
    Max,
    Min,
}

impl fmt::Display for KpiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiOperation::Sum => write!(f, "sum"),
            KpiOperation::Average => write!(f, "average"),
            KpiOperation::Max => write!(f, "max"),
            KpiOperation::Min => write!(f, "min"),
        }
    }
}

impl std::str::FromStr for KpiOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" | "total" => Ok(KpiOperation::Sum),
            "average" | "avg" | "mean" => Ok(KpiOperation::Average),
            "max" => Ok(KpiOperation::Max),
            "min" => Ok(KpiOperation::Min),
            other => Err(format!("Unknown KPI operation: {}", other)),
        }
    }
}

/// One computed KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiResult {
    pub value: f64,
    pub operation: KpiOperation,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Number of values that took part in the computation.
    pub included: usize,
}

/// Where a content item's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "TEXT", alias = "text")]
    Text,
    #[serde(rename = "S3", alias = "s3")]
    S3,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Text => write!(f, "TEXT"),
            Source::S3 => write!(f, "S3"),
        }
    }
}

/// A single renderable binding inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub source: Source,
    pub component: String,
    /// Literal text, or a data reference when `source` is `S3`.
    pub value: String,
    #[serde(default)]
    pub props: Map<String, Value>,
}

/// A titled group of content items rendered by one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub section_type: String,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub contents: Vec<ContentItem>,
}

/// Header and main section lists of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSections {
    pub header: Vec<Section>,
    pub main: Vec<Section>,
}

/// The validated report layout returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub report_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub sections: ReportSections,
}

impl ReportDocument {
    /// Iterate over every content item with the section that holds it.
    pub fn items(&self) -> impl Iterator<Item = (&Section, &ContentItem)> {
        self.sections
            .header
            .iter()
            .chain(self.sections.main.iter())
            .flat_map(|s| s.contents.iter().map(move |c| (s, c)))
    }
}
