//! Dataset reader for remote CSV and JSON objects.
//!
//! The encoding is chosen from an explicit hint, then the key's extension,
//! then the content type reported by the store. Full and preview reads parse
//! the whole object the same way; preview only bounds the records kept.

use crate::analysis::infer::{infer_fields, DEFAULT_SAMPLE_SIZE};
use crate::error::{SynthesisError, SynthesisResult};
use crate::models::{DataFormat, ParsedDataset, Record};
use crate::storage::{ObjectStore, RemoteDataReference};
use serde_json::Value;
use tracing::{debug, info};

/// Options for a single read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Explicit encoding, overriding extension and content type.
    pub format: Option<DataFormat>,
    /// Keep only the first N records.
    pub preview_rows: Option<usize>,
    /// Records inspected per field during type inference.
    pub sample_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            format: None,
            preview_rows: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl ReadOptions {
    pub fn preview(rows: usize) -> Self {
        Self {
            preview_rows: Some(rows),
            ..Self::default()
        }
    }
}

/// Fetch and parse one validated reference.
pub async fn read_dataset(
    store: &dyn ObjectStore,
    reference: &RemoteDataReference,
    options: &ReadOptions,
) -> SynthesisResult<ParsedDataset> {
    debug!("Reading {} via {} store", reference, store.name());

    let object = store
        .fetch(reference)
        .await
        .map_err(|e| e.into_synthesis(reference))?;

    let (format, delimiter) =
        detect_format(reference, object.content_type.as_deref(), options.format)?;

    let dataset = parse_dataset(
        reference.as_str(),
        &object.bytes,
        format,
        delimiter,
        options,
    )?;

    info!(
        "Read {} ({}): {} of {} records, {} fields",
        reference,
        format,
        dataset.records.len(),
        dataset.total_records,
        dataset.fields.len()
    );

    Ok(dataset)
}

/// Pick the encoding and, for delimited text, the delimiter byte.
pub fn detect_format(
    reference: &RemoteDataReference,
    content_type: Option<&str>,
    hint: Option<DataFormat>,
) -> SynthesisResult<(DataFormat, u8)> {
    let extension = reference.extension();
    let tab_separated = extension.as_deref() == Some("tsv")
        || content_type.is_some_and(|c| c.contains("tab-separated"));
    let delimiter = if tab_separated { b'\t' } else { b',' };

    if let Some(format) = hint {
        return Ok((format, delimiter));
    }

    match extension.as_deref() {
        Some("json") => return Ok((DataFormat::Json, delimiter)),
        Some("csv") | Some("tsv") => return Ok((DataFormat::Csv, delimiter)),
        _ => {}
    }

    if let Some(content_type) = content_type {
        let content_type = content_type.to_lowercase();
        if content_type.contains("json") {
            return Ok((DataFormat::Json, delimiter));
        }
        if content_type.contains("csv") || content_type.contains("tab-separated") {
            return Ok((DataFormat::Csv, delimiter));
        }
    }

    Err(SynthesisError::DataFormat {
        path: reference.to_string(),
        reason: "cannot determine encoding from extension or content type".to_string(),
    })
}

/// Parse raw bytes into a dataset.
pub fn parse_dataset(
    source: &str,
    bytes: &[u8],
    format: DataFormat,
    delimiter: u8,
    options: &ReadOptions,
) -> SynthesisResult<ParsedDataset> {
    let format_error = |reason: String| SynthesisError::DataFormat {
        path: source.to_string(),
        reason,
    };

    let (columns, mut records) = match format {
        DataFormat::Csv => parse_delimited(bytes, delimiter).map_err(format_error)?,
        DataFormat::Json => (Vec::new(), parse_json(bytes).map_err(format_error)?),
    };

    let total_records = records.len();
    if let Some(limit) = options.preview_rows {
        records.truncate(limit);
    }

    let fields = infer_fields(&columns, &records, options.sample_size);

    Ok(ParsedDataset {
        source: source.to_string(),
        format,
        records,
        fields,
        total_records,
    })
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// First row is the header; every other row must have the same width.
///
/// Only header names are trimmed. Cells keep their exact text.
fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<(Vec<String>, Vec<Record>), String> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(strip_bom(bytes));

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| format!("unreadable header row: {}", e))?
        .iter()
        .map(String::from)
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err("missing header row".to_string());
    }
    for (i, name) in headers.iter().enumerate() {
        if headers[..i].contains(name) {
            return Err(format!("duplicate column '{}'", name));
        }
    }

    let mut records = Vec::new();
    for (line_num, result) in csv_reader.records().enumerate() {
        let row = result.map_err(|e| format!("row {}: {}", line_num + 2, e))?;

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (name.clone(), value)
            })
            .collect();
        records.push(record);
    }

    Ok((headers, records))
}

/// Array of objects, or a single object treated as an array of one.
fn parse_json(bytes: &[u8]) -> Result<Vec<Record>, String> {
    let value: Value =
        serde_json::from_slice(strip_bom(bytes)).map_err(|e| format!("invalid JSON: {}", e))?;

    let objects = match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(format!(
                    "element {} is {} rather than an object",
                    i,
                    json_kind(&other)
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => vec![map],
        other => {
            return Err(format!(
                "top-level value is {} rather than an array or object",
                json_kind(&other)
            ))
        }
    };

    Ok(objects.into_iter().map(flatten_nested).collect())
}

/// Nested arrays and objects are kept as their JSON text so records stay scalar.
fn flatten_nested(record: Record) -> Record {
    record
        .into_iter()
        .map(|(k, v)| match v {
            Value::Array(_) | Value::Object(_) => (k, Value::String(v.to_string())),
            scalar => (k, scalar),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;
    use crate::storage::{LocalObjectStore, PathValidator};
    use serde_json::json;
    use tempfile::TempDir;

    fn validator() -> PathValidator {
        PathValidator::new("s3", "bucket").unwrap()
    }

    fn parse(bytes: &[u8], format: DataFormat) -> SynthesisResult<ParsedDataset> {
        parse_dataset("s3://bucket/x", bytes, format, b',', &ReadOptions::default())
    }

    #[test]
    fn test_parse_csv() {
        let dataset = parse(b"date,category,sales\n2024-01-01,A,100\n2024-01-02,B,\n", DataFormat::Csv)
            .unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.field_names(), vec!["date", "category", "sales"]);
        assert_eq!(dataset.records[0]["sales"], json!("100"));
        assert_eq!(dataset.records[1]["sales"], Value::Null);
        assert_eq!(dataset.field_type("sales"), Some(FieldType::Numeric));
        assert_eq!(dataset.field_type("date"), Some(FieldType::Date));
        assert_eq!(dataset.field_type("category"), Some(FieldType::Text));
    }

    #[test]
    fn test_header_only_csv_keeps_fields() {
        let dataset = parse(b"category,sales\n", DataFormat::Csv).unwrap();
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.field_names(), vec!["category", "sales"]);
        assert_eq!(dataset.field_type("category"), Some(FieldType::Unknown));

        let summary = crate::analysis::analyze(&dataset, Some("category")).unwrap();
        assert_eq!(summary.row_count, 0);
        assert!(summary.groups.unwrap().entries.is_empty());
    }

    #[test]
    fn test_csv_cells_keep_exact_text() {
        let dataset = parse(b" cat ,v\nA,1\nA ,2\n", DataFormat::Csv).unwrap();
        assert_eq!(dataset.field_names(), vec!["cat", "v"]);
        assert_eq!(dataset.records[1]["cat"], json!("A "));

        let groups = crate::analysis::group_records(&dataset, "cat").unwrap();
        assert_eq!(groups.keys(), vec!["A", "A "]);
    }

    #[test]
    fn test_csv_inconsistent_width() {
        let err = parse(b"a,b\n1,2\n3\n", DataFormat::Csv).unwrap_err();
        assert_eq!(err.kind(), "data_format_error");
    }

    #[test]
    fn test_csv_duplicate_column() {
        let err = parse(b"a,a\n1,2\n", DataFormat::Csv).unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn test_parse_json_array_and_object() {
        let dataset = parse(br#"[{"cat":"A","v":1},{"cat":"B","v":2}]"#, DataFormat::Json).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.numeric_fields(), vec!["v"]);

        let single = parse(br#"{"total": 42, "tags": ["x", "y"]}"#, DataFormat::Json).unwrap();
        assert_eq!(single.records.len(), 1);
        assert_eq!(single.records[0]["tags"], json!(r#"["x","y"]"#));
    }

    #[test]
    fn test_parse_json_errors() {
        assert_eq!(parse(b"[{\"a\":1},", DataFormat::Json).unwrap_err().kind(), "data_format_error");
        assert_eq!(parse(b"[1, 2]", DataFormat::Json).unwrap_err().kind(), "data_format_error");
        assert_eq!(parse(b"\"text\"", DataFormat::Json).unwrap_err().kind(), "data_format_error");
    }

    #[test]
    fn test_preview_bounds_records() {
        let options = ReadOptions::preview(2);
        let dataset = parse_dataset(
            "s3://bucket/x.csv",
            b"n\n1\n2\n3\n4\n",
            DataFormat::Csv,
            b',',
            &options,
        )
        .unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.total_records, 4);
        assert!(dataset.is_preview());
    }

    #[test]
    fn test_preview_keeps_parse_errors() {
        let err = parse_dataset(
            "s3://bucket/x.csv",
            b"a,b\n1,2\n3,4\n5\n",
            DataFormat::Csv,
            b',',
            &ReadOptions::preview(1),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "data_format_error");
    }

    #[test]
    fn test_detect_format() {
        let v = validator();
        let json_ref = v.validate("s3://bucket/a.JSON").unwrap();
        assert_eq!(detect_format(&json_ref, None, None).unwrap().0, DataFormat::Json);

        let tsv_ref = v.validate("s3://bucket/a.tsv").unwrap();
        assert_eq!(detect_format(&tsv_ref, None, None).unwrap(), (DataFormat::Csv, b'\t'));

        let bare = v.validate("s3://bucket/export").unwrap();
        assert_eq!(
            detect_format(&bare, Some("text/csv; charset=utf-8"), None).unwrap().0,
            DataFormat::Csv
        );
        assert_eq!(
            detect_format(&bare, None, Some(DataFormat::Json)).unwrap().0,
            DataFormat::Json
        );
        assert!(detect_format(&bare, None, None).is_err());
    }

    #[tokio::test]
    async fn test_read_dataset_from_store() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("bucket")).unwrap();
        std::fs::write(
            temp_dir.path().join("bucket").join("sales.json"),
            r#"[{"sales":10},{"sales":"n/a"},{"sales":30}]"#,
        )
        .unwrap();

        let store = LocalObjectStore::new(temp_dir.path());
        let reference = validator().validate("s3://bucket/sales.json").unwrap();
        let dataset = read_dataset(&store, &reference, &ReadOptions::default())
            .await
            .unwrap();

        assert_eq!(dataset.records.len(), 3);
        assert_eq!(dataset.field_type("sales"), Some(FieldType::Text));

        let missing = validator().validate("s3://bucket/missing.json").unwrap();
        let err = read_dataset(&store, &missing, &ReadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "data_unavailable");
    }
}
