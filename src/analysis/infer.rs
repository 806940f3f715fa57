//! Field-type inference and scalar coercion.
//!
//! Pure functions over observed values. A field is numeric only when every
//! non-null sampled value parses as a number.

use crate::models::{FieldInfo, FieldType, Record};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Maximum number of records inspected per field.
pub const DEFAULT_SAMPLE_SIZE: usize = 500;

/// Null, missing-equivalent, or blank text.
pub fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Numeric reading of a value. Text is parsed; booleans and non-finite numbers are not numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Canonical text of a scalar, used for grouping keys.
pub fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Whether a string looks like an ISO-8601 date or timestamp.
pub fn is_iso_date(s: &str) -> bool {
    let s = s.trim();
    if s.len() < 7 {
        return false;
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || (s.len() == 7 && NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").is_ok())
}

/// Classify one field from its observed values.
pub fn infer_field_type<'a, I>(values: I, sample_size: usize) -> FieldType
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let mut observed = 0usize;
    let mut all_numeric = true;
    let mut all_dates = true;

    for value in values.into_iter().take(sample_size).flatten() {
        if is_null_like(value) {
            continue;
        }
        observed += 1;

        if as_number(value).is_none() {
            all_numeric = false;
        }
        match value {
            Value::String(s) if is_iso_date(s) => {}
            _ => all_dates = false,
        }
    }

    if observed == 0 {
        FieldType::Unknown
    } else if all_numeric {
        FieldType::Numeric
    } else if all_dates {
        FieldType::Date
    } else {
        FieldType::Text
    }
}

/// Field names in first-seen order, each classified.
///
/// `columns` are declared up front (a CSV header) and come first even when no
/// record carries a value for them; record keys not among them follow.
pub fn infer_fields(columns: &[String], records: &[Record], sample_size: usize) -> Vec<FieldInfo> {
    let mut names: Vec<&String> = Vec::new();
    for name in columns {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    for record in records {
        for name in record.keys() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    names
        .into_iter()
        .map(|name| FieldInfo {
            name: name.clone(),
            field_type: infer_field_type(records.iter().map(|r| r.get(name)), sample_size),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(10)), Some(10.0));
        assert_eq!(as_number(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(as_number(&json!("n/a")), None);
        assert_eq!(as_number(&json!("NaN")), None);
        assert_eq!(as_number(&json!("inf")), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&Value::Null), None);
    }

    #[test]
    fn test_numeric_requires_every_value() {
        let values = [json!(10), json!("20"), Value::Null, json!(30.5)];
        assert_eq!(
            infer_field_type(values.iter().map(Some), DEFAULT_SAMPLE_SIZE),
            FieldType::Numeric
        );

        let values = [json!(10), json!("n/a"), json!(30)];
        assert_eq!(
            infer_field_type(values.iter().map(Some), DEFAULT_SAMPLE_SIZE),
            FieldType::Text
        );
    }

    #[test]
    fn test_date_and_unknown() {
        let values = [json!("2024-01-01"), json!("2024-01-02T10:00:00Z"), json!("2024-02")];
        assert_eq!(
            infer_field_type(values.iter().map(Some), DEFAULT_SAMPLE_SIZE),
            FieldType::Date
        );

        let values = [Value::Null, json!("")];
        assert_eq!(
            infer_field_type(values.iter().map(Some), DEFAULT_SAMPLE_SIZE),
            FieldType::Unknown
        );
        assert_eq!(infer_field_type(vec![None, None], 10), FieldType::Unknown);
    }

    #[test]
    fn test_sample_size_bounds_inspection() {
        let values = [json!(1), json!(2), json!("text")];
        assert_eq!(infer_field_type(values.iter().map(Some), 2), FieldType::Numeric);
    }

    #[test]
    fn test_infer_fields_first_seen_order() {
        let data = records(json!([
            {"date": "2024-01-01", "sales": 10},
            {"sales": 20, "region": "north", "date": "2024-01-02"}
        ]));

        let fields = infer_fields(&[], &data, DEFAULT_SAMPLE_SIZE);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["date", "sales", "region"]);
        assert_eq!(fields[0].field_type, FieldType::Date);
        assert_eq!(fields[1].field_type, FieldType::Numeric);
        assert_eq!(fields[2].field_type, FieldType::Text);
    }

    #[test]
    fn test_infer_fields_keeps_declared_columns() {
        let columns = vec!["category".to_string(), "sales".to_string()];
        let fields = infer_fields(&columns, &[], DEFAULT_SAMPLE_SIZE);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["category", "sales"]);
        assert!(fields.iter().all(|f| f.field_type == FieldType::Unknown));

        let data = records(json!([{"sales": 5, "extra": "x"}]));
        let fields = infer_fields(&columns, &data, DEFAULT_SAMPLE_SIZE);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["category", "sales", "extra"]);
        assert_eq!(fields[0].field_type, FieldType::Unknown);
        assert_eq!(fields[1].field_type, FieldType::Numeric);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(Some(&json!("A"))), "A");
        assert_eq!(scalar_text(Some(&json!(3))), "3");
        assert_eq!(scalar_text(Some(&Value::Null)), "null");
        assert_eq!(scalar_text(None), "null");
    }
}
