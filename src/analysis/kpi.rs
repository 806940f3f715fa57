//! KPI computation over one numeric field.
//!
//! Values that are missing or do not parse as numbers are excluded, never
//! counted as zero. If nothing is left to aggregate the computation fails.

use crate::analysis::infer::{as_number, scalar_text};
use crate::error::{SynthesisError, SynthesisResult};
use crate::models::{KpiOperation, KpiResult, ParsedDataset, Record};

/// Compute a single KPI over every record.
pub fn calculate(
    dataset: &ParsedDataset,
    field: &str,
    operation: KpiOperation,
) -> SynthesisResult<KpiResult> {
    aggregate(dataset.records.iter(), field, operation, None)
}

/// Compute one KPI per group of `group_by`, in first-seen group order.
pub fn calculate_grouped(
    dataset: &ParsedDataset,
    field: &str,
    operation: KpiOperation,
    group_by: &str,
) -> SynthesisResult<Vec<KpiResult>> {
    if !dataset.has_field(group_by) {
        return Err(SynthesisError::Analysis(format!(
            "grouping field '{}' not found",
            group_by
        )));
    }

    let mut groups: Vec<(String, Vec<&Record>)> = Vec::new();
    for record in &dataset.records {
        let key = scalar_text(record.get(group_by));
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(record),
            None => groups.push((key, vec![record])),
        }
    }

    groups
        .into_iter()
        .map(|(key, members)| aggregate(members.into_iter(), field, operation, Some(key)))
        .collect()
}

/// Dispatch to [`calculate`] or [`calculate_grouped`].
pub fn calculate_kpi(
    dataset: &ParsedDataset,
    field: &str,
    operation: KpiOperation,
    group_by: Option<&str>,
) -> SynthesisResult<Vec<KpiResult>> {
    match group_by {
        Some(group_by) => calculate_grouped(dataset, field, operation, group_by),
        None => calculate(dataset, field, operation).map(|r| vec![r]),
    }
}

fn aggregate<'a>(
    records: impl Iterator<Item = &'a Record>,
    field: &str,
    operation: KpiOperation,
    group: Option<String>,
) -> SynthesisResult<KpiResult> {
    let values: Vec<f64> = records
        .filter_map(|r| r.get(field).and_then(as_number))
        .collect();

    if values.is_empty() {
        return Err(SynthesisError::EmptyAggregation {
            field: field.to_string(),
            group,
        });
    }

    let value = match operation {
        KpiOperation::Sum => values.iter().sum(),
        KpiOperation::Average => values.iter().sum::<f64>() / values.len() as f64,
        KpiOperation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        KpiOperation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
    };

    Ok(KpiResult {
        value,
        operation,
        field: field.to_string(),
        group,
        included: values.len(),
    })
}
