//! Shape summaries and grouped aggregation.

use crate::analysis::infer::{as_number, scalar_text};
use crate::error::{SynthesisError, SynthesisResult};
use crate::models::{AnalysisSummary, FieldTotal, GroupEntry, GroupTable, ParsedDataset};

/// Summarize a dataset, grouping by `group_by` when given.
pub fn analyze(dataset: &ParsedDataset, group_by: Option<&str>) -> SynthesisResult<AnalysisSummary> {
    let groups = match group_by {
        Some(field) => Some(group_records(dataset, field)?),
        None => None,
    };

    Ok(AnalysisSummary {
        row_count: dataset.records.len(),
        fields: dataset.field_names(),
        numeric_fields: dataset.numeric_fields(),
        field_types: dataset.fields.clone(),
        groups,
    })
}

/// Group records by exact text equality of `group_by`, in first-seen order.
///
/// Each entry counts its records and totals every numeric field other than the
/// grouping field. Non-numeric values are skipped in the totals.
pub fn group_records(dataset: &ParsedDataset, group_by: &str) -> SynthesisResult<GroupTable> {
    if !dataset.has_field(group_by) {
        return Err(SynthesisError::Analysis(format!(
            "grouping field '{}' not found; available fields: {}",
            group_by,
            dataset.field_names().join(", ")
        )));
    }

    let numeric: Vec<String> = dataset
        .numeric_fields()
        .into_iter()
        .filter(|f| f != group_by)
        .collect();

    let mut entries: Vec<GroupEntry> = Vec::new();
    for record in &dataset.records {
        let key = scalar_text(record.get(group_by));

        let index = match entries.iter().position(|e| e.key == key) {
            Some(i) => i,
            None => {
                entries.push(GroupEntry {
                    key,
                    count: 0,
                    totals: numeric
                        .iter()
                        .map(|f| FieldTotal {
                            field: f.clone(),
                            total: 0.0,
                        })
                        .collect(),
                });
                entries.len() - 1
            }
        };

        let entry = &mut entries[index];
        entry.count += 1;
        for total in &mut entry.totals {
            if let Some(n) = record.get(&total.field).and_then(as_number) {
                total.total += n;
            }
        }
    }

    Ok(GroupTable {
        group_by: group_by.to_string(),
        entries,
    })
}
