//! Dataset reading, inference, summaries and KPIs.
//!
//! These are the tools the decision engine can invoke. Each operates on one
//! request-scoped `ParsedDataset`.

pub mod infer;
pub mod kpi;
pub mod reader;
pub mod summary;

pub use kpi::{calculate, calculate_grouped, calculate_kpi};
pub use reader::{read_dataset, ReadOptions};
pub use summary::{analyze, group_records};
