//! Report model and output formatters

pub mod formatter;
pub mod report;

pub use formatter::{save_report_to_file, suggest_filename, OutputFormatter, ReportGenerator};
pub use report::{EvaluationReport, ReportBody, ReportMetadata};
