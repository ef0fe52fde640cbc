//! JSON report adapter implementing ReportPort.

use crate::domain::error::ScanError;
use crate::domain::report::ScanReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &ScanReport) -> Result<String, ScanError> {
        serde_json::to_string_pretty(report).map_err(|e| ScanError::Report {
            reason: format!("failed to serialize report: {e}"),
        })
    }
}
