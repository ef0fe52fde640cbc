//! Report output port.

use crate::domain::error::ScanError;
use crate::domain::report::ScanReport;
use std::fs;
use std::path::Path;

/// Port for rendering and writing run reports.
pub trait ReportPort {
    /// File extension of the rendered output, without the dot.
    fn extension(&self) -> &'static str;

    fn render(&self, report: &ScanReport) -> Result<String, ScanError>;

    /// Default implementation: renders and writes the whole document at once.
    fn write(&self, report: &ScanReport, path: &Path) -> Result<(), ScanError> {
        let content = self.render(report)?;
        fs::write(path, content).map_err(|e| ScanError::Report {
            reason: format!("failed to write {}: {}", path.display(), e),
        })
    }
}
