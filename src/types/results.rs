use std::path::PathBuf;

/// Result of a session export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    pub csv_path: PathBuf,
    pub gpx_path: PathBuf,
    pub readings: usize,
    pub elements: usize,
}

impl ExportResult {
    pub fn new(csv_path: PathBuf, gpx_path: PathBuf, readings: usize, elements: usize) -> Self {
        Self {
            csv_path,
            gpx_path,
            readings,
            elements,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Exported {} readings to {} and {} track points to {}",
            self.readings,
            self.csv_path.display(),
            self.elements,
            self.gpx_path.display()
        )
    }
}
