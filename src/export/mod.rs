pub mod csv;
pub mod gpx;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::AppConfig;
use crate::types::{ExportResult, Reading, SessionElement};
use crate::utils::format_file_stamp;

pub use self::csv::{csv_row, parse_csv_row, write_readings_csv, CSV_HEADER};
pub use self::gpx::write_gpx;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to create export directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Consumer of a finished recording
pub trait SessionExporter: Send {
    fn export(
        &self,
        start: &DateTime<Utc>,
        readings: &[Reading],
        elements: &[SessionElement],
    ) -> Result<ExportResult, ExportError>;
}

/// Writes `<stamp>.csv` and `<stamp>.gpx` into one directory
#[derive(Debug, Clone)]
pub struct FileExporter {
    directory: PathBuf,
    creator: String,
}

impl FileExporter {
    pub fn new<P: Into<PathBuf>>(directory: P, creator: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            creator: creator.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.get_export_directory(), config.export.creator.clone())
    }

    pub fn file_paths(&self, start: &DateTime<Utc>) -> (PathBuf, PathBuf) {
        let stamp = format_file_stamp(start);
        (
            self.directory.join(format!("{}.csv", stamp)),
            self.directory.join(format!("{}.gpx", stamp)),
        )
    }
}

fn write_file<F>(path: &Path, write: F) -> Result<usize, ExportError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<usize>,
{
    let wrap = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(wrap)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(wrap)
}

impl SessionExporter for FileExporter {
    fn export(
        &self,
        start: &DateTime<Utc>,
        readings: &[Reading],
        elements: &[SessionElement],
    ) -> Result<ExportResult, ExportError> {
        std::fs::create_dir_all(&self.directory).map_err(|source| ExportError::CreateDir {
            path: self.directory.clone(),
            source,
        })?;

        let (csv_path, gpx_path) = self.file_paths(start);

        let written = write_file(&csv_path, |w| write_readings_csv(w, readings)).and_then(|rows| {
            write_file(&gpx_path, |w| write_gpx(w, &self.creator, elements)).map(|points| (rows, points))
        });

        match written {
            Ok((rows, points)) => {
                let result = ExportResult::new(csv_path, gpx_path, rows, points);
                info!("{}", result.message());
                Ok(result)
            }
            Err(e) => {
                // 不留下半截文件
                for path in [&csv_path, &gpx_path] {
                    if path.exists() {
                        if let Err(remove_err) = std::fs::remove_file(path) {
                            warn!("Failed to remove partial export {}: {}", path.display(), remove_err);
                        }
                    }
                }
                Err(e)
            }
        }
    }
}
