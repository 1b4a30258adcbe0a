// src/report.rs
// Flat-file report storage: one `{id}.json` per report

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::ReportError;

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids come from callers on the read path, so anything that is not a plain
    /// file stem never maps to a path.
    fn file_for(&self, report_id: &str) -> Option<PathBuf> {
        let valid = !report_id.is_empty()
            && report_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return None;
        }
        Some(self.dir.join(format!("{}.json", report_id)))
    }

    pub async fn save(&self, report_id: &str, content: &str) -> Result<(), ReportError> {
        let path = self
            .file_for(report_id)
            .ok_or_else(|| ReportError::NotFound(report_id.to_string()))?;
        tokio::fs::write(&path, content).await?;
        info!("💾 [REPORT] Saved report {} ({} bytes)", report_id, content.len());
        Ok(())
    }

    pub async fn path_for(&self, report_id: &str) -> Option<PathBuf> {
        let path = self.file_for(report_id)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn load(&self, report_id: &str) -> Result<String, ReportError> {
        let path = self.path_for(report_id).await.ok_or_else(|| {
            warn!("⚠️ [REPORT] Report not found: {}", report_id);
            ReportError::NotFound(report_id.to_string())
        })?;
        Ok(tokio::fs::read_to_string(path).await?)
    }
}
