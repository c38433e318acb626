use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{AnalysisSink, SinkError, StoredClause};

/// Appends one JSON object per record to a file.
#[derive(Debug, Clone)]
pub struct JsonlAnalysisSink {
    path: PathBuf,
}

impl JsonlAnalysisSink {
    /// Sink writing to `path`; the file and its parent directory are created on first insert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl AnalysisSink for JsonlAnalysisSink {
    async fn insert_many(&self, records: &[StoredClause]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| self.io_error(error))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|error| self.io_error(error))?;
        file.write_all(&buffer)
            .await
            .map_err(|error| self.io_error(error))?;
        file.flush().await.map_err(|error| self.io_error(error))?;

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "Stored clause analyses"
        );
        Ok(())
    }
}
