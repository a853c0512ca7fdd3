use crate::algorithms::PassSpec;
use crate::error::{ErrorKind, WipeError};
use crate::{Device, JobStatus, WipeMethod};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// One error as recorded in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedError {
    pub kind: ErrorKind,
    pub message: String,
    pub chunk: Option<u64>,
    pub lane: Option<usize>,
}

impl ReportedError {
    pub fn new(err: &WipeError, lane: Option<usize>) -> Self {
        let chunk = match err {
            WipeError::Verification { chunk, .. } => Some(*chunk),
            _ => None,
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            chunk,
            lane,
        }
    }
}

/// Terminal record of one job. Produced exactly once per `WipeEngine::run`.
///
/// `Failed` and `Cancelled` reports describe a device left partially
/// overwritten; `bytes_written` and `errors` say how far the job got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WipeReport {
    pub job_id: Uuid,
    pub device: Device,
    pub method: WipeMethod,
    pub passes: Vec<PassSpec>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// `Completed`, `Failed` or `Cancelled`
    pub status: JobStatus,
    /// Every state the job entered, in order
    pub transitions: Vec<JobStatus>,
    pub bytes_written: u64,
    pub chunks_planned: u64,
    pub chunks_completed: u64,
    pub lanes: usize,
    pub verified: bool,
    pub throughput_bps: u64,
    pub errors: Vec<ReportedError>,
    /// SHA-256 over the report with this field empty
    pub digest: String,
}

impl WipeReport {
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    /// Fill in `digest` from the rest of the report
    pub fn seal(&mut self) -> Result<()> {
        self.digest = self.compute_digest()?;
        Ok(())
    }

    /// Whether `digest` still matches the report content
    pub fn verify_digest(&self) -> Result<bool> {
        Ok(self.compute_digest()? == self.digest)
    }

    fn compute_digest(&self) -> Result<String> {
        let mut unsealed = self.clone();
        unsealed.digest = String::new();

        let json = serde_json::to_vec(&unsealed).context("Failed to serialize report")?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&json).context("Malformed report")
    }
}
