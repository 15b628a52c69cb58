//! Batch job definitions.

use std::path::PathBuf;

use crate::error::{FailureCategory, ScreeningError};
use crate::pipeline::ScreeningResult;

/// One image to screen.
#[derive(Debug, Clone)]
pub struct ScreeningJob {
    /// Position in the batch.
    pub id: u64,

    /// Source image path.
    pub source_path: PathBuf,
}

impl ScreeningJob {
    /// Create a new job.
    pub fn new(id: u64, source_path: PathBuf) -> Self {
        Self { id, source_path }
    }

    /// Get the file name.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Outcome of a screening job.
#[derive(Debug)]
pub struct JobOutcome {
    /// The job that was processed.
    pub job: ScreeningJob,

    /// Screening result or the failure.
    pub result: Result<ScreeningResult, ScreeningError>,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl JobOutcome {
    /// Check if the job was successful.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Failure category, if the job failed.
    pub fn failure_category(&self) -> Option<FailureCategory> {
        self.result.as_ref().err().map(ScreeningError::category)
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.result {
            Ok(result) => write!(
                f,
                "{}: stage {} ({}), ratio {:.3} [{} ms]",
                self.job.file_name(),
                result.stage,
                result.status,
                result.distance_ratio,
                self.duration_ms
            ),
            Err(err) => write!(f, "{}: FAILED - {}", self.job.file_name(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_file_name() {
        let job = ScreeningJob::new(1, PathBuf::from("/exams/od.png"));
        assert_eq!(job.id, 1);
        assert_eq!(job.file_name(), "od.png");
    }

    #[test]
    fn test_failed_outcome() {
        let outcome = JobOutcome {
            job: ScreeningJob::new(2, PathBuf::from("os.png")),
            result: Err(ScreeningError::TransportError("refused".into()).into_screening_failure()),
            duration_ms: 5,
        };

        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_category(), Some(FailureCategory::Transport));
        assert!(outcome.to_string().contains("FAILED"));
    }
}
