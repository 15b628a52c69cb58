//! Batch screening of a directory of fundus photographs.
//!
//! Images are screened in parallel on a rayon pool; one pipeline instance is
//! shared by every worker.
//!
//! # Example
//!
//! ```rust,ignore
//! use fundus_screen::batch::BatchScreener;
//! use std::path::Path;
//!
//! let screener = BatchScreener::new(&pipeline).max_parallel(4).recursive(true);
//! let report = screener.screen_directory(Path::new("./exams"))?;
//! println!("{} of {} screened", report.stats.successful, report.stats.total_files);
//! ```

mod file_discovery;
mod job;

pub use file_discovery::{ImageDiscovery, DEFAULT_EXTENSIONS};
pub use job::{JobOutcome, ScreeningJob};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::client::WireClient;
use crate::error::{Result, ScreeningError};
use crate::pipeline::ScreeningPipeline;
use crate::storage::ImageStore;

/// Aggregate counts for a batch.
#[derive(Debug, Default)]
pub struct BatchStats {
    /// Total files processed.
    pub total_files: usize,
    /// Successfully screened files.
    pub successful: usize,
    /// Failed files.
    pub failed: usize,
    /// Failures per category name.
    pub failures_by_category: BTreeMap<String, usize>,
    /// Total processing time in milliseconds.
    pub total_time_ms: u64,
}

/// Per-file outcomes plus aggregate counts.
#[derive(Debug)]
pub struct BatchReport {
    /// Outcomes in input order.
    pub outcomes: Vec<JobOutcome>,
    /// Aggregate counts.
    pub stats: BatchStats,
}

/// Parallel screener borrowing a pipeline.
pub struct BatchScreener<'a, C: WireClient, S: ImageStore> {
    pipeline: &'a ScreeningPipeline<C, S>,

    /// Maximum parallel jobs.
    max_parallel: usize,

    /// Whether to scan directories recursively.
    recursive: bool,
}

impl<'a, C: WireClient, S: ImageStore> BatchScreener<'a, C, S> {
    /// Create a screener using one thread per CPU.
    pub fn new(pipeline: &'a ScreeningPipeline<C, S>) -> Self {
        Self {
            pipeline,
            max_parallel: num_cpus::get(),
            recursive: false,
        }
    }

    /// Set maximum parallel jobs.
    pub fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n.max(1);
        self
    }

    /// Enable recursive directory scanning.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Screen every image found in a directory.
    pub fn screen_directory(&self, input_dir: &Path) -> Result<BatchReport> {
        let files = ImageDiscovery::new()
            .recursive(self.recursive)
            .discover(input_dir)?;

        if files.is_empty() {
            return Err(ScreeningError::InvalidFormat(format!(
                "No images found in {}",
                input_dir.display()
            )));
        }

        log::info!("Found {} images in {}", files.len(), input_dir.display());
        self.screen_files(&files)
    }

    /// Screen a list of image files.
    pub fn screen_files(&self, files: &[PathBuf]) -> Result<BatchReport> {
        let start = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
            .map_err(|e| ScreeningError::Internal(e.to_string()))?;

        let outcomes: Vec<JobOutcome> = pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .map(|(idx, path)| self.screen_one(idx, path))
                .collect()
        });

        let mut stats = BatchStats {
            total_files: files.len(),
            ..Default::default()
        };
        for outcome in &outcomes {
            match outcome.failure_category() {
                None => stats.successful += 1,
                Some(category) => {
                    stats.failed += 1;
                    *stats
                        .failures_by_category
                        .entry(category.to_string())
                        .or_default() += 1;
                }
            }
        }
        stats.total_time_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Batch finished: {} screened, {} failed in {} ms",
            stats.successful,
            stats.failed,
            stats.total_time_ms
        );

        Ok(BatchReport { outcomes, stats })
    }

    fn screen_one(&self, idx: usize, path: &Path) -> JobOutcome {
        let job = ScreeningJob::new(idx as u64, path.to_path_buf());
        let start = Instant::now();
        let result = self.pipeline.screen_file(path);

        JobOutcome {
            job,
            result,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreeningConfig;
    use crate::pipeline::tests::{response_body, FakeClient, MemoryStore};
    use image::RgbImage;
    use std::fs;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::new(width, height).save(path).unwrap();
    }

    #[test]
    fn test_batch_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 2, 2);
        write_png(&dir.path().join("b.png"), 2, 2);
        write_png(&dir.path().join("c.png"), 5, 5); // bitmap too small for this one
        fs::write(dir.path().join("readme.txt"), "skip me").unwrap();

        let pipeline = ScreeningPipeline::new(
            ScreeningConfig::for_endpoint("http://inference.test/predict"),
            FakeClient::ok(response_body(2, 2, [1.0, 2.0])),
            MemoryStore::default(),
        );

        let report = BatchScreener::new(&pipeline)
            .max_parallel(2)
            .screen_directory(dir.path())
            .unwrap();

        assert_eq!(report.stats.total_files, 3);
        assert_eq!(report.stats.successful, 2);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(
            report.stats.failures_by_category.get("malformed-response"),
            Some(&1)
        );
        assert!(report.outcomes[2].job.source_path.ends_with("c.png"));
        assert!(!report.outcomes[2].is_success());
        assert_eq!(pipeline.store().objects.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_batch_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ScreeningPipeline::new(
            ScreeningConfig::for_endpoint("http://inference.test/predict"),
            FakeClient::ok(String::new()),
            MemoryStore::default(),
        );

        assert!(BatchScreener::new(&pipeline)
            .screen_directory(dir.path())
            .is_err());
    }

    #[test]
    fn test_max_parallel_defaults() {
        let pipeline = ScreeningPipeline::new(
            ScreeningConfig::default(),
            FakeClient::ok(String::new()),
            MemoryStore::default(),
        );
        let screener = BatchScreener::new(&pipeline);
        assert_eq!(screener.max_parallel, num_cpus::get());
        assert_eq!(screener.max_parallel(0).max_parallel, 1);
    }
}
