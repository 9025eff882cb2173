// animfit/src/processors/batch.rs
use crate::core::{
    CancelToken, ImageMetadata, OptimizationReport, OptimizationResult, OptimizeError,
    OptimizeParams, Optimizer, Result,
};
use crate::utils::{format_file_size, is_supported_format, percent_saved};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, PoisonError};
use walkdir::WalkDir;

/// Default ceiling, in megabytes, on decoded canvas memory shared by all
/// workers.
pub const DEFAULT_MEMORY_BUDGET_MB: u64 = 4096;

#[derive(Debug, Default)]
pub struct BatchStats {
    pub succeeded: usize,
    pub approvals_required: Vec<(PathBuf, u32)>,
    pub failed: usize,
    pub total_size_before: u64,
    pub total_size_after: u64,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchStats {
    pub fn processed(&self) -> usize {
        self.succeeded + self.approvals_required.len() + self.failed
    }

    pub fn savings_percent(&self) -> f64 {
        percent_saved(self.total_size_before, self.total_size_after)
    }

    fn record(&mut self, input: PathBuf, outcome: Result<OptimizationReport>) {
        match outcome {
            Ok(report) => match report.result {
                OptimizationResult::Success { metadata, .. } => {
                    self.succeeded += 1;
                    self.total_size_before += report.original.size_bytes;
                    self.total_size_after += metadata.size_bytes;
                }
                OptimizationResult::ApprovalRequired {
                    estimated_frame_reduction_percent,
                    ..
                } => {
                    self.approvals_required.push((input, estimated_frame_reduction_percent));
                }
                OptimizationResult::Failed { reason, best_achieved_size_bytes, .. } => {
                    self.failed += 1;
                    self.errors.push((
                        input,
                        format!("{} (best {} bytes)", reason, best_achieved_size_bytes),
                    ));
                }
            },
            Err(e) => {
                self.failed += 1;
                self.errors.push((input, e.to_string()));
            }
        }
    }
}

/// Bytes a fully decoded copy of the asset occupies: every frame is held
/// as an RGBA canvas while it is re-encoded.
fn decoded_footprint(metadata: &ImageMetadata) -> u64 {
    u64::from(metadata.width)
        * u64::from(metadata.height)
        * 4
        * u64::from(metadata.frame_count.max(1))
}

/// Counting gate over decoded-canvas bytes.
///
/// A request larger than the whole budget still runs, but only once it has
/// the gate to itself.
struct MemoryGate {
    limit: u64,
    in_use: Mutex<u64>,
    released: Condvar,
}

struct MemoryPermit<'a> {
    gate: &'a MemoryGate,
    bytes: u64,
}

impl MemoryGate {
    fn new(limit: u64) -> Self {
        Self {
            limit,
            in_use: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    fn acquire(&self, bytes: u64) -> MemoryPermit<'_> {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        while *in_use > 0 && in_use.saturating_add(bytes) > self.limit {
            in_use = self
                .released
                .wait(in_use)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_use += bytes;
        MemoryPermit { gate: self, bytes }
    }

    #[cfg(test)]
    fn in_use(&self) -> u64 {
        *self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for MemoryPermit<'_> {
    fn drop(&mut self) {
        let mut in_use = self.gate.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        *in_use = in_use.saturating_sub(self.bytes);
        self.gate.released.notify_all();
    }
}

/// Runs one independent pipeline per file on a rayon pool.
///
/// Every resize, pad, recolor and sample decodes the whole animation into
/// RGBA canvases, so a worker's peak memory is roughly
/// `width * height * 4 * frames`. Workers only start a file once that
/// estimate fits in the shared memory budget alongside the files already
/// running.
pub struct BatchProcessor {
    optimizer: Optimizer,
    params: OptimizeParams,
    thread_pool: Option<rayon::ThreadPool>,
    cancel: CancelToken,
    show_progress: bool,
    memory: MemoryGate,
}

impl BatchProcessor {
    /// `max_threads == 0` uses rayon's global pool (one thread per CPU).
    pub fn new(optimizer: Optimizer, params: OptimizeParams, max_threads: usize) -> Result<Self> {
        params.validate()?;

        let thread_pool = if max_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .thread_name(|i| format!("animfit-worker-{}", i))
                .build()
                .map_err(|e| {
                    OptimizeError::Processing(format!("Failed to create thread pool: {}", e))
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            optimizer,
            params,
            thread_pool,
            cancel: CancelToken::new(),
            show_progress: true,
            memory: MemoryGate::new(DEFAULT_MEMORY_BUDGET_MB * 1024 * 1024),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Caps the decoded-canvas bytes all workers may hold at once.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory = MemoryGate::new(bytes.max(1));
        self
    }

    pub fn process_directory(&self, input_dir: &Path, output_dir: &Path, recursive: bool) -> Result<BatchStats> {
        self.validate_paths(input_dir, output_dir)?;

        let inputs = self.collect_inputs(input_dir, recursive);

        if inputs.is_empty() {
            log::warn!("No GIF files found in {}", input_dir.display());
            return Ok(BatchStats::default());
        }

        log::info!("Optimizing {} files from {}", inputs.len(), input_dir.display());

        std::fs::create_dir_all(output_dir)?;

        let pb = self.create_progress_bar(inputs.len());

        let run = || -> Vec<(PathBuf, Result<OptimizationReport>)> {
            inputs
                .par_iter()
                .progress_with(pb.clone())
                .map(|input| {
                    let outcome = self.process_one(input, input_dir, output_dir);
                    (input.clone(), outcome)
                })
                .collect()
        };

        let results = match &self.thread_pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let mut stats = BatchStats::default();
        for (input, outcome) in results {
            stats.record(input, outcome);
        }

        pb.finish_with_message(format!(
            "{} optimized, {} awaiting approval, {} failed ({:.1}% smaller)",
            stats.succeeded,
            stats.approvals_required.len(),
            stats.failed,
            stats.savings_percent()
        ));

        Ok(stats)
    }

    fn process_one(&self, input: &Path, input_dir: &Path, output_dir: &Path) -> Result<OptimizationReport> {
        let relative = input.strip_prefix(input_dir).map_err(|_| {
            OptimizeError::Validation(format!("{} is outside {}", input.display(), input_dir.display()))
        })?;
        let output = output_dir.join(relative);

        let request = self.params.clone().into_request(input, output)?;
        let footprint = decoded_footprint(&self.optimizer.probe(input)?);
        let _permit = self.memory.acquire(footprint);
        log::debug!(
            "{}: reserved {} of decoded canvas memory",
            input.display(),
            format_file_size(footprint)
        );

        self.optimizer.optimize_with_cancel(&request, &self.cancel)
    }

    fn collect_inputs(&self, input_dir: &Path, recursive: bool) -> Vec<PathBuf> {
        let walker = if recursive {
            WalkDir::new(input_dir)
        } else {
            WalkDir::new(input_dir).max_depth(1)
        };

        let mut paths: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_format(entry.path()))
            .map(|entry| entry.into_path())
            .collect();

        paths.sort();
        paths
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }

    pub fn validate_paths(&self, input_dir: &Path, output_dir: &Path) -> Result<()> {
        if !input_dir.exists() {
            return Err(OptimizeError::Validation(format!(
                "Input directory does not exist: {}",
                input_dir.display()
            )));
        }

        if !input_dir.is_dir() {
            return Err(OptimizeError::Validation(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        if output_dir.exists() && !output_dir.is_dir() {
            return Err(OptimizeError::Validation(format!(
                "Output path exists but is not a directory: {}",
                output_dir.display()
            )));
        }

        // Outputs would be picked up as inputs on the next run
        if input_dir == output_dir {
            return Err(OptimizeError::Validation(
                "Input and output directories cannot be the same".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_footprint_counts_every_frame() {
        let metadata = ImageMetadata {
            width: 100,
            height: 50,
            frame_count: 10,
            size_bytes: 1,
        };
        assert_eq!(decoded_footprint(&metadata), 100 * 50 * 4 * 10);
    }

    #[test]
    fn test_memory_gate_waits_for_room() {
        let gate = Arc::new(MemoryGate::new(100));
        let first = gate.acquire(60);
        let admitted = Arc::new(AtomicBool::new(false));

        let waiter = {
            let gate = Arc::clone(&gate);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                let _second = gate.acquire(60);
                admitted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!admitted.load(Ordering::SeqCst));

        drop(first);
        waiter.join().unwrap();
        assert!(admitted.load(Ordering::SeqCst));
        assert_eq!(gate.in_use(), 0);
    }

    #[test]
    fn test_memory_gate_admits_oversized_request_alone() {
        let gate = MemoryGate::new(100);
        let permit = gate.acquire(500);
        assert_eq!(gate.in_use(), 500);
        drop(permit);
        assert_eq!(gate.in_use(), 0);
    }
}
