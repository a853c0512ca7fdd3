// Wipe Engine - the single entry point for running a job
//
// Plans the chunks, locks the device, dispatches to the sequential or
// concurrent executor, always releases the lock, and folds what happened
// into one WipeReport.

use crate::algorithms::PatternGenerator;
use crate::config::EngineConfig;
use crate::drives::{DeviceLock, LockHandle};
use crate::error::{WipeError, WipeResult};
use crate::executor::concurrent::effective_lanes;
use crate::executor::{
    CancelToken, ConcurrentExecutor, ExecutionContext, LaneOutcome, LaneReport,
    SequentialExecutor, StopSignal,
};
use crate::io::{get_platform_io, PlatformIO, SECTOR_SIZE};
use crate::progress::{ProgressAggregator, ProgressMonitor, ProgressSink};
use crate::report::{ReportedError, WipeReport};
use crate::scheduler::{Chunk, ChunkScheduler};
use crate::verification::VerificationProbe;
use crate::{Concurrency, JobStatus, WipeJob};
use chrono::Utc;
use std::sync::Arc;

pub struct WipeEngine {
    config: EngineConfig,
    platform: Arc<dyn PlatformIO>,
    cancel: CancelToken,
    sinks: Vec<Arc<dyn ProgressSink>>,
}

/// Mutable bookkeeping for one `run`
struct JobRun {
    job: WipeJob,
    transitions: Vec<JobStatus>,
    errors: Vec<ReportedError>,
    chunks_planned: u64,
    chunks_completed: u64,
    lanes: usize,
    bytes_written: u64,
    throughput_bps: u64,
}

impl JobRun {
    fn new(mut job: WipeJob) -> Self {
        if job.status != JobStatus::Created {
            tracing::warn!(status = %job.status, "Job handed to run was not fresh; restarting from Created");
            job.status = JobStatus::Created;
        }
        let transitions = vec![job.status];
        Self {
            job,
            transitions,
            errors: Vec::new(),
            chunks_planned: 0,
            chunks_completed: 0,
            lanes: 0,
            bytes_written: 0,
            throughput_bps: 0,
        }
    }

    fn transition(&mut self, next: JobStatus) {
        debug_assert!(
            self.job.status.can_transition_to(next),
            "illegal job transition {} -> {}",
            self.job.status,
            next
        );
        tracing::info!(job_id = %self.job.job_id, from = %self.job.status, to = %next, "Job state");
        self.job.status = next;
        self.transitions.push(next);
    }

    fn fail(&mut self, next: JobStatus, err: &WipeError) {
        tracing::error!(job_id = %self.job.job_id, error = %err, "Job failed");
        self.errors.push(ReportedError::new(err, None));
        self.transition(next);
    }

    fn cancel(&mut self) {
        self.errors.push(ReportedError::new(&WipeError::Cancelled, None));
        self.transition(JobStatus::Cancelled);
    }
}

impl WipeEngine {
    /// Engine using the host platform's device I/O
    pub fn new(config: EngineConfig) -> WipeResult<Self> {
        Self::with_platform(config, get_platform_io())
    }

    /// Engine using a caller-supplied I/O implementation
    pub fn with_platform(config: EngineConfig, platform: Arc<dyn PlatformIO>) -> WipeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            platform,
            cancel: CancelToken::new(),
            sinks: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that cancels the running job at its next boundary.
    /// Cancellation is sticky: a cancelled engine cancels every later run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn add_progress_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }

    /// Run `job` to a terminal state. Never panics on job failure; every
    /// outcome, including a failed lock, is described by the returned report.
    pub fn run(&self, job: WipeJob) -> WipeReport {
        let started_at = Utc::now();
        let span = tracing::info_span!("job", job_id = %job.job_id, device = %job.device.path_display());
        let _enter = span.enter();

        tracing::info!(
            method = %job.method,
            capacity = job.device.capacity_bytes,
            chunk_size = job.chunk_size_bytes,
            concurrency = ?job.concurrency,
            "Starting wipe job"
        );

        let mut run = JobRun::new(job);
        self.drive(&mut run);

        let status = run.job.status.outcome();
        let mut report = WipeReport {
            job_id: run.job.job_id,
            device: run.job.device.clone(),
            method: run.job.method,
            passes: run.job.method.passes(),
            started_at,
            ended_at: Utc::now(),
            status,
            transitions: run.transitions,
            bytes_written: run.bytes_written,
            chunks_planned: run.chunks_planned,
            chunks_completed: run.chunks_completed,
            lanes: run.lanes,
            verified: self.config.verify && status == JobStatus::Completed,
            throughput_bps: run.throughput_bps,
            errors: run.errors,
            digest: String::new(),
        };
        if let Err(e) = report.seal() {
            tracing::warn!(error = %e, "Could not compute report digest");
        }

        tracing::info!(
            status = %report.status,
            bytes_written = report.bytes_written,
            errors = report.errors.len(),
            duration = %humantime::format_duration(report.duration().to_std().unwrap_or_default()),
            "Wipe job finished"
        );
        report
    }

    fn drive(&self, run: &mut JobRun) {
        if self.cancel.is_cancelled() {
            tracing::warn!("Job cancelled before start");
            run.cancel();
            return;
        }

        // Planning is pure and happens before the device is touched
        let chunks = match self.plan(&run.job) {
            Ok(chunks) => chunks,
            Err(err) => {
                run.fail(JobStatus::Failed, &err);
                return;
            }
        };
        run.chunks_planned = chunks.len() as u64;

        run.transition(JobStatus::Locking);
        let lock = DeviceLock::new(Arc::clone(&self.platform), self.config.lock_retry())
            .with_direct_io(self.config.use_direct_io)
            .with_write_timeout(self.config.write_timeout());

        let mut handle = match lock.acquire(&run.job.device) {
            Ok(handle) => handle,
            Err(err) => {
                run.fail(JobStatus::LockFailed, &err);
                return;
            }
        };

        if self.cancel.is_cancelled() {
            tracing::warn!("Job cancelled while locking");
            handle.release();
            run.cancel();
            return;
        }

        run.transition(JobStatus::Running);
        let lane_reports = self.execute(run, &handle, &chunks);
        handle.release();

        let stats = handle.device().metrics().stats();
        stats.log();
        run.bytes_written = stats.bytes_written;
        run.throughput_bps = stats.throughput_bps;

        self.conclude(run, lane_reports);
    }

    fn plan(&self, job: &WipeJob) -> WipeResult<Vec<Chunk>> {
        if job.device.is_system {
            return Err(WipeError::InvalidConfig(format!(
                "refusing to wipe system device {}",
                job.device.path_display()
            )));
        }
        if self.config.use_direct_io {
            let sector = SECTOR_SIZE as u64;
            if job.chunk_size_bytes % sector != 0 || job.device.capacity_bytes % sector != 0 {
                return Err(WipeError::InvalidConfig(format!(
                    "chunk size {} and capacity {} must be multiples of {} with direct I/O",
                    job.chunk_size_bytes, job.device.capacity_bytes, SECTOR_SIZE
                )));
            }
        }
        let chunks = ChunkScheduler::plan(job.device.capacity_bytes, job.chunk_size_bytes)?;
        tracing::info!(chunks = chunks.len(), "Planned chunks");
        Ok(chunks)
    }

    fn execute(&self, run: &mut JobRun, lock: &LockHandle, chunks: &[Chunk]) -> Vec<LaneReport> {
        let passes = run.job.method.passes();
        let total_ops = chunks.len() as u64 * self.config.operations_per_chunk(passes.len());
        let progress = Arc::new(ProgressAggregator::new(total_ops));
        let monitor = ProgressMonitor::start(
            Arc::clone(&progress),
            self.sinks.clone(),
            self.config.progress_interval(),
        );

        let ctx = ExecutionContext {
            passes: &passes,
            generator: PatternGenerator::new(),
            probe: self
                .config
                .verify
                .then(|| {
                    VerificationProbe::new(self.config.verify_sample_bytes)
                        .with_direct_io(self.config.use_direct_io)
                }),
            write_block_size: self.config.write_block_size,
            direct_io: self.config.use_direct_io,
            progress: &progress,
        };

        let reports = match run.job.concurrency {
            Concurrency::Sequential => {
                run.lanes = 1;
                let stop = StopSignal::new(&self.cancel);
                vec![SequentialExecutor::new(&ctx).run(lock.device(), chunks, 0..chunks.len(), &stop)]
            }
            Concurrency::Parallel(requested) => {
                let lanes = effective_lanes(requested, self.config.max_lanes, chunks.len());
                if lanes != requested {
                    tracing::info!(requested, lanes, "Lane count capped");
                }
                run.lanes = lanes;
                ConcurrentExecutor::new(&ctx, lanes).run(lock.device(), chunks, &self.cancel)
            }
        };

        monitor.finish();
        reports
    }

    /// Fold lane outcomes into the job's terminal state
    fn conclude(&self, run: &mut JobRun, reports: Vec<LaneReport>) {
        run.chunks_completed = reports.iter().map(|r| r.chunks_completed as u64).sum();

        let mut cancelled = false;
        let mut aborted = false;
        for report in &reports {
            match &report.outcome {
                LaneOutcome::Completed => {}
                LaneOutcome::Failed(err) => {
                    run.errors.push(ReportedError::new(err, Some(report.lane)));
                }
                LaneOutcome::Cancelled => cancelled = true,
                LaneOutcome::Aborted => aborted = true,
            }
        }

        if !run.errors.is_empty() {
            run.transition(JobStatus::Failed);
        } else if cancelled {
            run.cancel();
        } else if aborted {
            // Lanes only abort after a sibling fails, which records an error
            run.transition(JobStatus::Failed);
        } else {
            run.transition(JobStatus::Completed);
        }
    }
}
