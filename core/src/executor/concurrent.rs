// Lane-parallel pass execution
//
// The plan is split into contiguous index ranges, one per lane. Lanes never
// share offsets, so writes need no locking. Each lane gets its own descriptor
// derived from the job's locked handle. The first failing lane raises the
// abort flag; the others stop at their next chunk or pass boundary.

use super::{ExecutionContext, LaneOutcome, LaneReport, SequentialExecutor, StopSignal};
use crate::error::WipeError;
use crate::executor::CancelToken;
use crate::io::DeviceHandle;
use crate::scheduler::{partition_lanes, Chunk};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ScopedJoinHandle;

enum Lane<'scope> {
    Running(usize, ScopedJoinHandle<'scope, LaneReport>),
    Finished(LaneReport),
}

pub struct ConcurrentExecutor<'a> {
    ctx: &'a ExecutionContext<'a>,
    lanes: usize,
}

impl<'a> ConcurrentExecutor<'a> {
    /// `lanes` should already be capped with [`effective_lanes`]
    pub fn new(ctx: &'a ExecutionContext<'a>, lanes: usize) -> Self {
        Self {
            ctx,
            lanes: lanes.max(1),
        }
    }

    /// Run every lane to completion or to its first stop. One report per lane,
    /// ordered by lane number.
    pub fn run(&self, device: &DeviceHandle, chunks: &[Chunk], cancel: &CancelToken) -> Vec<LaneReport> {
        let ranges = partition_lanes(chunks.len(), self.lanes);

        let mut handles = Vec::with_capacity(ranges.len());
        for (lane, range) in ranges.iter().enumerate() {
            match device.derive(lane) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::error!(lane, error = %err, "Could not derive lane descriptor");
                    return Self::not_started(&ranges, lane, err);
                }
            }
            tracing::debug!(lane, start = range.start, end = range.end, "Lane assigned");
        }

        tracing::info!(lanes = ranges.len(), chunks = chunks.len(), "Starting concurrent execution");

        let abort = AtomicBool::new(false);
        let executor = SequentialExecutor::new(self.ctx);

        std::thread::scope(|scope| {
            let mut running = Vec::with_capacity(ranges.len());

            for (range, handle) in ranges.iter().cloned().zip(handles) {
                let lane = handle.lane();
                let abort = &abort;
                let executor = &executor;
                let lane_chunks = &chunks[range.clone()];
                let lane_range = range.clone();

                let spawned = std::thread::Builder::new()
                    .name(format!("nullnova-lane-{}", lane))
                    .spawn_scoped(scope, move || {
                        let stop = StopSignal::with_abort(cancel, abort);
                        let report = executor.run(&handle, lane_chunks, lane_range, &stop);
                        if matches!(report.outcome, LaneOutcome::Failed(_)) {
                            abort.store(true, Ordering::SeqCst);
                        }
                        report
                    });

                match spawned {
                    Ok(join) => running.push(Lane::Running(lane, join)),
                    Err(e) => {
                        tracing::error!(lane, error = %e, "Could not start lane thread");
                        abort.store(true, Ordering::SeqCst);
                        let offset = lane_chunks.first().map(|c| c.offset).unwrap_or(0);
                        running.push(Lane::Finished(LaneReport {
                            lane,
                            chunk_range: range,
                            chunks_completed: 0,
                            outcome: LaneOutcome::Failed(WipeError::write(
                                offset,
                                format!("could not start lane thread: {}", e),
                            )),
                        }));
                    }
                }
            }

            running
                .into_iter()
                .map(|lane| match lane {
                    Lane::Finished(report) => report,
                    Lane::Running(lane, join) => join.join().unwrap_or_else(|_| {
                        abort.store(true, Ordering::SeqCst);
                        let range = ranges[lane].clone();
                        let offset = chunks.get(range.start).map(|c| c.offset).unwrap_or(0);
                        LaneReport {
                            lane,
                            chunk_range: range,
                            chunks_completed: 0,
                            outcome: LaneOutcome::Failed(WipeError::write(offset, "lane thread panicked")),
                        }
                    }),
                })
                .collect()
        })
    }

    // Descriptor setup failed: nothing has been written by any lane
    fn not_started(ranges: &[std::ops::Range<usize>], failed_lane: usize, err: WipeError) -> Vec<LaneReport> {
        ranges
            .iter()
            .enumerate()
            .map(|(lane, range)| LaneReport {
                lane,
                chunk_range: range.clone(),
                chunks_completed: 0,
                outcome: if lane == failed_lane {
                    LaneOutcome::Failed(err.clone())
                } else {
                    LaneOutcome::Aborted
                },
            })
            .collect()
    }
}

/// Lane count actually used: the request, capped by CPU count, the
/// configured maximum and the number of chunks. Never zero.
pub fn effective_lanes(requested: usize, max_lanes: usize, chunk_count: usize) -> usize {
    requested
        .min(num_cpus::get())
        .min(max_lanes)
        .min(chunk_count)
        .max(1)
}
