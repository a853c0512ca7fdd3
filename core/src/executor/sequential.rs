// Single-lane pass execution
//
// Per chunk: Pass 1 -> ... -> Pass n -> Verify -> Done. Each pass is fully
// written and synced before the next one starts. The first error ends the
// lane; a pass is never resumed partway through.

use super::{ExecutionContext, LaneOutcome, LaneReport, StopReason, StopSignal};
use crate::algorithms::PassSpec;
use crate::error::{WipeError, WipeResult};
use crate::io::{self, AlignedBuffer, DeviceHandle};
use crate::scheduler::Chunk;
use std::ops::Range;

pub struct SequentialExecutor<'a> {
    ctx: &'a ExecutionContext<'a>,
}

enum ChunkEnd {
    Stopped(StopReason),
    Failed(WipeError),
}

impl From<WipeError> for ChunkEnd {
    fn from(err: WipeError) -> Self {
        ChunkEnd::Failed(err)
    }
}

impl<'a> SequentialExecutor<'a> {
    pub fn new(ctx: &'a ExecutionContext<'a>) -> Self {
        Self { ctx }
    }

    /// Run all passes over `chunks`, which are `chunk_range` of the job plan
    pub fn run(
        &self,
        device: &DeviceHandle,
        chunks: &[Chunk],
        chunk_range: Range<usize>,
        stop: &StopSignal<'_>,
    ) -> LaneReport {
        let lane = device.lane();
        let mut report = LaneReport {
            lane,
            chunk_range,
            chunks_completed: 0,
            outcome: LaneOutcome::Completed,
        };

        let Some(first) = chunks.first() else {
            return report;
        };

        let mut buffer = match self.allocate_buffer(chunks) {
            Ok(buffer) => buffer,
            Err(e) => {
                report.outcome = LaneOutcome::Failed(WipeError::write(
                    first.offset,
                    format!("buffer allocation failed: {}", e),
                ));
                return report;
            }
        };

        tracing::debug!(
            lane,
            first_chunk = first.index,
            chunks = chunks.len(),
            "Lane started"
        );

        for chunk in chunks {
            match self.run_chunk(device, chunk, &mut buffer, stop) {
                Ok(()) => report.chunks_completed += 1,
                Err(ChunkEnd::Stopped(reason)) => {
                    tracing::info!(lane, chunk = chunk.index, ?reason, "Lane stopped");
                    report.outcome = reason.into();
                    return report;
                }
                Err(ChunkEnd::Failed(err)) => {
                    tracing::error!(lane, chunk = chunk.index, error = %err, "Lane failed");
                    report.outcome = LaneOutcome::Failed(err);
                    return report;
                }
            }
        }

        tracing::debug!(lane, chunks = report.chunks_completed, "Lane completed");
        report
    }

    fn allocate_buffer(&self, chunks: &[Chunk]) -> anyhow::Result<AlignedBuffer> {
        let largest = chunks.iter().map(|c| c.length).max().unwrap_or(0);
        let len = (self.ctx.write_block_size as u64).min(largest) as usize;
        io::write_buffer(len, self.ctx.direct_io)
    }

    fn run_chunk(
        &self,
        device: &DeviceHandle,
        chunk: &Chunk,
        buffer: &mut AlignedBuffer,
        stop: &StopSignal<'_>,
    ) -> Result<(), ChunkEnd> {
        for (pass_number, &spec) in self.ctx.passes.iter().enumerate() {
            if let Some(reason) = stop.check() {
                return Err(ChunkEnd::Stopped(reason));
            }

            tracing::trace!(
                lane = device.lane(),
                chunk = chunk.index,
                pass = pass_number + 1,
                pattern = %spec,
                "Pass started"
            );
            self.write_pass(device, chunk, spec, buffer)?;
            self.ctx.progress.report(1);
        }

        if let (Some(probe), Some(&last)) = (self.ctx.probe, self.ctx.passes.last()) {
            probe.check(device, chunk, last)?;
            self.ctx.progress.report(1);
        }

        tracing::debug!(lane = device.lane(), chunk = chunk.index, "Chunk done");
        Ok(())
    }

    /// One full pass over `chunk`, block by block, then a sync
    fn write_pass(
        &self,
        device: &DeviceHandle,
        chunk: &Chunk,
        spec: PassSpec,
        buffer: &mut AlignedBuffer,
    ) -> WipeResult<()> {
        let mut pattern = self.ctx.generator.stream(spec).map_err(|e| {
            WipeError::write(chunk.offset, format!("pattern generation failed: {}", e))
        })?;
        if let Some(key_id) = pattern.key_id() {
            tracing::trace!(chunk = chunk.index, %key_id, "Crypto pass keyed");
        }

        let block_size = buffer.len() as u64;
        let end = chunk.end();
        let mut offset = chunk.offset;

        while offset < end {
            let len = (end - offset).min(block_size) as usize;
            let block = &mut buffer.as_mut_slice()[..len];

            pattern.fill_next(block).map_err(|e| {
                WipeError::write(offset, format!("pattern generation failed: {}", e))
            })?;
            device.write_at(block, offset)?;

            offset += len as u64;
        }

        device.sync()
    }
}
