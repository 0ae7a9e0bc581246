//! Checkpointed frame-sequential compositing loop.
//!
//! Drives two synchronized frame sources through detection, mask building,
//! and compositing, persisting each result before advancing. Frames whose
//! output already exists are skipped (both sources still advance, keeping
//! them in lock-step), which makes the loop idempotent and cheaply
//! restartable after interruption. Frames are processed strictly in
//! increasing index order; the assembly step consumes them by filename.

use async_trait::async_trait;
use lipblend_models::{FrameIndex, LandmarkSet, OutputLayout};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::MatTraitConst;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::composite::blend_through_mask;
use crate::detect::LandmarkDetector;
use crate::error::{MediaError, MediaResult};
use crate::mask::MouthMaskBuilder;
use crate::stream::FrameSource;

/// Post-processes a persisted frame/mask pair, returning replacement PNG
/// bytes. Implemented by the inpainting relay client.
#[async_trait]
pub trait FrameRefiner: Send + Sync {
    async fn refine(&self, frame_png: &[u8], mask_png: &[u8]) -> MediaResult<Vec<u8>>;
}

/// Counters reported after a loop run.
#[derive(Debug, Clone, Default)]
pub struct FrameLoopSummary {
    /// Total indices advanced past (processed + skipped).
    pub frames_total: u64,
    /// Frames composited in this run.
    pub frames_processed: u64,
    /// Frames already complete on disk when this run started.
    pub frames_skipped: u64,
    /// Frames passed through because no face was detected.
    pub frames_without_faces: u64,
    /// Frames overwritten by the relay.
    pub frames_refined: u64,
}

/// The frame-sequential compositing loop.
pub struct CheckpointedFrameLoop<S, O, D, C>
where
    S: FrameSource,
    O: FrameSource,
    D: LandmarkDetector,
    C: CheckpointStore,
{
    synthesized: S,
    original: O,
    detector: D,
    store: C,
    layout: OutputLayout,
    mask_builder: MouthMaskBuilder,
    refiner: Option<Box<dyn FrameRefiner>>,
    /// Expected frame count, for progress logging only.
    expected_frames: Option<u64>,
    /// Progress heartbeat interval in frames.
    heartbeat_frames: u64,
}

impl<S, O, D, C> CheckpointedFrameLoop<S, O, D, C>
where
    S: FrameSource,
    O: FrameSource,
    D: LandmarkDetector,
    C: CheckpointStore,
{
    pub fn new(
        synthesized: S,
        original: O,
        detector: D,
        store: C,
        layout: OutputLayout,
    ) -> MediaResult<Self> {
        Ok(Self {
            synthesized,
            original,
            detector,
            store,
            layout,
            mask_builder: MouthMaskBuilder::new()?,
            refiner: None,
            expected_frames: None,
            heartbeat_frames: 25,
        })
    }

    /// Enable relay post-processing.
    pub fn with_refiner(mut self, refiner: Box<dyn FrameRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Set the expected frame count for progress logging.
    pub fn with_expected_frames(mut self, count: u64) -> Self {
        self.expected_frames = Some(count);
        self
    }

    /// Set the progress heartbeat interval in frames.
    pub fn with_heartbeat(mut self, frames: u64) -> Self {
        self.heartbeat_frames = frames.max(1);
        self
    }

    /// Run the loop until either source is exhausted.
    pub async fn run(mut self) -> MediaResult<FrameLoopSummary> {
        std::fs::create_dir_all(self.layout.images_dir())?;
        std::fs::create_dir_all(self.layout.masks_dir())?;

        let mut summary = FrameLoopSummary::default();
        let mut index = FrameIndex::ZERO;

        loop {
            if self.store.is_complete(index) {
                // Advance both sources past the completed frame so they stay
                // synchronized; exhaustion here is harmless, the read path
                // terminates the loop once an incomplete index is reached.
                let _ = self.synthesized.skip_frame()?;
                let _ = self.original.skip_frame()?;
                debug!(frame = %index, "output exists, skipping");
                summary.frames_skipped += 1;
                summary.frames_total += 1;
                index = index.next();
                continue;
            }

            let Some(synth) = self.synthesized.next_frame()? else {
                break;
            };
            let Some(orig) = self.original.next_frame()? else {
                break;
            };

            self.log_progress(index);
            self.process_frame(index, &synth, &orig, &mut summary).await?;

            summary.frames_processed += 1;
            summary.frames_total += 1;
            index = index.next();
        }

        info!(
            total = summary.frames_total,
            processed = summary.frames_processed,
            skipped = summary.frames_skipped,
            pass_through = summary.frames_without_faces,
            refined = summary.frames_refined,
            "Frame loop complete"
        );
        Ok(summary)
    }

    fn log_progress(&self, index: FrameIndex) {
        match self.expected_frames {
            Some(total) if index.value() % self.heartbeat_frames == 0 => {
                info!("Processing frame {} of {}", index, total);
            }
            _ => debug!(frame = %index, "processing"),
        }
    }

    async fn process_frame(
        &mut self,
        index: FrameIndex,
        synth: &Mat,
        orig: &Mat,
        summary: &mut FrameLoopSummary,
    ) -> MediaResult<()> {
        let landmark_sets = match self.detector.detect(synth) {
            Ok(sets) => sets,
            Err(e) => {
                // Contained to this frame; treated like a no-face frame.
                warn!(frame = %index, "detection failed: {e}");
                Vec::new()
            }
        };

        let size = synth.size()?;
        let mut composited = false;

        let (result, mask) = if !landmark_sets.is_empty() {
            let mut cumulative = MouthMaskBuilder::blank_mask(size)?;
            let mut accumulator = orig.clone();
            let mut soft_mask = cumulative.clone();
            for set in &landmark_sets {
                // Contained to this face; a mouth polygon that rasterizes to
                // nothing (landmarks off-frame) must not abort the run.
                match self.apply_face(set, synth, &mut cumulative, &mut soft_mask, &mut accumulator)
                {
                    Ok(()) => composited = true,
                    Err(e) => warn!(frame = %index, "face mask failed, skipping face: {e}"),
                }
            }
            if composited {
                (accumulator, soft_mask)
            } else {
                warn!(frame = %index, "no usable face, passing synthesized frame through");
                summary.frames_without_faces += 1;
                (synth.clone(), MouthMaskBuilder::blank_mask(size)?)
            }
        } else {
            warn!(frame = %index, "no face detected, passing synthesized frame through");
            summary.frames_without_faces += 1;
            (synth.clone(), MouthMaskBuilder::blank_mask(size)?)
        };

        // Persist the pre-relay composite and mask, then the final output.
        // The output file is the checkpoint marker, so it is written last.
        write_png(&self.layout.intermediate_image(index), &result)?;
        write_png(&self.layout.mask_image(index), &mask)?;
        let output_path = self.layout.output_frame(index);
        write_png(&output_path, &result)?;

        // Relay refinement operates on the persisted pair. A relay failure
        // keeps the pre-relay composite and the run continues.
        if composited {
            if let Some(refiner) = &self.refiner {
                let frame_png = tokio::fs::read(self.layout.intermediate_image(index)).await?;
                let mask_png = tokio::fs::read(self.layout.mask_image(index)).await?;
                match refiner.refine(&frame_png, &mask_png).await {
                    Ok(refined) => {
                        tokio::fs::write(&output_path, refined).await?;
                        summary.frames_refined += 1;
                    }
                    Err(e) => {
                        warn!(frame = %index, "relay failed, keeping composite: {e}");
                    }
                }
            }
        }

        self.store.mark_complete(index)?;
        Ok(())
    }

    /// Mask, soften, and blend one face. Leaves the cumulative mask
    /// untouched when the face's mouth polygon yields no mask.
    fn apply_face(
        &self,
        set: &LandmarkSet,
        synth: &Mat,
        cumulative: &mut Mat,
        soft_mask: &mut Mat,
        accumulator: &mut Mat,
    ) -> MediaResult<()> {
        self.mask_builder.add_face(set, cumulative)?;
        *soft_mask = self.mask_builder.soften(cumulative)?;
        blend_through_mask(accumulator, synth, soft_mask)
    }
}

/// Encode a Mat to PNG at `path`.
fn write_png(path: &Path, mat: &Mat) -> MediaResult<()> {
    let written = imgcodecs::imwrite(&path.to_string_lossy(), mat, &Vector::<i32>::new())?;
    if !written {
        return Err(MediaError::internal(format!(
            "failed to encode {}",
            path.display()
        )));
    }
    Ok(())
}
