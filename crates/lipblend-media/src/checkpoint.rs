//! Checkpoint tracking for resumable frame processing.
//!
//! The loop asks the store whether an index is complete before doing any
//! work for it. The directory-backed store uses the presence of the final
//! per-frame output file as the durable marker; a manifest- or
//! database-backed store can be swapped in without touching loop logic.

use lipblend_models::{FrameIndex, OutputLayout};

use crate::error::MediaResult;

/// Durable completion markers for per-frame work.
pub trait CheckpointStore: Send {
    /// Whether the output for `index` has already been materialized.
    fn is_complete(&self, index: FrameIndex) -> bool;

    /// Record that `index` is complete. Called after the frame's output has
    /// been persisted (and optionally relayed).
    fn mark_complete(&self, index: FrameIndex) -> MediaResult<()>;
}

/// File-existence checkpoint store over the output layout.
///
/// Writing `output_NNNNN.png` is itself the durable marker, so
/// `mark_complete` has nothing extra to do.
#[derive(Debug, Clone)]
pub struct DirCheckpointStore {
    layout: OutputLayout,
}

impl DirCheckpointStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }
}

impl CheckpointStore for DirCheckpointStore {
    fn is_complete(&self, index: FrameIndex) -> bool {
        self.layout.output_frame(index).is_file()
    }

    fn mark_complete(&self, _index: FrameIndex) -> MediaResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_incomplete_until_output_exists() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path());
        let store = DirCheckpointStore::new(layout.clone());
        let idx = FrameIndex::new(3);

        assert!(!store.is_complete(idx));

        std::fs::write(layout.output_frame(idx), b"png").unwrap();
        assert!(store.is_complete(idx));
    }

    #[test]
    fn test_intermediate_files_are_not_markers() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path());
        std::fs::create_dir_all(layout.images_dir()).unwrap();
        let store = DirCheckpointStore::new(layout.clone());
        let idx = FrameIndex::ZERO;

        // A pre-relay intermediate alone does not mark the frame complete.
        std::fs::write(layout.intermediate_image(idx), b"png").unwrap();
        assert!(!store.is_complete(idx));
    }
}
