//! Error taxonomy.
//!
//! Only session-start failures surface to the caller. Every per-frame
//! failure mode is absorbed as a skipped draw and recorded as a
//! [`SkipReason`], never an error.

use thiserror::Error;

use crate::assets::AssetError;
use crate::landmarks::LandmarkRole;

/// Why a try-on session failed to start.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("overlay asset failed to load: {0}")]
    AssetLoad(#[from] AssetError),
    #[error("video source has produced no frame yet")]
    VideoNotReady,
    #[error("canvas target has zero area ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },
}

/// Why one frame's draw was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A required role was absent or below the confidence floor.
    MissingLandmark(LandmarkRole),
    /// The tracker produced no result within the reuse window.
    TrackerUnavailable,
    /// Hat category is active but no placement has been supplied.
    HatPlacementMissing,
    /// No calculator registered for the active category.
    NoCalculator,
}
