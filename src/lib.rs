//! Try-On Engine - landmark-anchored accessory overlay compositing
//!
//! Maps tracker landmarks from a mirrored camera preview into canvas
//! coordinates, computes a per-category anchor transform (position,
//! rotation, scale) each frame, and composites sprite or 3D-model
//! overlays onto an abstract draw surface.

pub mod anchor;
pub mod assets;
pub mod compositor;
pub mod config;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod landmarks;

pub use anchor::{AnchorCalculator, AnchorTransform, CalculatorRegistry, Category, HatPlacement};
pub use assets::{AssetKind, OverlayAsset};
pub use compositor::{DrawSurface, RecordingSurface, TransformGuard};
pub use config::EngineConfig;
pub use driver::{
    FixedRateScheduler, FrameScheduler, ManualScheduler, Session, SessionHandle, SessionState,
    VideoSource,
};
pub use error::{SessionError, SkipReason};
pub use geometry::{mirror, CanvasSize};
pub use landmarks::{Landmark, LandmarkRole, LandmarkSet, LandmarkSource};
