//! Frame driver: the cooperative per-frame try-on loop.
//!
//! A [`Session`] owns the canvas surface and tracker binding for one
//! start-to-stop try-on run. Each tick pulls the latest landmark set,
//! runs the active category's calculator, and composites the overlay;
//! landmarks from frame N are always composited before frame N+1's are
//! requested, because ticks never overlap. Per-frame failures are absorbed
//! as skipped draws and never escape the tick.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::anchor::{hat_anchor, AnchorTransform, CalculatorRegistry, Category, HatPlacement};
use crate::assets::OverlayAsset;
use crate::compositor::{draw_overlay, DrawSurface};
use crate::config::EngineConfig;
use crate::error::{SessionError, SkipReason};
use crate::geometry::CanvasSize;
use crate::landmarks::LandmarkSource;

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// Readiness boundary for the external capture pipeline.
///
/// The engine only needs the source's pixel size; the canvas matches it.
pub trait VideoSource {
    /// Size of the latest frame, or `None` before the first frame arrives.
    fn frame_size(&self) -> Option<(u32, u32)>;
}

/// Video source with a known, fixed frame size.
pub struct FixedSizeVideo {
    width: u32,
    height: u32,
}

impl FixedSizeVideo {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl VideoSource for FixedSizeVideo {
    fn frame_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

/// Abstract next-frame scheduling primitive.
///
/// Lets the same loop be driven by a display callback, a fixed-rate timer,
/// or a harness stepping frames manually.
pub trait FrameScheduler {
    /// Block until the next display frame is due. Returns `false` once
    /// cancelled or exhausted; no further ticks run after that.
    fn wait_next_frame(&mut self) -> bool;
    /// Cancel any pending frame request.
    fn cancel(&mut self);
}

/// Scheduler stepped explicitly: each granted frame is one tick.
pub struct ManualScheduler {
    remaining: u32,
    cancelled: bool,
}

impl ManualScheduler {
    pub fn with_frames(frames: u32) -> Self {
        Self {
            remaining: frames,
            cancelled: false,
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn wait_next_frame(&mut self) -> bool {
        if self.cancelled || self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// Fixed-rate wall-clock scheduler.
pub struct FixedRateScheduler {
    frame_duration: Duration,
    next_frame_at: Instant,
    cancelled: bool,
}

impl FixedRateScheduler {
    pub fn new(target_fps: u32) -> Self {
        let fps = target_fps.max(1) as u64;
        Self {
            frame_duration: Duration::from_nanos(1_000_000_000 / fps),
            next_frame_at: Instant::now(),
            cancelled: false,
        }
    }
}

impl FrameScheduler for FixedRateScheduler {
    fn wait_next_frame(&mut self) -> bool {
        if self.cancelled {
            return false;
        }

        if let Some(wait) = self.next_frame_at.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
        self.next_frame_at += self.frame_duration;

        // Reset the deadline if we fell too far behind.
        let max_behind = self.frame_duration * 2;
        let now = Instant::now();
        if now > self.next_frame_at + max_behind {
            self.next_frame_at = now + self.frame_duration;
        }

        true
    }

    fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// Cloneable cross-thread view of a running session: a cancellation flag
/// plus the most recently computed anchor transform for diagnostics.
#[derive(Clone)]
pub struct SessionHandle {
    running: Arc<AtomicBool>,
    last_transform: Arc<Mutex<Option<AnchorTransform>>>,
}

impl SessionHandle {
    /// Request the session to stop. Safe from any thread, at any point in
    /// the loop; no draw happens after the session observes it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Most recent anchor transform, if any frame has drawn yet.
    pub fn last_transform(&self) -> Option<AnchorTransform> {
        *self.last_transform.lock()
    }
}

/// One active try-on session owning its canvas surface and tracker.
pub struct Session<S: DrawSurface, L: LandmarkSource> {
    canvas: CanvasSize,
    surface: S,
    tracker: L,
    category: Category,
    asset: OverlayAsset,
    config: EngineConfig,
    registry: CalculatorRegistry,
    hat_placement: Option<HatPlacement>,
    smoothed: Option<AnchorTransform>,
    state: SessionState,
    running: Arc<AtomicBool>,
    last_transform: Arc<Mutex<Option<AnchorTransform>>>,
    on_transform: Option<Box<dyn FnMut(&AnchorTransform)>>,
    frames_drawn: u64,
    frames_skipped: u64,
}

impl<S: DrawSurface, L: LandmarkSource> Session<S, L> {
    /// Begin a try-on session.
    ///
    /// Fails if the video source has produced no frame yet or reports a
    /// zero-area frame; the canvas takes the video's pixel dimensions.
    pub fn start(
        video: &dyn VideoSource,
        surface: S,
        tracker: L,
        category: Category,
        asset: OverlayAsset,
        config: EngineConfig,
    ) -> Result<Self, SessionError> {
        let (width, height) = video.frame_size().ok_or(SessionError::VideoNotReady)?;
        if width == 0 || height == 0 {
            return Err(SessionError::EmptyCanvas { width, height });
        }

        log::info!(
            "try-on session started: {}x{} canvas, category {:?}",
            width,
            height,
            category
        );

        Ok(Self {
            canvas: CanvasSize::new(width as f32, height as f32),
            surface,
            tracker,
            category,
            asset,
            config,
            registry: CalculatorRegistry::with_builtins(),
            hat_placement: None,
            smoothed: None,
            state: SessionState::Running,
            running: Arc::new(AtomicBool::new(true)),
            last_transform: Arc::new(Mutex::new(None)),
            on_transform: None,
            frames_drawn: 0,
            frames_skipped: 0,
        })
    }

    /// Begin a session with a sprite overlay loaded from disk; a decode
    /// failure surfaces here and the session never enters `running`.
    pub fn start_with_sprite(
        video: &dyn VideoSource,
        surface: S,
        tracker: L,
        category: Category,
        sprite_path: impl AsRef<std::path::Path>,
        config: EngineConfig,
    ) -> Result<Self, SessionError> {
        let asset = OverlayAsset::sprite_from_path(sprite_path)?;
        Self::start(video, surface, tracker, category, asset, config)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running && self.running.load(Ordering::Acquire)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Cross-thread handle for cancellation and diagnostics.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            running: self.running.clone(),
            last_transform: self.last_transform.clone(),
        }
    }

    /// Switch the active accessory category without restarting; only the
    /// calculator and landmark roles consulted on subsequent ticks change.
    pub fn set_category(&mut self, category: Category) {
        if category != self.category {
            log::info!("switching category {:?} -> {:?}", self.category, category);
            self.category = category;
            self.smoothed = None;
        }
    }

    /// Supply or clear the externally derived hat placement.
    pub fn set_hat_placement(&mut self, placement: Option<HatPlacement>) {
        self.hat_placement = placement;
    }

    /// Replace the calculator table, e.g. to register a custom category
    /// calculator.
    pub fn set_registry(&mut self, registry: CalculatorRegistry) {
        self.registry = registry;
    }

    /// Observe each computed anchor transform, for diagnostics.
    pub fn on_transform(&mut self, callback: impl FnMut(&AnchorTransform) + 'static) {
        self.on_transform = Some(Box::new(callback));
    }

    /// One cooperative frame: poll landmarks, compute the anchor,
    /// composite. Never panics out of per-frame geometry; every failure
    /// mode becomes a skipped draw.
    pub fn tick(&mut self) {
        if self.state == SessionState::Running && !self.running.load(Ordering::Acquire) {
            // A handle cancelled us between frames.
            self.stop();
        }
        if self.state != SessionState::Running {
            return;
        }

        match self.compute_transform() {
            Ok(transform) => {
                // stop() may have landed while landmarks were in flight.
                if !self.running.load(Ordering::Acquire) {
                    self.stop();
                    return;
                }
                *self.last_transform.lock() = Some(transform);
                if let Some(callback) = self.on_transform.as_mut() {
                    callback(&transform);
                }
                draw_overlay(&mut self.surface, self.category, &transform, &self.asset);
                self.frames_drawn += 1;
            }
            Err(reason) => {
                self.frames_skipped += 1;
                log::debug!("skipping frame for {:?}: {:?}", self.category, reason);
            }
        }
    }

    /// Run the loop until the scheduler is exhausted or a handle stops
    /// the session.
    pub fn run(&mut self, scheduler: &mut dyn FrameScheduler) {
        while self.is_running() {
            if !scheduler.wait_next_frame() {
                break;
            }
            self.tick();
        }
        scheduler.cancel();
        self.stop();
    }

    /// End the session and release the canvas/video binding. Idempotent.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        self.running.store(false, Ordering::Release);
        self.state = SessionState::Idle;
        self.smoothed = None;
        log::info!(
            "try-on session stopped ({} frames drawn, {} skipped)",
            self.frames_drawn,
            self.frames_skipped
        );
    }

    /// Recover the surface after the session ends.
    pub fn into_surface(self) -> S {
        self.surface
    }

    fn compute_transform(&mut self) -> Result<AnchorTransform, SkipReason> {
        let floor = self.config.confidence_floor;

        let mut transform = if self.category == Category::Hat {
            let placement = self
                .hat_placement
                .ok_or(SkipReason::HatPlacementMissing)?;
            hat_anchor(self.canvas, &placement)
        } else {
            let set = self.tracker.poll().ok_or(SkipReason::TrackerUnavailable)?;
            let calculator = self
                .registry
                .get(self.category)
                .ok_or(SkipReason::NoCalculator)?;
            match calculator.compute(self.canvas, &set, floor) {
                Some(transform) => transform,
                None => {
                    // Name the offending role for the log.
                    let missing = self
                        .category
                        .roles()
                        .iter()
                        .find(|&&role| set.confident(role, floor).is_none())
                        .copied();
                    return Err(match missing {
                        Some(role) => SkipReason::MissingLandmark(role),
                        None => SkipReason::NoCalculator,
                    });
                }
            }
        };

        if self.asset.mirror_compensate() {
            transform.mirror_compensate = true;
        }

        if self.asset.is_model() && self.config.smoothing_alpha > 0.0 {
            transform = self.smooth(transform);
        }

        Ok(transform)
    }

    /// Exponential blend toward the target anchor; model overlays jitter
    /// visibly without it. State lives in the session handle only.
    fn smooth(&mut self, target: AnchorTransform) -> AnchorTransform {
        let alpha = self.config.smoothing_alpha.clamp(0.0, 1.0);
        let smoothed = match self.smoothed {
            None => target,
            Some(prev) => AnchorTransform {
                mirrored_x: prev.mirrored_x + (target.mirrored_x - prev.mirrored_x) * alpha,
                mirrored_y: prev.mirrored_y + (target.mirrored_y - prev.mirrored_y) * alpha,
                rotation_radians: prev.rotation_radians
                    + (target.rotation_radians - prev.rotation_radians) * alpha,
                size: prev.size + (target.size - prev.size) * alpha,
                mirror_compensate: target.mirror_compensate,
            },
        };
        self.smoothed = Some(smoothed);
        smoothed
    }
}

/// Scripted landmark source for harnesses: each poll pops the next frame.
pub struct ScriptedTracker {
    frames: VecDeque<Option<crate::landmarks::LandmarkSet>>,
    polls: u64,
}

impl ScriptedTracker {
    pub fn new(frames: impl IntoIterator<Item = Option<crate::landmarks::LandmarkSet>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            polls: 0,
        }
    }

    /// Source that repeats nothing: every poll misses.
    pub fn empty() -> Self {
        Self::new([])
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl LandmarkSource for ScriptedTracker {
    fn poll(&mut self) -> Option<crate::landmarks::LandmarkSet> {
        self.polls += 1;
        self.frames.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{DrawCall, RecordingSurface};
    use crate::landmarks::{Landmark, LandmarkRole, LandmarkSet};
    use approx::assert_relative_eq;

    struct NotReadyVideo;

    impl VideoSource for NotReadyVideo {
        fn frame_size(&self) -> Option<(u32, u32)> {
            None
        }
    }

    fn eye_set() -> LandmarkSet {
        let mut set = LandmarkSet::new();
        set.insert(LandmarkRole::LeftEye, Landmark::new(30.0, 40.0, 0.9));
        set.insert(LandmarkRole::RightEye, Landmark::new(70.0, 50.0, 0.9));
        set
    }

    fn shoulder_set(left: (f32, f32), right: (f32, f32)) -> LandmarkSet {
        let mut set = LandmarkSet::new();
        set.insert(
            LandmarkRole::LeftShoulder,
            Landmark::new(left.0, left.1, 0.9),
        );
        set.insert(
            LandmarkRole::RightShoulder,
            Landmark::new(right.0, right.1, 0.9),
        );
        set
    }

    fn sprite() -> OverlayAsset {
        OverlayAsset::sprite_from_rgba(vec![0; 4 * 4 * 4], 4, 4).unwrap()
    }

    fn start_session(
        category: Category,
        tracker: ScriptedTracker,
        asset: OverlayAsset,
    ) -> Session<RecordingSurface, ScriptedTracker> {
        Session::start(
            &FixedSizeVideo::new(100, 50),
            RecordingSurface::new(),
            tracker,
            category,
            asset,
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_start_requires_ready_video() {
        let result = Session::start(
            &NotReadyVideo,
            RecordingSurface::new(),
            ScriptedTracker::empty(),
            Category::Glasses,
            sprite(),
            EngineConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::VideoNotReady)));

        let result = Session::start(
            &FixedSizeVideo::new(0, 50),
            RecordingSurface::new(),
            ScriptedTracker::empty(),
            Category::Glasses,
            sprite(),
            EngineConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::EmptyCanvas { .. })));
    }

    #[test]
    fn test_start_surfaces_asset_load_failure() {
        let result = Session::start_with_sprite(
            &FixedSizeVideo::new(100, 50),
            RecordingSurface::new(),
            ScriptedTracker::empty(),
            Category::Glasses,
            "/nonexistent/overlay.png",
            EngineConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::AssetLoad(_))));
    }

    #[test]
    fn test_tick_draws_and_reports_transform() {
        let tracker = ScriptedTracker::new([Some(eye_set())]);
        let mut session = start_session(Category::Glasses, tracker, sprite());
        let handle = session.handle();

        let observed_slot = Arc::new(Mutex::new(None));
        {
            let slot = observed_slot.clone();
            session.on_transform(move |t| *slot.lock() = Some(*t));
        }

        session.tick();
        let observed = *observed_slot.lock();

        assert_eq!(session.frames_drawn(), 1);
        assert_eq!(session.surface().draw_count(), 1);
        assert!(session.surface().is_balanced());

        // Eyes (30,40) and (70,50) mirror to (70,40) and (30,50).
        let transform = handle.last_transform().expect("transform recorded");
        assert_relative_eq!(
            transform.rotation_radians,
            10.0f32.atan2(-40.0),
            epsilon = 1e-6
        );
        assert_eq!(observed, Some(transform));
    }

    #[test]
    fn test_tick_skips_on_missing_landmark() {
        let mut set = LandmarkSet::new();
        set.insert(LandmarkRole::LeftEye, Landmark::new(30.0, 40.0, 0.9));
        set.insert(LandmarkRole::RightEye, Landmark::new(70.0, 50.0, 0.3));

        let tracker = ScriptedTracker::new([Some(set)]);
        let mut session = start_session(Category::Glasses, tracker, sprite());

        session.tick();

        assert_eq!(session.frames_drawn(), 0);
        assert_eq!(session.frames_skipped(), 1);
        assert_eq!(session.surface().draw_count(), 0);
        assert!(session.handle().last_transform().is_none());
    }

    #[test]
    fn test_tracker_unavailable_skips_tick() {
        let mut session = start_session(Category::Glasses, ScriptedTracker::empty(), sprite());
        session.tick();
        assert_eq!(session.frames_skipped(), 1);
        assert_eq!(session.surface().draw_count(), 0);
    }

    #[test]
    fn test_stop_is_idempotent_and_blocks_draws() {
        let tracker = ScriptedTracker::new([Some(eye_set())]);
        let mut session = start_session(Category::Glasses, tracker, sprite());

        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);

        session.tick();
        assert_eq!(session.frames_drawn(), 0);
        assert_eq!(session.surface().draw_count(), 0);
    }

    #[test]
    fn test_handle_stop_prevents_further_draws() {
        let tracker = ScriptedTracker::new([Some(eye_set()), Some(eye_set())]);
        let mut session = start_session(Category::Glasses, tracker, sprite());
        let handle = session.handle();

        session.tick();
        assert_eq!(session.frames_drawn(), 1);

        handle.stop();
        session.tick();

        assert_eq!(session.frames_drawn(), 1);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_set_category_switches_calculator_without_restart() {
        let frames = [Some(eye_set()), Some(eye_set())];
        let tracker = ScriptedTracker::new(frames);
        let mut session = start_session(Category::Body, tracker, sprite());

        // Eye landmarks cannot satisfy the body calculator.
        session.tick();
        assert_eq!(session.frames_skipped(), 1);

        session.set_category(Category::Glasses);
        session.tick();
        assert_eq!(session.frames_drawn(), 1);
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_hat_requires_placement() {
        let mut session = start_session(Category::Hat, ScriptedTracker::empty(), sprite());

        session.tick();
        assert_eq!(session.frames_skipped(), 1);

        session.set_hat_placement(Some(HatPlacement {
            midpoint_x: 10.0,
            y_offset: 20.0,
            angle: 0.0,
            width: 40.0,
            mirror_compensate: true,
        }));
        session.tick();

        assert_eq!(session.frames_drawn(), 1);
        assert_eq!(session.surface().flip_count(), 1);
        assert!(session
            .surface()
            .calls()
            .contains(&DrawCall::Translate(90.0, 20.0)));
    }

    #[test]
    fn test_asset_flag_forces_mirror_compensation() {
        let tracker = ScriptedTracker::new([Some(eye_set())]);
        let asset = sprite().with_mirror_compensate(true);
        let mut session = start_session(Category::Glasses, tracker, asset);

        session.tick();
        assert_eq!(session.surface().flip_count(), 1);
    }

    #[test]
    fn test_model_anchor_is_smoothed_across_ticks() {
        let frames = [
            Some(shoulder_set((30.0, 40.0), (70.0, 40.0))),
            Some(shoulder_set((40.0, 40.0), (80.0, 40.0))),
        ];
        let tracker = ScriptedTracker::new(frames);
        let model = OverlayAsset::model(7, 64, 64);
        let mut session = start_session(Category::Body3d, tracker, model);
        let handle = session.handle();

        session.tick();
        let first = handle.last_transform().unwrap();
        // First sample seeds the filter unchanged: midpoint (50, 40) mirrored.
        assert_relative_eq!(first.mirrored_x, 50.0, epsilon = 1e-4);

        session.tick();
        let second = handle.last_transform().unwrap();
        // Target midpoint moved to mirrored 40; blend by alpha 0.35.
        assert_relative_eq!(
            second.mirrored_x,
            50.0 + (40.0 - 50.0) * 0.35,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_run_consumes_scheduler_frames_in_order() {
        let frames = [Some(eye_set()), Some(eye_set()), Some(eye_set())];
        let tracker = ScriptedTracker::new(frames);
        let mut session = start_session(Category::Glasses, tracker, sprite());

        let mut scheduler = ManualScheduler::with_frames(3);
        session.run(&mut scheduler);

        assert_eq!(session.frames_drawn(), 3);
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!scheduler.wait_next_frame());
    }

    #[test]
    fn test_manual_scheduler_cancel() {
        let mut scheduler = ManualScheduler::with_frames(5);
        assert!(scheduler.wait_next_frame());
        scheduler.cancel();
        assert!(!scheduler.wait_next_frame());
    }

    #[test]
    fn test_fixed_rate_scheduler_paces_and_cancels() {
        let mut scheduler = FixedRateScheduler::new(1000);
        assert!(scheduler.wait_next_frame());
        assert!(scheduler.wait_next_frame());
        scheduler.cancel();
        assert!(!scheduler.wait_next_frame());
    }
}
