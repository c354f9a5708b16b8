//! Anchor calculators: per-category landmark geometry.
//!
//! Each accessory category maps 2-4 raw landmarks to an [`AnchorTransform`]
//! through a pure calculator. All calculators share one pattern: mirror the
//! relevant x-coordinates, derive the angle from `atan2` of the mirrored
//! delta, and derive a size from the mirrored Euclidean distance, floored
//! so coincident landmarks never collapse the draw. Calculators are looked
//! up through a [`CalculatorRegistry`] so adding a category means adding
//! one registration, not another branch in the frame loop.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::{floored_distance, midpoint, segment_angle, CanvasSize};
use crate::landmarks::{LandmarkRole, LandmarkSet};

/// Empirically chosen visual-fit constants, preserved for parity with the
/// reference overlays. Tunable, not physical.
pub mod tuning {
    /// Floor for distance-derived sizes.
    pub const MIN_SIZE: f32 = 1.0;
    /// Garment overlay width as a multiple of shoulder distance.
    pub const BODY_WIDTH_FACTOR: f32 = 2.4;
    /// Minimum garment overlay width.
    pub const BODY_MIN_WIDTH: f32 = 40.0;
    /// Hair anchor lift above the eye midpoint, as a fraction of eye distance.
    pub const HAIR_LIFT_FACTOR: f32 = 0.45;
    /// 3D model scale as a multiple of shoulder distance.
    pub const MODEL_SCALE_FACTOR: f32 = 0.25;
    /// Minimum 3D model scale.
    pub const MODEL_MIN_SCALE: f32 = 0.1;
    /// Glasses sprite width as a multiple of eye distance.
    pub const GLASSES_WIDTH_FACTOR: f32 = 2.1;
    /// Hand/wrist sprite width as a multiple of index-pinky distance.
    pub const HAND_WIDTH_FACTOR: f32 = 2.0;
    /// Minimum hand/wrist sprite width.
    pub const HAND_MIN_WIDTH: f32 = 20.0;
    /// Feet sprite width as a multiple of heel-toe length.
    pub const FEET_WIDTH_FACTOR: f32 = 2.2;
    /// Minimum feet sprite width.
    pub const FEET_MIN_WIDTH: f32 = 30.0;
}

/// Accessory category tag.
///
/// Selects which calculator runs, which landmark roles it reads, and which
/// origin-offset convention the compositor applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Hat,
    Glasses,
    JewelryEyes,
    JewelryShoulders,
    Hair,
    Hand,
    Wrist,
    Feet,
    Body,
    #[serde(rename = "body-3d")]
    Body3d,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Hat,
        Category::Glasses,
        Category::JewelryEyes,
        Category::JewelryShoulders,
        Category::Hair,
        Category::Hand,
        Category::Wrist,
        Category::Feet,
        Category::Body,
        Category::Body3d,
    ];

    /// Landmark roles this category reads each frame. Empty for `Hat`,
    /// whose placement is supplied by the caller instead.
    pub fn roles(&self) -> &'static [LandmarkRole] {
        use LandmarkRole::*;
        match self {
            Category::Hat => &[],
            Category::Glasses | Category::JewelryEyes | Category::Hair => &[LeftEye, RightEye],
            Category::JewelryShoulders | Category::Body | Category::Body3d => {
                &[LeftShoulder, RightShoulder]
            }
            Category::Hand | Category::Wrist => &[IndexTip, PinkyTip],
            Category::Feet => &[Heel, Toe],
        }
    }
}

/// Per-frame position, rotation, and scale for one overlay category.
///
/// Computed fresh each frame in mirrored (canvas) coordinates, immutable
/// once produced, and consumed once by the compositor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorTransform {
    pub mirrored_x: f32,
    pub mirrored_y: f32,
    pub rotation_radians: f32,
    /// Category-specific size: a sprite width, a landmark distance, or a
    /// 3D model scale. Always at or above its documented floor.
    pub size: f32,
    /// Whether compositing applies a horizontal flip for art authored in
    /// an orientation that would otherwise appear mirrored.
    pub mirror_compensate: bool,
}

/// Externally supplied placement for hat overlays.
///
/// Hats are anchored from the caller's face box rather than tracked
/// landmarks: the engine only mirrors the midpoint into canvas space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HatPlacement {
    /// Detector-space x of the head midpoint.
    pub midpoint_x: f32,
    /// Canvas-space y where the hat sits.
    pub y_offset: f32,
    /// Head tilt in radians.
    pub angle: f32,
    /// Sprite width in canvas pixels.
    pub width: f32,
    pub mirror_compensate: bool,
}

/// Anchor for hat overlays from an externally supplied placement.
pub fn hat_anchor(canvas: CanvasSize, placement: &HatPlacement) -> AnchorTransform {
    AnchorTransform {
        mirrored_x: canvas.mirror_x(placement.midpoint_x),
        mirrored_y: placement.y_offset,
        rotation_radians: placement.angle,
        size: placement.width.max(tuning::MIN_SIZE),
        mirror_compensate: placement.mirror_compensate,
    }
}

/// A pure per-category mapping from a frame's landmarks to an anchor.
///
/// Returns `None` when a required landmark is absent or below the
/// confidence floor; the driver then skips that frame's draw instead of
/// compositing a stale or garbage transform.
pub trait AnchorCalculator: Send + Sync {
    fn category(&self) -> Category;

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        confidence_floor: f32,
    ) -> Option<AnchorTransform>;
}

/// Shared two-landmark pattern: mirrored midpoint position, `atan2` angle
/// of the mirrored pair, and floored mirrored distance.
///
/// The returned distance is unfloored so calculators with their own floor
/// (body width, model scale) apply it to the raw value.
fn pair_anchor(
    canvas: CanvasSize,
    set: &LandmarkSet,
    a: LandmarkRole,
    b: LandmarkRole,
    floor: f32,
) -> Option<(AnchorTransform, f32)> {
    let first = set.confident(a, floor)?.position();
    let second = set.confident(b, floor)?.position();

    let ma = canvas.mirror_point(first);
    let mb = canvas.mirror_point(second);
    let mid = midpoint(ma, mb);

    Some((
        AnchorTransform {
            mirrored_x: mid.x,
            mirrored_y: mid.y,
            rotation_radians: segment_angle(ma, mb),
            size: floored_distance(ma, mb, tuning::MIN_SIZE),
            mirror_compensate: false,
        },
        ma.distance(mb),
    ))
}

/// Glasses: angle and spacing from the mirrored eye pair.
pub struct GlassesCalculator;

impl AnchorCalculator for GlassesCalculator {
    fn category(&self) -> Category {
        Category::Glasses
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (anchor, _) = pair_anchor(
            canvas,
            set,
            LandmarkRole::LeftEye,
            LandmarkRole::RightEye,
            floor,
        )?;
        Some(anchor)
    }
}

/// Earrings and eye-level jewelry: mirrored eye midpoint and distance.
pub struct JewelryEyesCalculator;

impl AnchorCalculator for JewelryEyesCalculator {
    fn category(&self) -> Category {
        Category::JewelryEyes
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (anchor, _) = pair_anchor(
            canvas,
            set,
            LandmarkRole::LeftEye,
            LandmarkRole::RightEye,
            floor,
        )?;
        Some(anchor)
    }
}

/// Necklaces: mirrored shoulder midpoint and distance.
pub struct JewelryShouldersCalculator;

impl AnchorCalculator for JewelryShouldersCalculator {
    fn category(&self) -> Category {
        Category::JewelryShoulders
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (anchor, _) = pair_anchor(
            canvas,
            set,
            LandmarkRole::LeftShoulder,
            LandmarkRole::RightShoulder,
            floor,
        )?;
        Some(anchor)
    }
}

/// Hair: anchored above the eye midpoint, lifted by a fraction of the eye
/// distance so the hairline sits over the forehead.
pub struct HairCalculator;

impl AnchorCalculator for HairCalculator {
    fn category(&self) -> Category {
        Category::Hair
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (mut anchor, distance) = pair_anchor(
            canvas,
            set,
            LandmarkRole::LeftEye,
            LandmarkRole::RightEye,
            floor,
        )?;
        anchor.mirrored_y -= distance * tuning::HAIR_LIFT_FACTOR;
        Some(anchor)
    }
}

/// Rings: angle across the mirrored index-to-pinky span.
pub struct HandCalculator;

impl AnchorCalculator for HandCalculator {
    fn category(&self) -> Category {
        Category::Hand
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (anchor, _) = pair_anchor(
            canvas,
            set,
            LandmarkRole::IndexTip,
            LandmarkRole::PinkyTip,
            floor,
        )?;
        Some(anchor)
    }
}

/// Watches: same span as rings, different compositing width.
pub struct WristCalculator;

impl AnchorCalculator for WristCalculator {
    fn category(&self) -> Category {
        Category::Wrist
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (anchor, _) = pair_anchor(
            canvas,
            set,
            LandmarkRole::IndexTip,
            LandmarkRole::PinkyTip,
            floor,
        )?;
        Some(anchor)
    }
}

/// Shoes: heel-to-toe angle and foot length.
pub struct FeetCalculator;

impl AnchorCalculator for FeetCalculator {
    fn category(&self) -> Category {
        Category::Feet
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (anchor, _) =
            pair_anchor(canvas, set, LandmarkRole::Heel, LandmarkRole::Toe, floor)?;
        Some(anchor)
    }
}

/// Full-body garments: shoulder midpoint, with overlay width scaled up
/// from the shoulder distance.
pub struct BodyCalculator;

impl AnchorCalculator for BodyCalculator {
    fn category(&self) -> Category {
        Category::Body
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (mut anchor, distance) = pair_anchor(
            canvas,
            set,
            LandmarkRole::LeftShoulder,
            LandmarkRole::RightShoulder,
            floor,
        )?;
        anchor.size = (distance * tuning::BODY_WIDTH_FACTOR).max(tuning::BODY_MIN_WIDTH);
        Some(anchor)
    }
}

/// 3D garments: shoulder-derived uniform model scale.
pub struct Body3dCalculator;

impl AnchorCalculator for Body3dCalculator {
    fn category(&self) -> Category {
        Category::Body3d
    }

    fn compute(
        &self,
        canvas: CanvasSize,
        set: &LandmarkSet,
        floor: f32,
    ) -> Option<AnchorTransform> {
        let (mut anchor, distance) = pair_anchor(
            canvas,
            set,
            LandmarkRole::LeftShoulder,
            LandmarkRole::RightShoulder,
            floor,
        )?;
        anchor.size = (distance * tuning::MODEL_SCALE_FACTOR).max(tuning::MODEL_MIN_SCALE);
        Some(anchor)
    }
}

/// Strategy table mapping categories to their calculators.
///
/// Calculators are registered at startup; adding a category is one
/// registration rather than another branch in the frame loop.
pub struct CalculatorRegistry {
    calculators: HashMap<Category, Arc<dyn AnchorCalculator>>,
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CalculatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            calculators: HashMap::new(),
        }
    }

    /// Registry with every built-in landmark-driven calculator. `Hat` has
    /// no calculator here; its placement comes from the caller.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(GlassesCalculator);
        registry.register(JewelryEyesCalculator);
        registry.register(JewelryShouldersCalculator);
        registry.register(HairCalculator);
        registry.register(HandCalculator);
        registry.register(WristCalculator);
        registry.register(FeetCalculator);
        registry.register(BodyCalculator);
        registry.register(Body3dCalculator);
        registry
    }

    /// Register a calculator, replacing any existing entry for its category.
    pub fn register(&mut self, calculator: impl AnchorCalculator + 'static) {
        self.calculators
            .insert(calculator.category(), Arc::new(calculator));
    }

    pub fn get(&self, category: Category) -> Option<Arc<dyn AnchorCalculator>> {
        self.calculators.get(&category).cloned()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.calculators.contains_key(&category)
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.calculators.keys().copied()
    }
}
