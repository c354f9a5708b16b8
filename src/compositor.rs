//! Overlay compositing with a scoped transform stack.
//!
//! Draw sequence for every overlay: save, translate to the anchor, rotate,
//! conditionally flip once, draw at the category's origin offset, restore.
//! The restore is guaranteed by an RAII guard so the surface's transform
//! stack balances even if a draw call panics mid-frame; no transform state
//! leaks across frames.

use std::ops::{Deref, DerefMut};

use crate::anchor::{tuning, AnchorTransform, Category};
use crate::assets::{AssetKind, OverlayAsset};

/// Drawing surface for one session's canvas.
///
/// Exclusively owned by the frame driver for the session's duration. The
/// transform calls mirror an immediate-mode 2D context; `place_model`
/// hands a 3D asset to the caller's renderer at the current origin.
pub trait DrawSurface {
    /// Push a copy of the current transform state.
    fn save(&mut self);
    /// Pop the most recently pushed transform state.
    fn restore(&mut self);
    fn translate(&mut self, x: f32, y: f32);
    fn rotate(&mut self, radians: f32);
    fn scale(&mut self, sx: f32, sy: f32);
    /// Draw a sprite with its top-left at `(x, y)` relative to the current
    /// transform origin.
    fn draw_sprite(&mut self, asset: &OverlayAsset, x: f32, y: f32, width: f32, height: f32);
    /// Place a 3D model at the current origin with the given uniform scale.
    fn place_model(&mut self, asset: &OverlayAsset, scale: f32);
}

/// Scoped save/restore pair.
///
/// `new` pushes the surface's transform state; dropping the guard pops it,
/// on every exit path including unwinds.
pub struct TransformGuard<'a, S: DrawSurface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: DrawSurface + ?Sized> TransformGuard<'a, S> {
    pub fn new(surface: &'a mut S) -> Self {
        surface.save();
        Self { surface }
    }
}

impl<S: DrawSurface + ?Sized> Deref for TransformGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: DrawSurface + ?Sized> DerefMut for TransformGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: DrawSurface + ?Sized> Drop for TransformGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.restore();
    }
}

/// Sprite draw width for a category, derived from the anchor's size.
///
/// Hat and body anchors already carry a width; the rest carry a landmark
/// distance that is scaled by a per-category visual-fit factor.
pub fn sprite_width(category: Category, size: f32) -> f32 {
    match category {
        Category::Hat | Category::Body => size,
        Category::Glasses => size * tuning::GLASSES_WIDTH_FACTOR,
        Category::Hand | Category::Wrist => {
            (size * tuning::HAND_WIDTH_FACTOR).max(tuning::HAND_MIN_WIDTH)
        }
        Category::Feet => (size * tuning::FEET_WIDTH_FACTOR).max(tuning::FEET_MIN_WIDTH),
        Category::JewelryEyes | Category::JewelryShoulders | Category::Hair => size,
        // 3D categories never reach sprite sizing, but stay total.
        Category::Body3d => size,
    }
}

/// Sprite draw height preserving the asset's native aspect ratio.
pub fn sprite_height(asset: &OverlayAsset, width: f32) -> f32 {
    (width / asset.aspect_ratio()).max(1.0)
}

/// Origin offset anchoring the sprite's "crown" (top-center) rather than
/// its geometric center.
pub fn origin_offset(category: Category, width: f32, height: f32) -> (f32, f32) {
    let lift = match category {
        Category::Hat => 0.6,
        _ => 0.55,
    };
    (-width / 2.0, -height * lift)
}

/// Composite one overlay at the given anchor transform.
///
/// Exactly one `scale(-1, 1)` call is issued when `mirror_compensate` is
/// set, zero otherwise.
pub fn draw_overlay<S: DrawSurface + ?Sized>(
    surface: &mut S,
    category: Category,
    transform: &AnchorTransform,
    asset: &OverlayAsset,
) {
    let mut guard = TransformGuard::new(surface);
    guard.translate(transform.mirrored_x, transform.mirrored_y);
    guard.rotate(transform.rotation_radians);
    if transform.mirror_compensate {
        guard.scale(-1.0, 1.0);
    }

    match asset.kind() {
        AssetKind::Sprite { .. } => {
            let width = sprite_width(category, transform.size);
            let height = sprite_height(asset, width);
            let (ox, oy) = origin_offset(category, width, height);
            guard.draw_sprite(asset, ox, oy, width, height);
        }
        AssetKind::Model { .. } => {
            guard.place_model(asset, transform.size);
        }
    }
}

/// One recorded surface call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Save,
    Restore,
    Translate(f32, f32),
    Rotate(f32),
    Scale(f32, f32),
    DrawSprite {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    PlaceModel {
        scale: f32,
    },
}

/// [`DrawSurface`] that records calls instead of rasterizing.
///
/// Used by harnesses and the demo to assert on compositing sequences and
/// save/restore balance.
#[derive(Default)]
pub struct RecordingSurface {
    calls: Vec<DrawCall>,
    depth: i32,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.depth = 0;
    }

    /// Number of horizontal-flip (`scale`) calls recorded.
    pub fn flip_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DrawCall::Scale(..)))
            .count()
    }

    /// Number of sprite or model draws recorded.
    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DrawCall::DrawSprite { .. } | DrawCall::PlaceModel { .. }))
            .count()
    }

    /// True when every save has been matched by a restore.
    pub fn is_balanced(&self) -> bool {
        self.depth == 0
    }
}

impl DrawSurface for RecordingSurface {
    fn save(&mut self) {
        self.depth += 1;
        self.calls.push(DrawCall::Save);
    }

    fn restore(&mut self) {
        self.depth -= 1;
        self.calls.push(DrawCall::Restore);
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.calls.push(DrawCall::Translate(x, y));
    }

    fn rotate(&mut self, radians: f32) {
        self.calls.push(DrawCall::Rotate(radians));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.calls.push(DrawCall::Scale(sx, sy));
    }

    fn draw_sprite(&mut self, _asset: &OverlayAsset, x: f32, y: f32, width: f32, height: f32) {
        self.calls.push(DrawCall::DrawSprite {
            x,
            y,
            width,
            height,
        });
    }

    fn place_model(&mut self, _asset: &OverlayAsset, scale: f32) {
        self.calls.push(DrawCall::PlaceModel { scale });
    }
}
