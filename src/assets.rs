//! Overlay asset loading.
//!
//! An overlay is either a sprite image decoded to RGBA pixels or an opaque
//! handle into the caller's 3D renderer. Assets are loaded once per
//! session, owned by the session for its lifetime, and shared read-only
//! across frames.

use std::path::Path;

use thiserror::Error;

/// Why an overlay asset failed to load. Surfaced once, at session start.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to decode sprite image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("sprite has zero pixel area ({width}x{height})")]
    EmptySprite { width: u32, height: u32 },
    #[error("sprite pixel buffer is {actual} bytes, expected {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },
}

/// What kind of drawable the asset is.
#[derive(Clone, Debug)]
pub enum AssetKind {
    /// Decoded RGBA pixels, row-major.
    Sprite { pixels: Vec<u8> },
    /// Opaque handle into the caller's 3D renderer, which owns the model's
    /// own scale/rotation API.
    Model { handle: u64 },
}

/// A loaded overlay asset.
#[derive(Clone, Debug)]
pub struct OverlayAsset {
    kind: AssetKind,
    native_width: u32,
    native_height: u32,
    /// Set when the art is authored in an orientation that would appear
    /// mirrored once the anchor midpoint is already mirrored.
    mirror_compensate: bool,
}

impl OverlayAsset {
    /// Decode a sprite image from disk.
    pub fn sprite_from_path(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::EmptySprite { width, height });
        }
        log::info!("Loaded sprite overlay {:?} ({}x{})", path, width, height);
        Ok(Self {
            kind: AssetKind::Sprite {
                pixels: image.into_raw(),
            },
            native_width: width,
            native_height: height,
            mirror_compensate: false,
        })
    }

    /// Wrap already-decoded RGBA pixels.
    pub fn sprite_from_rgba(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, AssetError> {
        if width == 0 || height == 0 {
            return Err(AssetError::EmptySprite { width, height });
        }
        let expected = (width * height * 4) as usize;
        if pixels.len() != expected {
            return Err(AssetError::PixelSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            kind: AssetKind::Sprite { pixels },
            native_width: width,
            native_height: height,
            mirror_compensate: false,
        })
    }

    /// Wrap an opaque 3D model handle and its native bounding size.
    pub fn model(handle: u64, native_width: u32, native_height: u32) -> Self {
        Self {
            kind: AssetKind::Model { handle },
            native_width,
            native_height,
            mirror_compensate: false,
        }
    }

    /// Mark the asset as needing a horizontal flip during compositing.
    pub fn with_mirror_compensate(mut self, on: bool) -> Self {
        self.mirror_compensate = on;
        self
    }

    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }

    pub fn is_model(&self) -> bool {
        matches!(self.kind, AssetKind::Model { .. })
    }

    pub fn native_width(&self) -> u32 {
        self.native_width
    }

    pub fn native_height(&self) -> u32 {
        self.native_height
    }

    /// Native width over height, guarding degenerate dimensions.
    pub fn aspect_ratio(&self) -> f32 {
        let w = self.native_width.max(1) as f32;
        let h = self.native_height.max(1) as f32;
        w / h
    }

    pub fn mirror_compensate(&self) -> bool {
        self.mirror_compensate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_from_rgba_validates_dimensions() {
        assert!(matches!(
            OverlayAsset::sprite_from_rgba(vec![], 0, 4),
            Err(AssetError::EmptySprite { .. })
        ));
        assert!(matches!(
            OverlayAsset::sprite_from_rgba(vec![0; 12], 2, 2),
            Err(AssetError::PixelSizeMismatch {
                expected: 16,
                actual: 12
            })
        ));
        assert!(OverlayAsset::sprite_from_rgba(vec![0; 16], 2, 2).is_ok());
    }

    #[test]
    fn test_aspect_ratio_guards_zero_height() {
        let asset = OverlayAsset::model(7, 200, 100);
        assert_eq!(asset.aspect_ratio(), 2.0);
        let degenerate = OverlayAsset::model(7, 200, 0);
        assert_eq!(degenerate.aspect_ratio(), 200.0);
    }

    #[test]
    fn test_mirror_compensate_flag() {
        let asset = OverlayAsset::model(1, 10, 10);
        assert!(!asset.mirror_compensate());
        assert!(asset.with_mirror_compensate(true).mirror_compensate());
    }

    #[test]
    fn test_sprite_from_missing_path_fails() {
        let err = OverlayAsset::sprite_from_path("/nonexistent/overlay.png");
        assert!(matches!(err, Err(AssetError::Decode(_))));
    }
}
