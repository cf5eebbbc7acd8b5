//! Calibrated input views and the dataset abstraction that supplies them.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{CoreError, FovIntrinsics, Iso3, Real, validate_fov};

/// Row-major RGB image with `f32` samples, nominally in `[0, 1]`.
///
/// Layout is HWC: the sample for channel `c` of pixel `(x, y)` lives at
/// `(y * width + x) * 3 + c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ColorImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::EmptyImage { width, height });
        }
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(CoreError::ImageBufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> [f32; 3],
    ) -> Result<Self, CoreError> {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// Build a float image from 8-bit RGB samples (`v / 255`).
    pub fn from_rgb8(width: usize, height: usize, rgb: &[u8]) -> Result<Self, CoreError> {
        Self::new(
            width,
            height,
            rgb.iter().map(|&v| v as f32 / 255.0).collect(),
        )
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn pixel(&self, x: usize, y: usize) -> [f32; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Quantize to 8-bit RGB by scaling with 255 and truncating.
    ///
    /// Values outside `[0, 1]` saturate; NaN maps to 0.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.data.iter().map(|&v| (v * 255.0) as u8).collect()
    }
}

/// One calibrated camera capture: image, rigid pose, and field of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceView {
    pub image: ColorImage,
    /// World-to-camera transform (`T_C_W`, the camera extrinsics).
    pub camera_se3_world: Iso3,
    /// Horizontal field of view in radians.
    pub fov_x: Real,
    /// Vertical field of view in radians.
    pub fov_y: Real,
}

impl SourceView {
    pub fn new(
        image: ColorImage,
        camera_se3_world: Iso3,
        fov_x: Real,
        fov_y: Real,
    ) -> Result<Self, CoreError> {
        validate_fov(fov_x)?;
        validate_fov(fov_y)?;
        Ok(Self {
            image,
            camera_se3_world,
            fov_x,
            fov_y,
        })
    }

    /// Camera-to-world pose (`T_W_C`).
    pub fn world_se3_camera(&self) -> Iso3 {
        self.camera_se3_world.inverse()
    }

    /// Intrinsics of the original, unresampled image.
    pub fn intrinsics(&self) -> FovIntrinsics {
        FovIntrinsics::from_fov(
            self.fov_x,
            self.fov_y,
            self.image.width(),
            self.image.height(),
        )
    }
}

/// Ordered, indexable source of calibrated views.
///
/// Implementations may hold views in memory or load them lazily; the
/// pipeline only reads from it.
pub trait CameraDataset {
    /// Number of views.
    fn len(&self) -> usize;

    /// View at `index`, or `None` when out of range.
    fn view(&self, index: usize) -> Option<Cow<'_, SourceView>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CameraDataset for [SourceView] {
    fn len(&self) -> usize {
        <[SourceView]>::len(self)
    }

    fn view(&self, index: usize) -> Option<Cow<'_, SourceView>> {
        self.get(index).map(Cow::Borrowed)
    }
}

impl CameraDataset for Vec<SourceView> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn view(&self, index: usize) -> Option<Cow<'_, SourceView>> {
        self.get(index).map(Cow::Borrowed)
    }
}

/// Choose at most `max_views` of `len` views with a fixed stride.
///
/// With `len <= max_views` every index is returned. Otherwise the stride is
/// `len / max_views` (integer division), indices start at 0, and the result
/// is truncated to `max_views` entries. Order is preserved.
pub fn select_view_indices(len: usize, max_views: usize) -> Vec<usize> {
    if len <= max_views {
        return (0..len).collect();
    }
    if max_views == 0 {
        return Vec::new();
    }
    let interval = len / max_views;
    (0..len).step_by(interval).take(max_views).collect()
}
