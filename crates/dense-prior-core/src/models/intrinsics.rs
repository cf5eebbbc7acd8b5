use serde::{Deserialize, Serialize};

use crate::{CoreError, Mat3, Real, Vec2};

/// Pinhole intrinsics (no skew) tied to a concrete image shape.
///
/// ```text
/// K = | fx   0   cx |
///     | 0    fy  cy |
///     | 0    0   1  |
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FovIntrinsics {
    /// Focal length in pixels along X.
    pub fx: Real,
    /// Focal length in pixels along Y.
    pub fy: Real,
    /// Principal point X coordinate in pixels.
    pub cx: Real,
    /// Principal point Y coordinate in pixels.
    pub cy: Real,
}

/// Focal length in pixels for an image extent and a field of view.
pub fn fov_to_focal(fov: Real, extent: usize) -> Real {
    extent as Real / (2.0 * (fov / 2.0).tan())
}

/// Field of view for an image extent and a focal length in pixels.
pub fn focal_to_fov(focal: Real, extent: usize) -> Real {
    2.0 * (extent as Real / (2.0 * focal)).atan()
}

/// Reject fields of view outside the open interval `(0, pi)`.
pub fn validate_fov(fov: Real) -> Result<(), CoreError> {
    if fov.is_finite() && fov > 0.0 && fov < std::f64::consts::PI {
        Ok(())
    } else {
        Err(CoreError::InvalidFov(fov))
    }
}

impl FovIntrinsics {
    /// Intrinsics of a `width`×`height` image with the given fields of view.
    ///
    /// The principal point sits at the integer image center
    /// (`width / 2`, `height / 2` with integer division).
    pub fn from_fov(fov_x: Real, fov_y: Real, width: usize, height: usize) -> Self {
        Self {
            fx: fov_to_focal(fov_x, width),
            fy: fov_to_focal(fov_y, height),
            cx: (width / 2) as Real,
            cy: (height / 2) as Real,
        }
    }

    /// Rescale focal lengths from an original image shape to a final one.
    ///
    /// `fx` scales with `final_width / original_width` and `fy` with
    /// `final_height / original_height`; the principal point is reset to the
    /// integer center of the final shape.
    pub fn rescaled(
        &self,
        original: (usize, usize),
        final_shape: (usize, usize),
    ) -> Self {
        let (w0, h0) = original;
        let (w, h) = final_shape;
        Self {
            fx: self.fx * (w as Real / w0 as Real),
            fy: self.fy * (h as Real / h0 as Real),
            cx: (w / 2) as Real,
            cy: (h / 2) as Real,
        }
    }

    /// Return the 3x3 camera intrinsics matrix K.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Mean of the two focal lengths.
    pub fn mean_focal(&self) -> Real {
        0.5 * (self.fx + self.fy)
    }

    pub fn principal_point(&self) -> Vec2 {
        Vec2::new(self.cx, self.cy)
    }

    /// Horizontal field of view implied by `fx` over `width` pixels.
    pub fn fov_x(&self, width: usize) -> Real {
        focal_to_fov(self.fx, width)
    }

    /// Vertical field of view implied by `fy` over `height` pixels.
    pub fn fov_y(&self, height: usize) -> Real {
        focal_to_fov(self.fy, height)
    }
}
