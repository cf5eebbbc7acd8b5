use serde::{Deserialize, Serialize};

use crate::{CoreError, Pt3, Vec3};

/// Unordered set of 3D points with optional per-point RGB colors in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Pt3>,
    pub colors: Option<Vec<Vec3>>,
}

impl PointCloud {
    pub fn new(points: Vec<Pt3>) -> Self {
        Self {
            points,
            colors: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Vec3>) -> Result<Self, CoreError> {
        if colors.len() != self.points.len() {
            return Err(CoreError::ColorCountMismatch {
                points: self.points.len(),
                colors: colors.len(),
            });
        }
        self.colors = Some(colors);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Append all points of `other`.
    ///
    /// Colors survive only if both sides carry them; an empty cloud adopts
    /// whatever `other` has.
    pub fn extend_from(&mut self, other: PointCloud) {
        if self.is_empty() {
            *self = other;
            return;
        }
        if other.is_empty() {
            return;
        }
        match (self.colors.as_mut(), other.colors) {
            (Some(mine), Some(theirs)) => mine.extend(theirs),
            _ => self.colors = None,
        }
        self.points.extend(other.points);
    }

    /// Keep every `every_k`-th point, starting with the first.
    ///
    /// `every_k <= 1` keeps the cloud unchanged.
    pub fn uniform_down_sample(&self, every_k: usize) -> PointCloud {
        if every_k <= 1 {
            return self.clone();
        }
        self.select_indices((0..self.len()).step_by(every_k))
    }

    /// Keep exactly `count` points spread evenly over the index range.
    ///
    /// Point `i` of the result is source point `i * len / count`. Returns the
    /// cloud unchanged when it already has `count` points or fewer.
    pub fn select_evenly(&self, count: usize) -> PointCloud {
        let len = self.len();
        if len <= count {
            return self.clone();
        }
        self.select_indices((0..count).map(|i| i * len / count))
    }

    fn select_indices(&self, indices: impl Iterator<Item = usize> + Clone) -> PointCloud {
        let points = indices.clone().map(|i| self.points[i]).collect();
        let colors = self
            .colors
            .as_ref()
            .map(|c| indices.map(|i| c[i]).collect());
        PointCloud { points, colors }
    }

    /// Axis-aligned bounds `(min, max)`, or `None` for an empty cloud.
    pub fn bounding_box(&self) -> Option<(Pt3, Pt3)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (
                Pt3::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Pt3::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            )
        }))
    }
}
