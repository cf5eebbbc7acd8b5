//! Masked fusion of aligned views and point-budget capping.

use dense_prior_core::{PointCloud, Pt3, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::aligner::ViewAlignment;
use crate::error::PipelineError;
use crate::preprocess::ProcessedView;

/// Counts gathered while fusing and capping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStats {
    /// Views that contributed at least one point.
    pub views_used: usize,
    /// Views whose confidence mask was entirely false.
    pub skipped_views: Vec<usize>,
    /// Points before capping.
    pub fused_points: usize,
    /// Points after capping.
    pub kept_points: usize,
    /// Down-sampling stride (`1` when under budget).
    pub stride: usize,
}

/// Merge the confident points of every view into one colored cloud.
///
/// A view whose mask has no `true` entry is skipped and reported in
/// `skipped_views`; it is never an error. Colors come from the 8-bit copy of
/// the processed image, scaled to `[0, 1]`.
pub fn fuse_views<V: AsRef<ProcessedView>>(
    views: &[V],
    alignments: &[ViewAlignment],
) -> Result<(PointCloud, FusionStats), PipelineError> {
    if views.len() != alignments.len() {
        return Err(PipelineError::FusionCount {
            expected: views.len(),
            actual: alignments.len(),
        });
    }
    for (view, aligned) in views.iter().map(AsRef::<ProcessedView>::as_ref).zip(alignments) {
        check_buffers(view, aligned)?;
    }

    let mut stats = FusionStats::default();
    let total: usize = alignments.iter().map(ViewAlignment::num_confident).sum();
    let mut points = Vec::with_capacity(total);
    let mut colors = Vec::with_capacity(total);

    for (view, aligned) in views.iter().map(AsRef::<ProcessedView>::as_ref).zip(alignments) {
        let before = points.len();
        for (i, _) in aligned.mask.iter().enumerate().filter(|(_, m)| **m) {
            let [x, y, z] = aligned.points[i];
            points.push(Pt3::new(x as f64, y as f64, z as f64));
            let [r, g, b] = view.color(i);
            colors.push(Vec3::new(r as f64, g as f64, b as f64) / 255.0);
        }
        let added = points.len() - before;
        if added == 0 {
            info!("view {} has an empty confidence mask, skipping", view.index);
            stats.skipped_views.push(view.index);
        } else {
            debug!("view {}: {added} confident points", view.index);
            stats.views_used += 1;
        }
    }

    stats.fused_points = points.len();
    let cloud = PointCloud {
        points,
        colors: Some(colors),
    };
    Ok((cloud, stats))
}

fn check_buffers(view: &ProcessedView, aligned: &ViewAlignment) -> Result<(), PipelineError> {
    let bad = |message: String| PipelineError::FusionInput {
        view: view.index,
        message,
    };
    if [aligned.height, aligned.width] != view.true_shape {
        return Err(bad(format!(
            "aligned shape {}x{} does not match processed view {}x{}",
            aligned.width,
            aligned.height,
            view.width(),
            view.height()
        )));
    }
    let n = view.num_pixels();
    if aligned.points.len() != n || aligned.mask.len() != n {
        return Err(bad(format!(
            "{} points and {} mask entries for {n} pixels",
            aligned.points.len(),
            aligned.mask.len()
        )));
    }
    if view.unnormalized.len() != 3 * n {
        return Err(bad(format!(
            "{} color bytes for {n} pixels",
            view.unnormalized.len()
        )));
    }
    Ok(())
}

/// Bound `cloud` to at most `max_points` points.
///
/// Keeps every `k`-th point with `k = len / max_points` when over budget.
/// Integer division can leave the result above the budget (e.g. 1.2M points
/// with a 500k budget gives `k = 2` and 600k points); such a result is then
/// thinned to exactly `max_points` evenly spread points. Returns the capped
/// cloud and `k`.
pub fn cap_density(cloud: &PointCloud, max_points: usize) -> (PointCloud, usize) {
    let total = cloud.len();
    if max_points == 0 || total <= max_points {
        return (cloud.clone(), 1);
    }
    let every_k = total / max_points;
    let mut capped = cloud.uniform_down_sample(every_k);
    if capped.len() > max_points {
        capped = capped.select_evenly(max_points);
    }
    info!(
        "capped {total} points to {} (stride {every_k}, budget {max_points})",
        capped.len()
    );
    (capped, every_k)
}
