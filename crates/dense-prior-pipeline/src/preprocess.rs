//! Geometry-consistent image preprocessing.
//!
//! Each view is quantized to 8 bits, resized with its aspect ratio kept,
//! and center-cropped to a shape the pairwise predictor accepts. The
//! intrinsics are recomputed from the field of view and the final shape in
//! the same call, so a processed image never exists without matching
//! intrinsics.
//!
//! Two modes are supported:
//!
//! - [`ResizeMode::LongEdge`]: the long edge becomes `size`, then both
//!   extents are cropped down to a multiple of 16. An exactly square result
//!   is cropped to 4:3 unless `square_ok` is set.
//! - [`ResizeMode::SquareCrop`]: the short edge becomes (about) `size`, then
//!   the largest centered square is kept.

use dense_prior_core::{FovIntrinsics, Iso3, SourceView};
use image::RgbImage;
use image::imageops::{self, FilterType};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Image size that selects [`ResizeMode::SquareCrop`] in
/// [`ResizeMode::from_image_size`].
pub const SQUARE_MODE_SIZE: u32 = 224;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResizeMode {
    LongEdge { size: u32, square_ok: bool },
    SquareCrop { size: u32 },
}

impl ResizeMode {
    /// Mode implied by a configured image size: 224 crops to a square,
    /// anything else resizes the long edge.
    pub fn from_image_size(size: u32, square_ok: bool) -> Self {
        if size == SQUARE_MODE_SIZE {
            ResizeMode::SquareCrop { size }
        } else {
            ResizeMode::LongEdge { size, square_ok }
        }
    }

    /// Target long edge for a `width`×`height` source image.
    pub fn long_edge(&self, width: u32, height: u32) -> u32 {
        match *self {
            ResizeMode::LongEdge { size, .. } => size,
            ResizeMode::SquareCrop { size } => {
                let (w, h) = (width as f64, height as f64);
                (size as f64 * (w / h).max(h / w)).round_ties_even() as u32
            }
        }
    }
}

/// Size after scaling the long edge of `width`×`height` to `long_edge`.
///
/// Each extent is rounded to the nearest integer, ties to even.
pub fn resized_dims(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    let s = width.max(height) as f64;
    let scale = long_edge as f64 / s;
    (
        (width as f64 * scale).round_ties_even() as u32,
        (height as f64 * scale).round_ties_even() as u32,
    )
}

/// Centered crop window inside a resized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropPlan {
    /// Resized image width before cropping.
    pub width: u32,
    /// Resized image height before cropping.
    pub height: u32,
    pub center_x: u32,
    pub center_y: u32,
    pub half_width: u32,
    pub half_height: u32,
}

impl CropPlan {
    pub fn left(&self) -> u32 {
        self.center_x - self.half_width
    }

    pub fn top(&self) -> u32 {
        self.center_y - self.half_height
    }

    /// Cropped `(width, height)`.
    pub fn output_size(&self) -> (u32, u32) {
        (2 * self.half_width, 2 * self.half_height)
    }

    pub fn is_degenerate(&self) -> bool {
        self.half_width == 0 || self.half_height == 0
    }
}

/// Crop window for a resized `width`×`height` image.
///
/// The center is the integer midpoint. Half extents never exceed the
/// distance from the center to the left/top border, so the window always
/// lies inside the image.
pub fn plan_crop(mode: ResizeMode, width: u32, height: u32) -> CropPlan {
    let (cx, cy) = (width / 2, height / 2);
    let (half_width, half_height) = match mode {
        ResizeMode::SquareCrop { .. } => {
            let half = cx.min(cy);
            (half, half)
        }
        ResizeMode::LongEdge { square_ok, .. } => {
            let half_width = ((2 * cx) / 16) * 8;
            let mut half_height = ((2 * cy) / 16) * 8;
            if !square_ok && width == height {
                // half_width is a multiple of 8, so this stays exact.
                half_height = 3 * half_width / 4;
            }
            (half_width, half_height)
        }
    };
    CropPlan {
        width,
        height,
        center_x: cx,
        center_y: cy,
        half_width,
        half_height,
    }
}

/// Predictor input: CHW tensor normalized to `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedImage {
    pub height: usize,
    pub width: usize,
    /// `3 * height * width` samples, channel-major.
    pub data: Vec<f32>,
}

impl NormalizedImage {
    fn from_rgb(img: &RgbImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let plane = w * h;
        let mut data = vec![0.0f32; 3 * plane];
        for (i, px) in img.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = (px.0[c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }
        Self {
            height: h,
            width: w,
            data,
        }
    }

    pub fn channel(&self, c: usize) -> &[f32] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }
}

/// A view resampled for the predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedView {
    pub image: NormalizedImage,
    /// 8-bit RGB copy of the cropped image (HWC), used for coloring points.
    pub unnormalized: Vec<u8>,
    /// `[height, width]` of the cropped image.
    pub true_shape: [usize; 2],
    /// Position in the selected-view list.
    pub index: usize,
    pub instance: String,
}

impl ProcessedView {
    pub fn height(&self) -> usize {
        self.true_shape[0]
    }

    pub fn width(&self) -> usize {
        self.true_shape[1]
    }

    pub fn num_pixels(&self) -> usize {
        self.true_shape[0] * self.true_shape[1]
    }

    /// 8-bit color of pixel `i` in row-major order.
    pub fn color(&self, i: usize) -> [u8; 3] {
        [
            self.unnormalized[3 * i],
            self.unnormalized[3 * i + 1],
            self.unnormalized[3 * i + 2],
        ]
    }
}

impl AsRef<ProcessedView> for ProcessedView {
    fn as_ref(&self) -> &ProcessedView {
        self
    }
}

/// Everything the pipeline keeps per view, index-aligned by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedView {
    pub view: ProcessedView,
    /// Intrinsics of the cropped image.
    pub intrinsics: FovIntrinsics,
    /// Camera-to-world pose (`T_W_C`).
    pub world_se3_camera: Iso3,
}

/// Resize and crop one view and derive matching intrinsics.
///
/// Fails with [`PipelineError::DegenerateCrop`] when the crop would have a
/// zero extent (e.g. a very thin image whose short edge drops below 16
/// pixels after resizing).
pub fn preprocess_view(
    source: &SourceView,
    index: usize,
    mode: ResizeMode,
) -> Result<PreparedView, PipelineError> {
    let (w0, h0) = (source.image.width() as u32, source.image.height() as u32);
    let img = RgbImage::from_raw(w0, h0, source.image.to_rgb8()).ok_or_else(|| {
        PipelineError::InvalidView {
            view: index,
            message: format!("cannot build {w0}x{h0} RGB buffer"),
        }
    })?;

    let long_edge = mode.long_edge(w0, h0);
    let (rw, rh) = resized_dims(w0, h0, long_edge);
    let plan = plan_crop(mode, rw, rh);
    if plan.is_degenerate() {
        return Err(PipelineError::DegenerateCrop {
            view: index,
            width: rw,
            height: rh,
            half_width: plan.half_width,
            half_height: plan.half_height,
        });
    }

    let resized = if (rw, rh) == (w0, h0) {
        img
    } else {
        let filter = if w0.max(h0) > long_edge {
            FilterType::Lanczos3
        } else {
            FilterType::CatmullRom
        };
        imageops::resize(&img, rw, rh, filter)
    };
    let (cw, ch) = plan.output_size();
    let cropped = imageops::crop_imm(&resized, plan.left(), plan.top(), cw, ch).to_image();

    let intrinsics = source
        .intrinsics()
        .rescaled((w0 as usize, h0 as usize), (cw as usize, ch as usize));

    debug!(
        "view {index}: {w0}x{h0} -> resized {rw}x{rh} -> cropped {cw}x{ch}, fx={:.2} fy={:.2}",
        intrinsics.fx, intrinsics.fy
    );

    let view = ProcessedView {
        image: NormalizedImage::from_rgb(&cropped),
        true_shape: [cropped.height() as usize, cropped.width() as usize],
        unnormalized: cropped.into_raw(),
        index,
        instance: index.to_string(),
    };

    Ok(PreparedView {
        view,
        intrinsics,
        world_se3_camera: source.world_se3_camera(),
    })
}

impl AsRef<ProcessedView> for PreparedView {
    fn as_ref(&self) -> &ProcessedView {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dense_prior_core::ColorImage;

    fn source(width: usize, height: usize) -> SourceView {
        let image = ColorImage::from_fn(width, height, |x, y| {
            [
                x as f32 / width as f32,
                y as f32 / height as f32,
                ((x + y) % 7) as f32 / 7.0,
            ]
        })
        .unwrap();
        SourceView::new(image, Iso3::identity(), 1.2, 0.95).unwrap()
    }

    #[test]
    fn mode_selection_from_size() {
        assert_eq!(
            ResizeMode::from_image_size(224, false),
            ResizeMode::SquareCrop { size: 224 }
        );
        assert_eq!(
            ResizeMode::from_image_size(512, true),
            ResizeMode::LongEdge {
                size: 512,
                square_ok: true
            }
        );
    }

    #[test]
    fn resized_dims_round_each_extent() {
        assert_eq!(resized_dims(800, 600, 512), (512, 384));
        assert_eq!(resized_dims(1000, 333, 512), (512, 170));
        assert_eq!(resized_dims(300, 200, 512), (512, 341));
    }

    #[test]
    fn resized_dims_round_half_to_even() {
        // 765 * 0.5 = 382.5
        assert_eq!(resized_dims(1024, 765, 512), (512, 382));
        // 767 * 0.5 = 383.5
        assert_eq!(resized_dims(1024, 767, 512), (512, 384));
    }

    #[test]
    fn small_source_is_upscaled() {
        let image = ColorImage::from_fn(40, 30, |_, _| [0.5, 0.25, 1.0]).unwrap();
        let src = SourceView::new(image, Iso3::identity(), 1.2, 0.95).unwrap();
        let p = preprocess_view(&src, 0, ResizeMode::from_image_size(64, false)).unwrap();

        assert_eq!(p.view.true_shape, [48, 64]);
        assert_eq!(p.view.unnormalized.len(), 64 * 48 * 3);
        let k0 = src.intrinsics();
        assert!((p.intrinsics.fx - k0.fx * 64.0 / 40.0).abs() < 1e-9);
        assert!((p.intrinsics.fy - k0.fy * 48.0 / 30.0).abs() < 1e-9);
        assert_eq!((p.intrinsics.cx, p.intrinsics.cy), (32.0, 24.0));

        // A flat image stays flat through the interpolating filter.
        let expected = [127i32, 63, 255];
        for i in [0, 64 * 24 + 32, 64 * 48 - 1] {
            let c = p.view.color(i);
            for (got, want) in c.iter().zip(expected) {
                assert!((*got as i32 - want).abs() <= 1, "pixel {i}: {c:?}");
            }
        }
    }

    #[test]
    fn square_on_square_input_becomes_four_by_three() {
        let plan = plan_crop(
            ResizeMode::LongEdge {
                size: 512,
                square_ok: false,
            },
            512,
            512,
        );
        assert_eq!(plan.half_width, 256);
        assert_eq!(plan.half_height, 192);
        assert_eq!(plan.half_height * 4, plan.half_width * 3);
        assert_eq!(plan.output_size(), (512, 384));

        let ok = plan_crop(
            ResizeMode::LongEdge {
                size: 512,
                square_ok: true,
            },
            512,
            512,
        );
        assert_eq!(ok.output_size(), (512, 512));
    }

    #[test]
    fn long_edge_crop_is_multiple_of_sixteen() {
        let mode = ResizeMode::LongEdge {
            size: 512,
            square_ok: false,
        };
        for (w, h) in [(512, 341), (512, 170), (288, 512), (512, 511)] {
            let plan = plan_crop(mode, w, h);
            let (cw, ch) = plan.output_size();
            assert_eq!(cw % 16, 0, "{w}x{h}");
            assert_eq!(ch % 16, 0, "{w}x{h}");
            assert!(plan.left() + cw <= w && plan.top() + ch <= h);
        }
    }

    #[test]
    fn square_mode_800x600() {
        let mode = ResizeMode::SquareCrop { size: 224 };
        let long = mode.long_edge(800, 600);
        assert_eq!(long, 299);
        assert!(long as f64 <= 224.0 * (800.0f64 / 600.0).max(600.0 / 800.0) + 0.5);
        let prepared = preprocess_view(&source(800, 600), 0, mode).unwrap();
        assert_eq!(prepared.view.true_shape, [224, 224]);
    }

    #[test]
    fn true_shape_matches_buffers() {
        let mode = ResizeMode::from_image_size(512, false);
        let prepared = preprocess_view(&source(800, 600), 4, mode).unwrap();
        let v = &prepared.view;
        assert_eq!(v.true_shape, [384, 512]);
        assert_eq!(v.image.height, 384);
        assert_eq!(v.image.width, 512);
        assert_eq!(v.image.data.len(), 3 * 384 * 512);
        assert_eq!(v.unnormalized.len(), 3 * 384 * 512);
        assert_eq!(v.index, 4);
        assert_eq!(v.instance, "4");
        assert_eq!(prepared.intrinsics.cx, 256.0);
        assert_eq!(prepared.intrinsics.cy, 192.0);
    }

    #[test]
    fn intrinsics_roundtrip_fov() {
        let mode = ResizeMode::from_image_size(512, false);
        for (w, h) in [(800, 600), (640, 640), (1000, 333), (300, 500)] {
            let src = source(w, h);
            let p = preprocess_view(&src, 0, mode).unwrap();
            let k = p.intrinsics;
            assert!((k.fov_x(p.view.width()) - src.fov_x).abs() < 1e-12, "{w}x{h}");
            assert!((k.fov_y(p.view.height()) - src.fov_y).abs() < 1e-12, "{w}x{h}");
        }
    }

    #[test]
    fn normalization_maps_to_unit_interval() {
        let image = ColorImage::from_fn(32, 32, |x, _| if x < 16 { [0.0; 3] } else { [1.0; 3] })
            .unwrap();
        let src = SourceView::new(image, Iso3::identity(), 1.0, 1.0).unwrap();
        let p = preprocess_view(
            &src,
            0,
            ResizeMode::LongEdge {
                size: 32,
                square_ok: true,
            },
        )
        .unwrap();
        let red = p.view.image.channel(0);
        assert_eq!(red[0], -1.0);
        assert_eq!(red[31], 1.0);
        assert_eq!(p.view.color(0), [0, 0, 0]);
        assert_eq!(p.view.color(31), [255, 255, 255]);
    }

    #[test]
    fn thin_image_is_rejected() {
        let mode = ResizeMode::from_image_size(512, false);
        let err = preprocess_view(&source(1024, 20), 7, mode).unwrap_err();
        match err {
            PipelineError::DegenerateCrop {
                view, half_height, ..
            } => {
                assert_eq!(view, 7);
                assert_eq!(half_height, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pose_is_inverted_extrinsics() {
        let mut src = source(64, 48);
        src.camera_se3_world = Iso3::translation(1.0, 2.0, 3.0);
        let p = preprocess_view(&src, 0, ResizeMode::from_image_size(64, false)).unwrap();
        let expected = nalgebra::Vector3::new(-1.0, -2.0, -3.0);
        assert!((p.world_se3_camera.translation.vector - expected).norm() < 1e-12);
    }
}
