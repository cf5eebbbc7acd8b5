//! Core primitives for building dense point-cloud priors.
//!
//! This crate provides the building blocks shared by the rest of the
//! workspace:
//!
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, `Iso3`, and friends),
//! - the calibrated view model (`SourceView`, `ColorImage`) and the
//!   [`CameraDataset`] provider trait,
//! - field-of-view derived pinhole intrinsics ([`FovIntrinsics`]),
//! - interval-based view selection ([`select_view_indices`]),
//! - a colored point cloud container with uniform down-sampling,
//! - an explicit execution [`Device`] handle for external collaborators.
//!
//! Pose convention: `camera_se3_world` maps world points into the camera
//! frame (`T_C_W`); its inverse `world_se3_camera` (`T_W_C`) is the pose used
//! to anchor global alignment.
//!
//! # Example
//!
//! ```
//! use dense_prior_core::{FovIntrinsics, select_view_indices};
//!
//! let k = FovIntrinsics::from_fov(60f64.to_radians(), 45f64.to_radians(), 640, 480);
//! assert!((k.fov_x(640) - 60f64.to_radians()).abs() < 1e-12);
//!
//! let picked = select_view_indices(45, 20);
//! assert_eq!(picked.len(), 20);
//! assert_eq!(picked[1], 2);
//! ```

mod device;
mod error;
/// Linear algebra type aliases.
mod math;
/// Camera models.
mod models;
mod point_cloud;
mod view;

pub use device::*;
pub use error::*;
pub use math::*;
pub use models::*;
pub use point_cloud::*;
pub use view::*;
