//! Camera models.
//!
//! Only the undistorted pinhole model is needed: intrinsics are derived from
//! the field of view reported by the dataset and re-derived after every
//! resize/crop.

mod intrinsics;

pub use intrinsics::*;
