//! Point-cloud file I/O.
//!
//! Supports the PLY (Polygon File Format) vertex layout used for fused
//! priors: `x y z` positions with optional `red green blue` colors, in
//! either ASCII or binary little-endian encoding.
//!
//! Files are persisted atomically: data is written to a temporary file next
//! to the destination and renamed into place only after a successful flush,
//! so a failed write never leaves a truncated artifact behind.

mod error;
mod persist;
mod ply;

pub use error::{PlyError, Result};
pub use persist::{load_ply, save_ply_atomic};
pub use ply::{PlyEncoding, read_ply, write_ply};
