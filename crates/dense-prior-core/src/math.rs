use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Vector2, Vector3};

/// Scalar type used for geometry (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Build a rigid transform from a 4×4 homogeneous matrix.
///
/// The rotation block is re-orthonormalized through a quaternion, so small
/// numerical drift in the input is tolerated. Returns `None` if the bottom
/// row is not `[0, 0, 0, 1]`.
pub fn iso3_from_matrix(m: &Mat4) -> Option<Iso3> {
    let bottom = m.fixed_view::<1, 4>(3, 0);
    if bottom[(0, 0)].abs() > 1e-9
        || bottom[(0, 1)].abs() > 1e-9
        || bottom[(0, 2)].abs() > 1e-9
        || (bottom[(0, 3)] - 1.0).abs() > 1e-9
    {
        return None;
    }
    let r = Mat3::from(m.fixed_view::<3, 3>(0, 0));
    let t = Vec3::from(m.fixed_view::<3, 1>(0, 3));
    let rotation = nalgebra::UnitQuaternion::from_matrix(&r);
    Some(Iso3::from_parts(t.into(), rotation))
}
