//! Additional math helpers layered on top of `glam`.

use glam::{Mat3, Quat, Vec3};

/// Normalizes `v` and returns it together with its original length.
///
/// Zero vectors come back as `(Vec3::ZERO, 0.0)` instead of NaNs.
pub fn normalize_with_length(v: Vec3) -> (Vec3, f32) {
    let length = v.length();
    if length > 0.0 {
        (v / length, length)
    } else {
        (Vec3::ZERO, 0.0)
    }
}

/// Component-wise reciprocal that maps zero components to `sqrt(f32::MAX)`.
///
/// The large-but-finite value keeps slab tests free of infinities while still
/// dominating any realistic ray length.
pub fn safe_reciprocal(v: Vec3) -> Vec3 {
    let big = f32::MAX.sqrt();
    let rcp = |x: f32| if x == 0.0 { big } else { 1.0 / x };
    Vec3::new(rcp(v.x), rcp(v.y), rcp(v.z))
}

/// Shortest rotation taking unit vector `from` onto unit vector `to`.
pub fn from_to_rotation(from: Vec3, to: Vec3) -> Quat {
    let (from, from_len) = normalize_with_length(from);
    let (to, to_len) = normalize_with_length(to);
    if from_len == 0.0 || to_len == 0.0 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from, to)
}

/// Number of bits required to address `count` sub-keys.
pub fn bits_for_count(count: u32) -> u32 {
    32 - count.leading_zeros()
}

/// Builds an orthonormal basis whose third axis is `normal`.
pub fn basis_from_normal(normal: Vec3) -> (Vec3, Vec3) {
    normal.any_orthonormal_pair()
}

/// Diagonalizes a symmetric 3x3 matrix with cyclic Jacobi rotations.
///
/// Returns the rotation whose columns are the eigenvectors and the matching
/// eigenvalues.
pub fn diagonalize_symmetric(m: Mat3) -> (Quat, Vec3) {
    let mut a = m.to_cols_array_2d();
    let mut v = Mat3::IDENTITY.to_cols_array_2d();

    for _ in 0..24 {
        let off = a[0][1].abs() + a[0][2].abs() + a[1][2].abs();
        if off < 1e-9 {
            break;
        }
        for (p, q) in [(0usize, 1usize), (0, 2), (1, 2)] {
            if a[p][q].abs() < 1e-12 {
                continue;
            }
            let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
            let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
            let c = 1.0 / (t * t + 1.0).sqrt();
            let s = t * c;

            for k in 0..3 {
                let akp = a[k][p];
                let akq = a[k][q];
                a[k][p] = c * akp - s * akq;
                a[k][q] = s * akp + c * akq;
            }
            for k in 0..3 {
                let apk = a[p][k];
                let aqk = a[q][k];
                a[p][k] = c * apk - s * aqk;
                a[q][k] = s * apk + c * aqk;
            }
            for row in v.iter_mut() {
                let vp = row[p];
                let vq = row[q];
                row[p] = c * vp - s * vq;
                row[q] = s * vp + c * vq;
            }
        }
    }

    let mut basis = Mat3::from_cols_array_2d(&v).transpose();
    if basis.determinant() < 0.0 {
        basis.z_axis = -basis.z_axis;
    }
    (
        Quat::from_mat3(&basis).normalize(),
        Vec3::new(a[0][0], a[1][1], a[2][2]),
    )
}
