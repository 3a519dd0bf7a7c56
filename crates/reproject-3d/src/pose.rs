/// Error types for rigid transform operations.
#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    /// The rotation block of a pose is not invertible
    #[error("rotation block is singular (det = {0})")]
    SingularRotation(f64),

    /// The bottom row of a 4x4 pose matrix is not [0, 0, 0, 1]
    #[error("pose matrix bottom row is not homogeneous")]
    NotHomogeneous,

    /// A frame index is out of bounds of the pose sequence
    #[error("frame index {0} out of bounds for {1} poses")]
    FrameOutOfBounds(usize, usize),
}

const DET_EPSILON: f64 = 1e-12;
const HOMOGENEOUS_EPSILON: f64 = 1e-9;

/// A rigid transform (rotation + translation) placing one 3D coordinate
/// frame inside another.
///
/// Equivalent to a 4x4 homogeneous matrix with an implicit [0, 0, 0, 1]
/// bottom row. The rotation block is expected to be orthonormal; this is
/// only enforced up to invertibility when the pose is inverted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Rotation block, row major.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Pose {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Build a pose from a row-major 4x4 homogeneous matrix.
    ///
    /// # Arguments
    ///
    /// * `matrix` - A row-major 4x4 matrix whose bottom row must be
    ///   [0, 0, 0, 1].
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::NotHomogeneous`] if the bottom row deviates from
    /// [0, 0, 0, 1].
    pub fn from_matrix(matrix: &[[f64; 4]; 4]) -> Result<Self, PoseError> {
        let bottom = matrix[3];
        let expected = [0.0, 0.0, 0.0, 1.0];
        for (got, want) in bottom.iter().zip(expected.iter()) {
            if (got - want).abs() > HOMOGENEOUS_EPSILON {
                return Err(PoseError::NotHomogeneous);
            }
        }

        let mut rotation = [[0.0; 3]; 3];
        for (row, mat_row) in rotation.iter_mut().zip(matrix.iter()) {
            row.copy_from_slice(&mat_row[..3]);
        }

        Ok(Self {
            rotation,
            translation: [matrix[0][3], matrix[1][3], matrix[2][3]],
        })
    }

    /// Determinant of the rotation block.
    pub fn rotation_det(&self) -> f64 {
        let r = &self.rotation;
        r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
    }

    /// Inverse of the rigid transform.
    ///
    /// Uses the rigid-body form `R' = R^T`, `t' = -R^T t`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::SingularRotation`] if the rotation block is not
    /// invertible. This never happens for valid rotations and indicates
    /// corrupt input poses.
    pub fn invert(&self) -> Result<Pose, PoseError> {
        let det = self.rotation_det();
        if det.abs() < DET_EPSILON {
            return Err(PoseError::SingularRotation(det));
        }

        let r = &self.rotation;
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = r[j][i];
            }
        }

        let t = &self.translation;
        let mut translation = [0.0; 3];
        for (i, val) in translation.iter_mut().enumerate() {
            *val = -(rotation[i][0] * t[0] + rotation[i][1] * t[1] + rotation[i][2] * t[2]);
        }

        Ok(Pose {
            rotation,
            translation,
        })
    }

    /// Compose two rigid transforms as the matrix product `self * other`.
    pub fn compose(&self, other: &Pose) -> Pose {
        let a = &self.rotation;
        let b = &other.rotation;

        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }

        let ot = &other.translation;
        let mut translation = [0.0; 3];
        for (i, val) in translation.iter_mut().enumerate() {
            *val = a[i][0] * ot[0] + a[i][1] * ot[1] + a[i][2] * ot[2] + self.translation[i];
        }

        Pose {
            rotation,
            translation,
        }
    }

    /// Apply the transform to a single 3D point.
    ///
    /// Equivalent to lifting the point to homogeneous form, multiplying by
    /// the 4x4 matrix, and dropping the homogeneous component.
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        let mut out = [0.0; 3];
        for (i, val) in out.iter_mut().enumerate() {
            *val = r[i][0] * point[0] + r[i][1] * point[1] + r[i][2] * point[2] + t[i];
        }
        out
    }
}

/// An immutable, ordered sequence of sensor poses indexed by frame number.
#[derive(Debug, Clone)]
pub struct PoseStore {
    poses: Vec<Pose>,
}

impl PoseStore {
    /// Create a pose store from an ordered sequence of poses.
    pub fn new(poses: Vec<Pose>) -> Self {
        Self { poses }
    }

    /// Number of frames in the trajectory.
    #[inline]
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Check if the trajectory is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Get the pose of frame `i`, if it exists.
    pub fn get(&self, i: usize) -> Option<&Pose> {
        self.poses.get(i)
    }

    /// Get the pose of the last frame, if any.
    pub fn last(&self) -> Option<&Pose> {
        self.poses.last()
    }

    /// Transform mapping frame-`j`-local coordinates into frame-`i`-local
    /// coordinates, computed as `invert(poses[i]) * poses[j]`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::FrameOutOfBounds`] if either index is outside
    /// the trajectory, or [`PoseError::SingularRotation`] if the pose of
    /// frame `i` cannot be inverted.
    pub fn relative(&self, i: usize, j: usize) -> Result<Pose, PoseError> {
        let pose_i = self
            .poses
            .get(i)
            .ok_or(PoseError::FrameOutOfBounds(i, self.poses.len()))?;
        let pose_j = self
            .poses
            .get(j)
            .ok_or(PoseError::FrameOutOfBounds(j, self.poses.len()))?;
        Ok(pose_i.invert()?.compose(pose_j))
    }
}

/// Transform a set of points by a rigid pose.
///
/// # Arguments
///
/// * `src_points` - The points to be transformed.
/// * `pose` - The rigid transform to apply.
/// * `dst_points` - A pre-allocated slice to store the transformed points.
///
/// PRECONDITION: dst_points has the same length as src_points.
///
/// Example:
///
/// ```
/// use reproject_3d::pose::{transform_points, Pose};
///
/// let src_points = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &Pose::identity(), &mut dst_points);
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points(src_points: &[[f64; 3]], pose: &Pose, dst_points: &mut [[f64; 3]]) {
    assert_eq!(src_points.len(), dst_points.len());

    // view of the rotation block
    let rotation = {
        let rotation_slice =
            unsafe { std::slice::from_raw_parts(pose.rotation.as_ptr() as *const f64, 9) };
        faer::mat::from_row_major_slice(rotation_slice, 3, 3)
    };

    // view of the source points as an Nx3 matrix
    let points_in_src = {
        let src_points_slice = unsafe {
            std::slice::from_raw_parts(src_points.as_ptr() as *const f64, src_points.len() * 3)
        };
        faer::mat::from_row_major_slice(src_points_slice, src_points.len(), 3)
    };

    // mutable view of the destination points as a 3xN matrix
    let mut points_in_dst = {
        let dst_points_slice = unsafe {
            std::slice::from_raw_parts_mut(
                dst_points.as_mut_ptr() as *mut f64,
                dst_points.len() * 3,
            )
        };
        faer::mat::from_column_major_slice_mut(dst_points_slice, 3, dst_points.len())
    };

    faer::linalg::matmul::matmul(
        &mut points_in_dst,
        rotation,
        points_in_src.transpose(),
        None,
        1.0,
        faer::Parallelism::None,
    );

    let [tx, ty, tz] = pose.translation;

    // SAFETY: each column of points_in_dst is a 3-vector, indices 0..3 are
    // in bounds
    for mut col in points_in_dst.col_iter_mut() {
        unsafe {
            col.write_unchecked(0, col.read_unchecked(0) + tx);
            col.write_unchecked(1, col.read_unchecked(1) + ty);
            col.write_unchecked(2, col.read_unchecked(2) + tz);
        }
    }
}

/// Rotation of `angle` radians around the vertical (z) axis as a pose.
pub fn yaw_rotation(angle: f64) -> Pose {
    let (s, c) = angle.sin_cos();
    Pose {
        rotation: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        translation: [0.0, 0.0, 0.0],
    }
}

/// Pure translation as a pose.
pub fn translation(t: [f64; 3]) -> Pose {
    Pose {
        rotation: Pose::identity().rotation,
        translation: t,
    }
}
