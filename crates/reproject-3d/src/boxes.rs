use crate::pose::Pose;

/// An oriented 3D bounding box in a single frame's local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBox {
    /// Center of the box.
    pub center: [f64; 3],
    /// Extents of the box as (length, width, height).
    pub size: (f64, f64, f64),
    /// Heading angle in radians around the vertical axis.
    pub yaw: f64,
}

/// Map an oriented box into another frame's coordinates.
///
/// The center goes through the full rigid transform. The yaw is recomputed
/// by rotating the planar heading unit vector `(cos yaw, sin yaw, 0)`
/// through the rotation block and taking the `atan2` of the result; the
/// transform may carry roll/pitch, so the heading cannot simply be offset
/// by a rotation angle. Extents are preserved by rigid transforms and pass
/// through unchanged.
///
/// # Arguments
///
/// * `pose` - The transform from the box's frame into the target frame.
/// * `bbox` - The box to transform.
///
/// # Returns
///
/// A new box in the target frame; the input is never mutated.
pub fn transform_box(pose: &Pose, bbox: &OrientedBox) -> OrientedBox {
    let center = pose.transform_point(&bbox.center);

    let (hy, hx) = bbox.yaw.sin_cos();
    let r = &pose.rotation;
    let dir_x = r[0][0] * hx + r[0][1] * hy;
    let dir_y = r[1][0] * hx + r[1][1] * hy;

    OrientedBox {
        center,
        size: bbox.size,
        yaw: dir_y.atan2(dir_x),
    }
}
