use std::collections::HashMap;

use serde::Serialize;

/// A single point of a globally registered, labeled cloud.
///
/// The stored position is expressed in the last frame of the trajectory;
/// `frame_id` names the frame the point originated from.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPoint {
    /// Position of the point.
    pub position: [f64; 3],
    /// Index of the frame the point was captured in.
    pub frame_id: i64,
    /// Semantic category id.
    pub category: i64,
    /// Instance id within the category.
    pub instance: i64,
}

/// A flat, unordered collection of labeled points.
#[derive(Debug, Clone, Default)]
pub struct LabeledCloud {
    points: Vec<LabeledPoint>,
}

impl LabeledCloud {
    /// Create a labeled cloud from a collection of points.
    pub fn new(points: Vec<LabeledPoint>) -> Self {
        Self { points }
    }

    /// Number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the cloud.
    pub fn points(&self) -> &[LabeledPoint] {
        &self.points
    }

    /// Group point indices by originating frame in a single pass.
    ///
    /// Points whose `frame_id` falls outside `[0, num_frames)` are silently
    /// excluded, matching the behavior of the upstream tooling that produced
    /// the cloud.
    ///
    /// # Returns
    ///
    /// A map from frame index to the indices of the points captured in that
    /// frame. Frames with no points have no entry.
    pub fn group_by_frame(&self, num_frames: usize) -> HashMap<usize, Vec<usize>> {
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (idx, point) in self.points.iter().enumerate() {
            if point.frame_id < 0 || point.frame_id as usize >= num_frames {
                continue;
            }
            groups.entry(point.frame_id as usize).or_default().push(idx);
        }
        groups
    }
}

/// Per-frame output record with parallel arrays, one entry per point
/// assigned to the frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PointBundle {
    /// Point positions in the frame's local coordinates.
    pub xyz: Vec<[f64; 3]>,
    /// Category ids, parallel to `xyz`.
    pub cat: Vec<i64>,
    /// Instance ids, parallel to `xyz`.
    pub inst: Vec<i64>,
}

impl PointBundle {
    /// Create an empty bundle with room for `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xyz: Vec::with_capacity(capacity),
            cat: Vec::with_capacity(capacity),
            inst: Vec::with_capacity(capacity),
        }
    }

    /// Number of points in the bundle.
    #[inline]
    pub fn len(&self) -> usize {
        self.xyz.len()
    }

    /// Check if the bundle is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xyz.is_empty()
    }
}
