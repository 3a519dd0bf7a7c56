use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use crate::boxes::{transform_box, OrientedBox};
use crate::io::kitti::{self, KittiError};
use crate::io::npy::{self, NpyError};
use crate::pointcloud::{LabeledCloud, PointBundle};
use crate::pose::{transform_points, PoseError, PoseStore};

/// Directory for per-frame box files, relative to the project directory.
pub const BOXES_DIR: &str = "DDD_boxes";

/// Directory for per-frame point bundles, relative to the project directory.
pub const POINTS_DIR: &str = "pointcloud_segmentation_revised";

const ODOMETRY_DIR: &str = "lidar_odometry";
const POSES_FILE: &str = "lidar_poses.npy";
const BOXES_FILE: &str = "000000.txt";
const CLOUD_FILE: &str = "global_map_with_meta.npy";

/// Error types for the reprojection pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ReprojectError {
    /// A required input file is absent
    #[error("missing input file: {0}")]
    MissingInput(PathBuf),

    /// The pose sequence has no frames
    #[error("pose sequence is empty")]
    EmptyTrajectory,

    /// Transform composition failed
    #[error(transparent)]
    Pose(#[from] PoseError),

    /// Failed to read an NPY input
    #[error(transparent)]
    Npy(#[from] NpyError),

    /// Failed to read or write a box file
    #[error(transparent)]
    BoxIo(#[from] KittiError),

    /// Failed to write a point bundle
    #[error("Failed to write point bundle")]
    BundleIo(#[from] std::io::Error),

    /// Failed to serialize a point bundle
    #[error("Failed to serialize point bundle")]
    BundleSerialize(#[from] serde_json::Error),
}

/// Destination for per-frame outputs.
///
/// The pipeline only talks to this trait, so tests can collect outputs in
/// memory instead of touching the filesystem.
pub trait OutputSink {
    /// Write the box set of frame `frame`.
    fn write_box_file(&mut self, frame: usize, boxes: &[OrientedBox]) -> Result<(), ReprojectError>;

    /// Write the point bundle of frame `frame`.
    fn write_point_bundle(
        &mut self,
        frame: usize,
        bundle: &PointBundle,
    ) -> Result<(), ReprojectError>;
}

/// Filesystem sink writing one file per frame under two output directories.
///
/// Box files are named `frame_{:06}.txt`, point bundles `frame_{:03}.json`.
/// Pre-existing files of the same name are overwritten.
#[derive(Debug)]
pub struct DirectorySink {
    boxes_dir: PathBuf,
    points_dir: PathBuf,
}

impl DirectorySink {
    /// Create both output directories under `base` and return the sink.
    pub fn create(base: impl AsRef<Path>) -> Result<Self, ReprojectError> {
        let boxes_dir = base.as_ref().join(BOXES_DIR);
        let points_dir = base.as_ref().join(POINTS_DIR);
        std::fs::create_dir_all(&boxes_dir)?;
        std::fs::create_dir_all(&points_dir)?;
        Ok(Self {
            boxes_dir,
            points_dir,
        })
    }

    /// Directory holding the per-frame box files.
    pub fn boxes_dir(&self) -> &Path {
        &self.boxes_dir
    }

    /// Directory holding the per-frame point bundles.
    pub fn points_dir(&self) -> &Path {
        &self.points_dir
    }
}

impl OutputSink for DirectorySink {
    fn write_box_file(&mut self, frame: usize, boxes: &[OrientedBox]) -> Result<(), ReprojectError> {
        let path = self.boxes_dir.join(format!("frame_{:06}.txt", frame));
        kitti::write_boxes(path, boxes)?;
        Ok(())
    }

    fn write_point_bundle(
        &mut self,
        frame: usize,
        bundle: &PointBundle,
    ) -> Result<(), ReprojectError> {
        let path = self.points_dir.join(format!("frame_{:03}.json", frame));
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, bundle)?;
        Ok(())
    }
}

/// Reproject a last-frame box set into every frame of the trajectory.
///
/// For every frame `i` the transform `relative(i, F-1)` is applied to every
/// box; box order within each frame's output matches the input order.
///
/// # Returns
///
/// One box set per frame, indexed by frame number.
pub fn reproject_boxes(
    poses: &PoseStore,
    boxes_last: &[OrientedBox],
) -> Result<Vec<Vec<OrientedBox>>, PoseError> {
    if poses.is_empty() {
        return Ok(Vec::new());
    }

    let last = poses.len() - 1;
    let mut per_frame = Vec::with_capacity(poses.len());
    for i in 0..poses.len() {
        let rel = poses.relative(i, last)?;
        per_frame.push(
            boxes_last
                .iter()
                .map(|bbox| transform_box(&rel, bbox))
                .collect(),
        );
    }
    Ok(per_frame)
}

/// Reproject a globally registered labeled cloud into per-frame bundles and
/// hand them to the sink.
///
/// Points are grouped by originating frame in a single pass; frames with no
/// points produce no bundle. Category and instance labels pass through
/// unchanged, only geometry is transformed.
pub fn reproject_cloud(
    poses: &PoseStore,
    cloud: &LabeledCloud,
    sink: &mut impl OutputSink,
) -> Result<usize, ReprojectError> {
    if poses.is_empty() {
        return Ok(0);
    }

    let groups = cloud.group_by_frame(poses.len());

    let grouped = groups.values().map(Vec::len).sum::<usize>();
    if grouped < cloud.len() {
        log::warn!(
            "dropped {} points with frame ids outside [0, {})",
            cloud.len() - grouped,
            poses.len()
        );
    }

    let last = poses.len() - 1;
    let mut emitted = 0;
    for i in 0..poses.len() {
        let Some(indices) = groups.get(&i) else {
            continue;
        };

        let points = cloud.points();
        let src = indices
            .iter()
            .map(|&idx| points[idx].position)
            .collect::<Vec<_>>();

        let rel = poses.relative(i, last)?;
        let mut bundle = PointBundle::with_capacity(indices.len());
        bundle.xyz.resize(src.len(), [0.0; 3]);
        transform_points(&src, &rel, &mut bundle.xyz);
        for &idx in indices {
            bundle.cat.push(points[idx].category);
            bundle.inst.push(points[idx].instance);
        }

        log::debug!("frame {}: {} points", i, bundle.len());
        sink.write_point_bundle(i, &bundle)?;
        emitted += 1;
    }

    Ok(emitted)
}

/// Run the full reprojection over an arbitrary sink.
///
/// Writes one box file per frame and one point bundle per non-empty frame.
///
/// # Returns
///
/// The number of frames in the trajectory.
pub fn run_reprojection(
    poses: &PoseStore,
    boxes_last: &[OrientedBox],
    cloud: &LabeledCloud,
    sink: &mut impl OutputSink,
) -> Result<usize, ReprojectError> {
    if poses.is_empty() {
        return Err(ReprojectError::EmptyTrajectory);
    }

    for (i, boxes) in reproject_boxes(poses, boxes_last)?.iter().enumerate() {
        sink.write_box_file(i, boxes)?;
    }

    let emitted = reproject_cloud(poses, cloud, sink)?;
    log::info!(
        "reprojected {} boxes and {} points over {} frames ({} non-empty)",
        boxes_last.len(),
        cloud.len(),
        poses.len(),
        emitted
    );

    Ok(poses.len())
}

/// Summary of a completed run, reporting output locations and frame count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReprojectSummary {
    /// Directory the per-frame box files were written to.
    pub boxes_dir: PathBuf,
    /// Directory the per-frame point bundles were written to.
    pub points_dir: PathBuf,
    /// Number of frames in the trajectory.
    pub frames: usize,
}

fn require_input(path: PathBuf) -> Result<PathBuf, ReprojectError> {
    if !path.is_file() {
        return Err(ReprojectError::MissingInput(path));
    }
    Ok(path)
}

/// Load the standard inputs of a project directory and run the full
/// reprojection into it.
///
/// Expects `lidar_odometry/lidar_poses.npy` (shape `[F, 4, 4]`),
/// `lidar_odometry/000000.txt` (last-frame boxes), and
/// `lidar_odometry/global_map_with_meta.npy` (shape `[N, 9]`) under
/// `project_path`. Outputs land in [`BOXES_DIR`] and [`POINTS_DIR`].
///
/// Any fatal condition aborts the whole run; partial frame output is not
/// guaranteed consistent.
pub fn run_project_dir(project_path: impl AsRef<Path>) -> Result<ReprojectSummary, ReprojectError> {
    let base = project_path.as_ref();
    let odometry = base.join(ODOMETRY_DIR);

    let poses_path = require_input(odometry.join(POSES_FILE))?;
    let boxes_path = require_input(odometry.join(BOXES_FILE))?;
    let cloud_path = require_input(odometry.join(CLOUD_FILE))?;

    let poses = npy::read_poses(poses_path)?;
    let boxes_last = kitti::read_boxes(boxes_path)?;
    let cloud = npy::read_labeled_cloud(cloud_path)?;

    let mut sink = DirectorySink::create(base)?;
    let frames = run_reprojection(&poses, &boxes_last, &cloud, &mut sink)?;

    Ok(ReprojectSummary {
        boxes_dir: sink.boxes_dir,
        points_dir: sink.points_dir,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::LabeledPoint;
    use crate::pose::{translation, yaw_rotation, Pose};
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySink {
        boxes: Vec<(usize, Vec<OrientedBox>)>,
        bundles: HashMap<usize, PointBundle>,
    }

    impl OutputSink for MemorySink {
        fn write_box_file(
            &mut self,
            frame: usize,
            boxes: &[OrientedBox],
        ) -> Result<(), ReprojectError> {
            self.boxes.push((frame, boxes.to_vec()));
            Ok(())
        }

        fn write_point_bundle(
            &mut self,
            frame: usize,
            bundle: &PointBundle,
        ) -> Result<(), ReprojectError> {
            self.bundles.insert(frame, bundle.clone());
            Ok(())
        }
    }

    fn three_translated_frames() -> PoseStore {
        PoseStore::new(vec![
            Pose::identity(),
            translation([1.0, 0.0, 0.0]),
            translation([2.0, 0.0, 0.0]),
        ])
    }

    #[test]
    fn test_box_translate_scenario() -> Result<(), ReprojectError> {
        let poses = three_translated_frames();
        let boxes_last = vec![OrientedBox {
            center: [5.0, 0.0, 0.0],
            size: (4.0, 2.0, 1.0),
            yaw: 0.0,
        }];

        let per_frame = reproject_boxes(&poses, &boxes_last)?;
        assert_eq!(per_frame.len(), 3);

        // relative(0, 2) is translate(2, 0, 0)
        let in_frame0 = &per_frame[0][0];
        assert_relative_eq!(in_frame0.center[0], 7.0, epsilon = 1e-12);
        assert_relative_eq!(in_frame0.center[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(in_frame0.yaw, 0.0, epsilon = 1e-12);
        assert_eq!(in_frame0.size, (4.0, 2.0, 1.0));

        // last frame maps onto itself
        let in_frame2 = &per_frame[2][0];
        assert_relative_eq!(in_frame2.center[0], 5.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_box_yaw_relative_to_last_frame() -> Result<(), ReprojectError> {
        let theta = 0.4;
        let poses = PoseStore::new(vec![yaw_rotation(theta), Pose::identity()]);
        let boxes_last = vec![OrientedBox {
            center: [1.0, 0.0, 0.0],
            size: (1.0, 1.0, 1.0),
            yaw: 0.9,
        }];

        let per_frame = reproject_boxes(&poses, &boxes_last)?;
        // frame 0 is yawed by theta relative to the last frame, so the box
        // heading loses theta when expressed in frame 0
        assert_relative_eq!(per_frame[0][0].yaw, 0.9 - theta, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_box_order_preserved() -> Result<(), ReprojectError> {
        let poses = three_translated_frames();
        let boxes_last = vec![
            OrientedBox {
                center: [1.0, 0.0, 0.0],
                size: (1.0, 1.0, 1.0),
                yaw: 0.1,
            },
            OrientedBox {
                center: [2.0, 0.0, 0.0],
                size: (2.0, 2.0, 2.0),
                yaw: 0.2,
            },
        ];

        let per_frame = reproject_boxes(&poses, &boxes_last)?;
        for boxes in &per_frame {
            assert_eq!(boxes.len(), 2);
            assert_relative_eq!(boxes[0].yaw, 0.1);
            assert_relative_eq!(boxes[1].yaw, 0.2);
        }
        Ok(())
    }

    fn labeled(position: [f64; 3], frame_id: i64, category: i64, instance: i64) -> LabeledPoint {
        LabeledPoint {
            position,
            frame_id,
            category,
            instance,
        }
    }

    #[test]
    fn test_cloud_empty_frame_skipped() -> Result<(), ReprojectError> {
        let poses = three_translated_frames();
        let cloud = LabeledCloud::new(vec![
            labeled([0.0, 0.0, 0.0], 0, 1, 1),
            labeled([1.0, 1.0, 1.0], 2, 2, 2),
        ]);

        let mut sink = MemorySink::default();
        let emitted = reproject_cloud(&poses, &cloud, &mut sink)?;
        assert_eq!(emitted, 2);
        assert!(sink.bundles.contains_key(&0));
        assert!(!sink.bundles.contains_key(&1));
        assert!(sink.bundles.contains_key(&2));
        Ok(())
    }

    #[test]
    fn test_cloud_labels_invariant() -> Result<(), ReprojectError> {
        let poses = three_translated_frames();
        let cloud = LabeledCloud::new(vec![
            labeled([3.0, 1.0, 0.5], 1, 11, 4),
            labeled([0.0, -1.0, 2.0], 1, 12, 5),
        ]);

        let mut sink = MemorySink::default();
        reproject_cloud(&poses, &cloud, &mut sink)?;

        let bundle = &sink.bundles[&1];
        assert_eq!(bundle.cat, vec![11, 12]);
        assert_eq!(bundle.inst, vec![4, 5]);
        // relative(1, 2) is translate(1, 0, 0)
        assert_relative_eq!(bundle.xyz[0][0], 4.0, epsilon = 1e-12);
        assert_relative_eq!(bundle.xyz[1][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(bundle.xyz[1][1], -1.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_cloud_last_frame_roundtrip_identity() -> Result<(), ReprojectError> {
        let poses = three_translated_frames();
        let cloud = LabeledCloud::new(vec![labeled([7.0, -3.0, 0.25], 2, 1, 1)]);

        let mut sink = MemorySink::default();
        reproject_cloud(&poses, &cloud, &mut sink)?;

        let bundle = &sink.bundles[&2];
        for k in 0..3 {
            assert_relative_eq!(bundle.xyz[0][k], cloud.points()[0].position[k], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn test_run_emits_box_file_per_frame() -> Result<(), ReprojectError> {
        let poses = three_translated_frames();
        let cloud = LabeledCloud::new(vec![labeled([0.0, 0.0, 0.0], 7, 0, 0)]);

        let mut sink = MemorySink::default();
        let frames = run_reprojection(&poses, &[], &cloud, &mut sink)?;
        assert_eq!(frames, 3);
        assert_eq!(sink.boxes.len(), 3);
        // the only point carries an out-of-range frame id and is dropped
        assert!(sink.bundles.is_empty());
        Ok(())
    }

    #[test]
    fn test_run_rejects_empty_trajectory() {
        let poses = PoseStore::new(vec![]);
        let mut sink = MemorySink::default();
        assert!(matches!(
            run_reprojection(&poses, &[], &LabeledCloud::default(), &mut sink),
            Err(ReprojectError::EmptyTrajectory)
        ));
    }

    #[test]
    fn test_run_project_dir_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            run_project_dir(dir.path()),
            Err(ReprojectError::MissingInput(_))
        ));
    }
}
