#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Oriented 3D bounding boxes.
pub mod boxes;

/// I/O utilities for poses, clouds, and box files.
pub mod io;

/// Label raster utilities.
pub mod labels;

/// Labeled point cloud containers.
pub mod pointcloud;

/// Rigid poses and transform composition.
pub mod pose;

/// Per-frame reprojection pipeline.
pub mod reproject;
