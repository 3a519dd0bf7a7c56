/// KITTI-style box text format.
pub mod kitti;

/// NPY array reader module.
pub mod npy;
