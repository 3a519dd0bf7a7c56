/// Return the sorted list of distinct label ids in an integer raster.
///
/// Utility for inspecting panoptic label images; the number of distinct ids
/// is the length of the returned vector. Independent of the reprojection
/// pipeline.
///
/// Example:
///
/// ```
/// use reproject_3d::labels::unique_label_ids;
///
/// let raster = [3, 1, 3, 0, 1];
/// assert_eq!(unique_label_ids(&raster), vec![0, 1, 3]);
/// ```
pub fn unique_label_ids(raster: &[u32]) -> Vec<u32> {
    let mut ids = raster.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
