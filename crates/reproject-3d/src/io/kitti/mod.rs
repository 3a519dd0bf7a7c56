use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use crate::boxes::OrientedBox;

/// Label written for every box; source boxes carry no category.
pub const UNCLASSIFIED_LABEL: &str = "Unknown";

/// Error types for the KITTI-style box text format.
#[derive(Debug, thiserror::Error)]
pub enum KittiError {
    /// Error reading or writing file
    #[error("error reading or writing box file")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),
}

fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, KittiError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| KittiError::ParseError(format!("{}: {}", s, e)))
}

/// Read oriented boxes from a whitespace-separated text file.
///
/// One box per line, columns `label x y z l w h yaw`. Lines with fewer than
/// 8 tokens are skipped; the label token is ignored.
///
/// # Arguments
///
/// * `path` - The path to the box file.
///
/// # Returns
///
/// The boxes, in file order.
pub fn read_boxes(path: impl AsRef<Path>) -> Result<Vec<OrientedBox>, KittiError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut boxes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let parts = line.split_whitespace().collect::<Vec<_>>();
        if parts.len() < 8 {
            continue;
        }
        boxes.push(OrientedBox {
            center: [
                parse_part(parts[1])?,
                parse_part(parts[2])?,
                parse_part(parts[3])?,
            ],
            size: (
                parse_part(parts[4])?,
                parse_part(parts[5])?,
                parse_part(parts[6])?,
            ),
            yaw: parse_part(parts[7])?,
        });
    }

    Ok(boxes)
}

/// Write oriented boxes to a text file, one box per line.
///
/// Geometry columns are written with 3 decimals and the yaw with 6, matching
/// the layout read by [`read_boxes`]. An existing file is overwritten.
pub fn write_boxes(path: impl AsRef<Path>, boxes: &[OrientedBox]) -> Result<(), KittiError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for bbox in boxes {
        let [x, y, z] = bbox.center;
        let (l, w, h) = bbox.size;
        writeln!(
            writer,
            "{UNCLASSIFIED_LABEL} {x:.3} {y:.3} {z:.3} {l:.3} {w:.3} {h:.3} {:.6}",
            bbox.yaw
        )?;
    }
    Ok(())
}
