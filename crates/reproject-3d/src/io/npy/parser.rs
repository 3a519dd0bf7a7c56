use std::io::Read;
use std::path::Path;

use super::NpyError;
use crate::pointcloud::{LabeledCloud, LabeledPoint};
use crate::pose::{Pose, PoseStore};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const MAX_ELEMENTS: usize = 500_000_000;

/// A dense multi-dimensional array read from an NPY file, flattened in
/// row-major (C) order.
#[derive(Debug, Clone)]
pub struct NpyArray {
    /// The elements, row major.
    pub data: Vec<f64>,
    /// The shape of the array.
    pub shape: Vec<usize>,
}

/// Extract the value following `'key':` in the NPY header dict.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let needle = format!("'{}'", key);
    let idx = header.find(&needle).ok_or(NpyError::MalformedHeader)?;
    let rest = &header[idx + needle.len()..];
    let colon = rest.find(':').ok_or(NpyError::MalformedHeader)?;
    Ok(rest[colon + 1..].trim_start())
}

fn parse_descr(header: &str) -> Result<String, NpyError> {
    let value = header_value(header, "descr")?;
    let rest = value.strip_prefix('\'').ok_or(NpyError::MalformedHeader)?;
    let end = rest.find('\'').ok_or(NpyError::MalformedHeader)?;
    Ok(rest[..end].to_string())
}

fn parse_fortran_order(header: &str) -> Result<bool, NpyError> {
    let value = header_value(header, "fortran_order")?;
    if value.starts_with("False") {
        Ok(false)
    } else if value.starts_with("True") {
        Ok(true)
    } else {
        Err(NpyError::MalformedHeader)
    }
}

fn parse_shape(header: &str) -> Result<Vec<usize>, NpyError> {
    let value = header_value(header, "shape")?;
    let rest = value.strip_prefix('(').ok_or(NpyError::MalformedHeader)?;
    let end = rest.find(')').ok_or(NpyError::MalformedHeader)?;
    rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| NpyError::MalformedHeader))
        .collect()
}

/// Read an NPY array from a reader.
///
/// Supports version 1.0 and 2.0 headers with little-endian `f8` or `f4`
/// elements in C order; everything else is rejected.
pub fn read_npy_from<R: Read>(reader: &mut R) -> Result<NpyArray, NpyError> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(NpyError::MalformedHeader);
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        _ => return Err(NpyError::MalformedHeader),
    };

    let mut header_bytes = vec![0u8; header_len];
    reader.read_exact(&mut header_bytes)?;
    let header = std::str::from_utf8(&header_bytes).map_err(|_| NpyError::MalformedHeader)?;

    let descr = parse_descr(header)?;
    if parse_fortran_order(header)? {
        return Err(NpyError::FortranOrder);
    }
    let shape = parse_shape(header)?;

    let item_size = match descr.as_str() {
        "<f8" => 8,
        "<f4" => 4,
        _ => return Err(NpyError::UnsupportedDtype(descr)),
    };

    let num_elements = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or(NpyError::MalformedHeader)?;
    if num_elements > MAX_ELEMENTS {
        return Err(NpyError::MalformedHeader);
    }

    let mut payload = vec![0u8; num_elements * item_size];
    reader.read_exact(&mut payload)?;

    let data = match item_size {
        8 => payload
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                f64::from_le_bytes(bytes)
            })
            .collect(),
        _ => payload
            .chunks_exact(4)
            .map(|chunk| {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(chunk);
                f32::from_le_bytes(bytes) as f64
            })
            .collect(),
    };

    Ok(NpyArray { data, shape })
}

/// Read an NPY file into a flat f64 array plus its shape.
///
/// # Arguments
///
/// * `path` - The path to the `.npy` file.
pub fn read_npy_f64(path: impl AsRef<Path>) -> Result<NpyArray, NpyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_npy_from(&mut reader)
}

/// Read a trajectory of rigid poses from an NPY file of shape `[F, 4, 4]`.
///
/// Each 4x4 slice is a row-major homogeneous matrix; the bottom row of every
/// pose is validated at this load boundary.
pub fn read_poses(path: impl AsRef<Path>) -> Result<PoseStore, NpyError> {
    let array = read_npy_f64(path)?;
    if array.shape.len() != 3 || array.shape[1] != 4 || array.shape[2] != 4 {
        return Err(NpyError::ShapeMismatch {
            expected: "[F, 4, 4]",
            got: array.shape,
        });
    }

    let mut poses = Vec::with_capacity(array.shape[0]);
    for slice in array.data.chunks_exact(16) {
        let mut matrix = [[0.0; 4]; 4];
        for (row, values) in matrix.iter_mut().zip(slice.chunks_exact(4)) {
            row.copy_from_slice(values);
        }
        poses.push(Pose::from_matrix(&matrix)?);
    }

    Ok(PoseStore::new(poses))
}

/// Read a globally registered labeled cloud from an NPY file of shape
/// `[N, 9]`.
///
/// Columns 0-2 are the position, column 6 the originating frame id, column 7
/// the category, and column 8 the instance. Columns 3-5 are not consumed.
pub fn read_labeled_cloud(path: impl AsRef<Path>) -> Result<LabeledCloud, NpyError> {
    let array = read_npy_f64(path)?;
    if array.shape.len() != 2 || array.shape[1] != 9 {
        return Err(NpyError::ShapeMismatch {
            expected: "[N, 9]",
            got: array.shape,
        });
    }

    let points = array
        .data
        .chunks_exact(9)
        .map(|row| LabeledPoint {
            position: [row[0], row[1], row[2]],
            frame_id: row[6] as i64,
            category: row[7] as i64,
            instance: row[8] as i64,
        })
        .collect();

    Ok(LabeledCloud::new(points))
}
