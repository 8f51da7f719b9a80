use std::path::Path;

use tracing::debug;
use voxdiff_core::PointCloud;

use crate::error::DecodeError;

/// Leading bytes of every LAS and LAZ file.
pub const SIGNATURE: &[u8] = b"LASF";

// Header point counts are untrusted; reserve at most this many up front.
const MAX_PREALLOC: usize = 1 << 20;

pub fn has_signature(head: &[u8]) -> bool {
    head.starts_with(SIGNATURE)
}

/// Read the scaled X/Y/Z of every point in a LAS or LAZ file.
pub fn read_las(path: impl AsRef<Path>) -> Result<PointCloud, DecodeError> {
    let mut reader = las::Reader::from_path(path.as_ref())?;
    let declared = reader.header().number_of_points() as usize;

    let mut cloud = PointCloud::with_capacity(declared.min(MAX_PREALLOC));
    let mut dropped = 0usize;
    for point_result in reader.points() {
        let point = point_result?;
        if !cloud.push([point.x, point.y, point.z]) {
            dropped += 1;
        }
    }

    if dropped > 0 {
        debug!(dropped, "skipped non-finite LAS points");
    }
    Ok(cloud)
}
