use std::path::Path;

use e57::{CartesianCoordinate, E57Reader};
use tracing::debug;
use voxdiff_core::PointCloud;

use crate::error::DecodeError;

/// Leading bytes of the E57 physical file header.
pub const SIGNATURE: &[u8] = b"ASTM-E57";

const MAX_PREALLOC: usize = 1 << 20;

pub fn has_signature(head: &[u8]) -> bool {
    head.starts_with(SIGNATURE)
}

/// Read the Cartesian coordinates of the first scan in an E57 container.
///
/// The reader applies the scan pose and converts spherical records, so the
/// result is in the container's shared frame. Records without a valid
/// Cartesian position are skipped. A container holding no scans yields
/// [`DecodeError::NoScans`].
pub fn read_e57(path: impl AsRef<Path>) -> Result<PointCloud, DecodeError> {
    let mut reader = E57Reader::from_file(path.as_ref())?;
    let scans = reader.pointclouds();
    let Some(scan) = scans.first() else {
        return Err(DecodeError::NoScans);
    };
    if scans.len() > 1 {
        debug!(scans = scans.len(), "E57 container holds several scans, reading the first");
    }

    let mut cloud = PointCloud::with_capacity((scan.records as usize).min(MAX_PREALLOC));
    let mut skipped = 0usize;
    for point_result in reader.pointcloud_simple(scan)? {
        let point = point_result?;
        match point.cartesian {
            CartesianCoordinate::Valid { x, y, z } => {
                if !cloud.push([x, y, z]) {
                    skipped += 1;
                }
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "skipped E57 records without a usable position");
    }
    Ok(cloud)
}
