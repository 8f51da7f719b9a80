use hashbrown::HashSet;
use voxdiff_core::PointCloud;

use crate::estimate::EstimationError;

/// Integer cell coordinates on a lattice anchored at the world origin.
pub type VoxelKey = (i64, i64, i64);

/// `2^63`, the first quotient an `i64` cannot hold.
const KEY_LIMIT: f64 = 9_223_372_036_854_775_808.0;

fn axis_key(coord: f64, voxel_size: f64) -> Option<i64> {
    let q = (coord / voxel_size).floor();
    (q >= -KEY_LIMIT && q < KEY_LIMIT).then_some(q as i64)
}

/// Cell holding `point`, or `None` when a coordinate is too far from the
/// origin, relative to `voxel_size`, to be indexed without saturating.
pub fn voxel_key(point: [f64; 3], voxel_size: f64) -> Option<VoxelKey> {
    Some((
        axis_key(point[0], voxel_size)?,
        axis_key(point[1], voxel_size)?,
        axis_key(point[2], voxel_size)?,
    ))
}

/// Set of distinct cells holding at least one point.
///
/// Cells are half-open: a point exactly on a boundary belongs to the cell
/// above it. Because the lattice does not depend on the cloud, two scans
/// voxelized with the same size share cell boundaries.
///
/// Fails with [`EstimationError::OutOfGrid`] instead of merging cells when a
/// point lies beyond the indexable lattice.
///
/// # Panics
///
/// Panics if `voxel_size` is not finite and positive.
pub fn occupied_voxels(cloud: &PointCloud, voxel_size: f64) -> Result<HashSet<VoxelKey>, EstimationError> {
    assert!(
        voxel_size.is_finite() && voxel_size > 0.0,
        "voxel_size must be > 0 and finite"
    );

    let mut cells = HashSet::new();
    for p in cloud.iter_points() {
        let key = voxel_key(p, voxel_size).ok_or(EstimationError::OutOfGrid { point: p, voxel_size })?;
        cells.insert(key);
    }
    Ok(cells)
}
