use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};
use voxdiff_core::PointCloud;

use crate::budget::PointBudget;
use crate::voxel::occupied_voxels;

#[derive(Debug, Error, PartialEq)]
pub enum EstimationError {
    #[error("voxel size must be a positive finite number, got {0}")]
    InvalidCellSize(f64),
    #[error("point {point:?} is too far from the origin for a {voxel_size} m voxel grid")]
    OutOfGrid { point: [f64; 3], voxel_size: f64 },
}

/// Occupancy volume of one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub volume_m3: f64,
    pub occupied_cell_count: usize,
    /// Points that went into the grid after the budget was applied.
    pub points_used: usize,
    /// Whether the budget discarded points, making the volume approximate.
    pub sampled: bool,
}

impl Estimate {
    pub const EMPTY: Estimate = Estimate {
        volume_m3: 0.0,
        occupied_cell_count: 0,
        points_used: 0,
        sampled: false,
    };
}

pub fn check_cell_size(cell_size: f64) -> Result<(), EstimationError> {
    if cell_size.is_finite() && cell_size > 0.0 {
        Ok(())
    } else {
        Err(EstimationError::InvalidCellSize(cell_size))
    }
}

/// Estimate occupied volume as `occupied cells * cell_size^3`.
///
/// Clouds larger than `budget` are first reduced to a uniform random subset
/// drawn from `rng`, so budgeted results vary between runs unless the caller
/// seeds the generator. Unbudgeted runs never touch `rng`.
pub fn estimate<R: Rng + ?Sized>(
    cloud: &PointCloud,
    cell_size: f64,
    budget: PointBudget,
    rng: &mut R,
) -> Result<Estimate, EstimationError> {
    check_cell_size(cell_size)?;
    if cloud.is_empty() {
        return Ok(Estimate::EMPTY);
    }

    let sampled = budget.exceeded_by(cloud.len());
    if sampled {
        warn!(
            points = cloud.len(),
            ?budget,
            "scan exceeds point budget, volume is estimated from a random subset"
        );
    }
    let points = budget.apply(cloud, rng);

    let cells = occupied_voxels(&points, cell_size)?;
    let occupied_cell_count = cells.len();
    let volume_m3 = occupied_cell_count as f64 * cell_size.powi(3);

    info!(points = points.len(), cells = occupied_cell_count, volume_m3, "estimated occupancy volume");
    Ok(Estimate {
        volume_m3,
        occupied_cell_count,
        points_used: points.len(),
        sampled,
    })
}
