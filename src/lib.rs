#![forbid(unsafe_code)]
//! Volume change between two scans of the same site.
//!
//! Both scans are loaded with [`voxdiff_io::load`], voxelized on the same
//! lattice with [`voxdiff_volume::estimate`], and summarized in a
//! [`ComparisonResult`], whose serialized form is the tool's JSON output.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

pub use voxdiff_core::PointCloud;
pub use voxdiff_io::IngestionError;
pub use voxdiff_volume::{Estimate, EstimationError, PointBudget};

pub const DEFAULT_VOXEL_SIZE: f64 = 0.05;
pub const DEFAULT_MAX_POINTS: i64 = 2_000_000;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareParams {
    pub voxel_size: f64,
    pub budget: PointBudget,
    /// Seeds the subsampling of both scans; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for CompareParams {
    fn default() -> Self {
        Self {
            voxel_size: DEFAULT_VOXEL_SIZE,
            budget: PointBudget::default(),
            seed: None,
        }
    }
}

impl CompareParams {
    fn rng_for(&self, scan: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(scan)),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    #[serde(rename = "volumeT1M3")]
    pub volume_t1: f64,
    #[serde(rename = "volumeT2M3")]
    pub volume_t2: f64,
    #[serde(rename = "volumeChangeM3")]
    pub volume_change: f64,
    #[serde(rename = "voxelSizeM")]
    pub voxel_size: f64,
    #[serde(rename = "voxelCountT1")]
    pub occupied_cell_count_t1: usize,
    #[serde(rename = "voxelCountT2")]
    pub occupied_cell_count_t2: usize,
    pub sampled_t1: bool,
    pub sampled_t2: bool,
}

impl ComparisonResult {
    /// Assemble the record; the change is always `t2 - t1`.
    pub fn from_estimates(t1: &Estimate, t2: &Estimate, voxel_size: f64) -> Self {
        Self {
            volume_t1: t1.volume_m3,
            volume_t2: t2.volume_m3,
            volume_change: t2.volume_m3 - t1.volume_m3,
            voxel_size,
            occupied_cell_count_t1: t1.occupied_cell_count,
            occupied_cell_count_t2: t2.occupied_cell_count,
            sampled_t1: t1.sampled,
            sampled_t2: t2.sampled,
        }
    }
}

/// Load both scans and compare their occupancy volumes.
///
/// The voxel size is checked before either file is read. The scans are
/// processed one after the other and share nothing but the parameters.
pub fn compare(
    t1: impl AsRef<Path>,
    t2: impl AsRef<Path>,
    params: &CompareParams,
) -> Result<ComparisonResult, CompareError> {
    voxdiff_volume::check_cell_size(params.voxel_size)?;

    let cloud_t1 = voxdiff_io::load(t1)?;
    let cloud_t2 = voxdiff_io::load(t2)?;

    let est_t1 = voxdiff_volume::estimate(&cloud_t1, params.voxel_size, params.budget, &mut params.rng_for(0))?;
    let est_t2 = voxdiff_volume::estimate(&cloud_t2, params.voxel_size, params.budget, &mut params.rng_for(1))?;

    let result = ComparisonResult::from_estimates(&est_t1, &est_t2, params.voxel_size);
    info!(
        volume_t1 = result.volume_t1,
        volume_t2 = result.volume_t2,
        change = result.volume_change,
        "compared scans"
    );
    Ok(result)
}
