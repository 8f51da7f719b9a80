#![forbid(unsafe_code)]

pub mod budget;
pub mod estimate;
pub mod voxel;

pub use budget::PointBudget;
pub use estimate::{check_cell_size, estimate, Estimate, EstimationError};
pub use voxel::{occupied_voxels, VoxelKey};
