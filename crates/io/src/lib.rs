#![forbid(unsafe_code)]

pub mod e57;
pub mod error;
pub mod format;
pub mod las;
pub mod loader;
pub mod pcd;
pub mod ply;
mod scalar;

pub use error::{DecodeError, IngestionError, StrategyFailure};
pub use format::ScanFormat;
pub use loader::load;
pub use pcd::{read_pcd, write_pcd};
pub use ply::{read_ply, write_ply};
pub use self::e57::read_e57;
pub use self::las::read_las;
