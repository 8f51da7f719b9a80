use std::borrow::Cow;

use rand::Rng;
use tracing::debug;
use voxdiff_core::PointCloud;

/// Upper bound on how many points of one scan enter voxelization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointBudget {
    Unbounded,
    Max(usize),
}

impl PointBudget {
    /// Interpret a command-line point cap; zero or negative disables it.
    pub fn from_limit(limit: i64) -> Self {
        match usize::try_from(limit) {
            Ok(0) | Err(_) => PointBudget::Unbounded,
            Ok(n) => PointBudget::Max(n),
        }
    }

    pub fn exceeded_by(self, len: usize) -> bool {
        matches!(self, PointBudget::Max(n) if len > n)
    }

    /// Return the cloud unchanged when it fits, otherwise a new cloud of
    /// exactly `n` points drawn uniformly without replacement.
    pub fn apply<'a, R: Rng + ?Sized>(self, cloud: &'a PointCloud, rng: &mut R) -> Cow<'a, PointCloud> {
        match self {
            PointBudget::Max(n) if cloud.len() > n => {
                let indices = rand::seq::index::sample(rng, cloud.len(), n).into_vec();
                debug!(from = cloud.len(), to = n, "subsampled cloud to point budget");
                Cow::Owned(cloud.select(&indices))
            }
            _ => Cow::Borrowed(cloud),
        }
    }
}

impl Default for PointBudget {
    fn default() -> Self {
        PointBudget::Max(2_000_000)
    }
}
