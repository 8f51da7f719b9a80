use crate::Aabb;

/// Positions of a scan in meters, stored as parallel coordinate columns.
///
/// Every point held by the cloud has three finite coordinates. Decoders go
/// through [`PointCloud::push`], which refuses NaN and infinite values, so the
/// voxel stage never has to re-check them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloud {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    /// Build a cloud from coordinate columns, dropping any non-finite point.
    ///
    /// # Panics
    ///
    /// Panics if the columns differ in length.
    pub fn from_xyz(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        assert_eq!(x.len(), y.len(), "x and y must have same length");
        assert_eq!(x.len(), z.len(), "x and z must have same length");

        if x.iter().chain(&y).chain(&z).all(|v| v.is_finite()) {
            return Self { x, y, z };
        }

        let mut cloud = Self::with_capacity(x.len());
        for ((px, py), pz) in x.into_iter().zip(y).zip(z) {
            cloud.push([px, py, pz]);
        }
        cloud
    }

    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for &p in points {
            cloud.push(p);
        }
        cloud
    }

    /// Append a point. Returns `false` (and stores nothing) when any
    /// coordinate is NaN or infinite.
    pub fn push(&mut self, point: [f64; 3]) -> bool {
        if !point.iter().all(|v| v.is_finite()) {
            return false;
        }
        self.x.push(point[0]);
        self.y.push(point[1]);
        self.z.push(point[2]);
        true
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.x.len(), self.y.len());
        debug_assert_eq!(self.x.len(), self.z.len());
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn aabb(&self) -> Aabb {
        let mut aabb = Aabb::empty();
        for p in self.iter_points() {
            aabb.expand_with_point(p);
        }
        aabb
    }

    pub fn point(&self, i: usize) -> [f64; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }

    pub fn iter_points(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((x, y), z)| [*x, *y, *z])
    }

    /// Copy the points at `indices` into a new cloud, in index order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut out = Self::with_capacity(indices.len());
        for &idx in indices {
            assert!(idx < self.len(), "index out of bounds in select");
            out.x.push(self.x[idx]);
            out.y.push(self.y[idx]);
            out.z.push(self.z[idx]);
        }
        out
    }
}
