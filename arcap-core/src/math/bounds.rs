use nalgebra::{ClosedAdd, ClosedSub, Point3, RealField, Scalar, Vector3};

/// 3D axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB<T: Scalar + PartialOrd> {
    min: Point3<T>,
    max: Point3<T>,
}

impl<T: Scalar + ClosedSub + ClosedAdd + PartialOrd + Copy> AABB<T> {
    /// Creates a new AABB from the given minimum and maximum coordinates. Panics if the minimum position is
    /// not less than or equal to the maximum position
    /// ```
    /// # use arcap_core::math::AABB;
    /// let bounds = AABB::from_min_max(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// ```
    pub fn from_min_max(min: Point3<T>, max: Point3<T>) -> Self {
        if min.x > max.x || min.y > max.y || min.z > max.z {
            panic!("AABB::from_min_max: Minimum position must be <= maximum position!");
        }
        Self { min, max }
    }

    /// Creates a new AABB from the given minimum and maximum coordinates without checking that min <= max
    pub fn from_min_max_unchecked(min: Point3<T>, max: Point3<T>) -> Self {
        Self { min, max }
    }

    /// Returns the smallest AABB containing all of the given positions, or `None` if `positions` is empty
    /// ```
    /// # use arcap_core::math::AABB;
    /// # use nalgebra::Vector3;
    /// let positions = [Vector3::new(1.0, -1.0, 0.0), Vector3::new(-2.0, 3.0, 0.5)];
    /// let bounds = AABB::from_positions(positions.iter()).unwrap();
    /// assert_eq!(*bounds.min(), nalgebra::Point3::new(-2.0, -1.0, 0.0));
    /// assert_eq!(*bounds.max(), nalgebra::Point3::new(1.0, 3.0, 0.5));
    /// ```
    pub fn from_positions<'a, I: IntoIterator<Item = &'a Vector3<T>>>(positions: I) -> Option<Self>
    where
        T: 'a,
    {
        let mut iter = positions.into_iter();
        let first: Point3<T> = Point3::from(*iter.next()?);
        let bounds = iter.fold(Self::from_min_max_unchecked(first, first), |bounds, position| {
            Self::extend_with_point(&bounds, &Point3::from(*position))
        });
        Some(bounds)
    }

    /// Returns the minimum point of this AABB
    pub fn min(&self) -> &Point3<T> {
        &self.min
    }

    /// Returns the maximum point of this AABB
    pub fn max(&self) -> &Point3<T> {
        &self.max
    }

    /// Returns the extent of this AABB. The extent is the size between the minimum and maximum position of this AABB
    /// ```
    /// # use arcap_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(bounds.extent(), nalgebra::Vector3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn extent(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Returns the length of the longest side of this AABB
    pub fn max_extent(&self) -> T {
        let extent = self.extent();
        let mut longest = extent.x;
        if extent.y > longest {
            longest = extent.y;
        }
        if extent.z > longest {
            longest = extent.z;
        }
        longest
    }

    /// Returns true if the given point is contained within this AABB. Points right on the boundary
    /// of this AABB (e.g. point.x == self.max.x or self.min.x) will return true as well.
    pub fn contains(&self, point: &Point3<T>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Extends the given AABB so that it contains the given point.
    /// ```
    /// # use arcap_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(1.0, 1.0, 1.0));
    /// let extended_bounds = AABB::extend_with_point(&bounds, &nalgebra::Point3::new(2.0, -2.0, 2.0));
    /// assert_eq!(*extended_bounds.min(), nalgebra::Point3::new(0.0, -2.0, 0.0));
    /// assert_eq!(*extended_bounds.max(), nalgebra::Point3::new(2.0, 1.0, 2.0));
    /// ```
    pub fn extend_with_point(bounds: &AABB<T>, point: &Point3<T>) -> AABB<T> {
        let pick_min = |a: T, b: T| if a < b { a } else { b };
        let pick_max = |a: T, b: T| if a > b { a } else { b };
        Self {
            min: Point3::new(
                pick_min(bounds.min.x, point.x),
                pick_min(bounds.min.y, point.y),
                pick_min(bounds.min.z, point.z),
            ),
            max: Point3::new(
                pick_max(bounds.max.x, point.x),
                pick_max(bounds.max.y, point.y),
                pick_max(bounds.max.z, point.z),
            ),
        }
    }
}

impl<T: RealField + Copy> AABB<T> {
    /// Returns the center point of this AABB
    pub fn center(&self) -> Point3<T> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Returns a cube that shares its center with this AABB and whose edge length is the longest side of
    /// this AABB multiplied by `scale`. Degenerate (flat or single-point) bounds yield a cube of edge `scale`.
    /// ```
    /// # use arcap_core::math::AABB;
    /// let bounds = AABB::from_min_max_unchecked(nalgebra::Point3::new(0.0, 0.0, 0.0), nalgebra::Point3::new(2.0, 1.0, 0.0));
    /// let cube = bounds.bounding_cube(1.5);
    /// assert_eq!(cube.extent(), nalgebra::Vector3::new(3.0, 3.0, 3.0));
    /// assert_eq!(cube.center(), bounds.center());
    /// ```
    pub fn bounding_cube(&self, scale: T) -> Self {
        let mut edge = self.max_extent() * scale;
        if edge <= T::zero() {
            edge = scale;
        }
        let half = Vector3::repeat(edge / (T::one() + T::one()));
        let center = self.center();
        Self {
            min: center - half,
            max: center + half,
        }
    }
}

impl<T: Scalar + ClosedSub + ClosedAdd + PartialOrd + Copy> FromIterator<Vector3<T>> for AABB<T> {
    /// Collects positions into their bounding box. Panics if the iterator is empty
    fn from_iter<I: IntoIterator<Item = Vector3<T>>>(iter: I) -> Self {
        let positions = iter.into_iter().collect::<Vec<_>>();
        Self::from_positions(positions.iter())
            .expect("Can't compute the bounding box of an empty set of positions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_empty() {
        let positions: Vec<Vector3<f32>> = vec![];
        assert!(AABB::from_positions(positions.iter()).is_none());
    }

    #[test]
    fn test_contains_boundary() {
        let bounds: AABB<f32> = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0)]
            .into_iter()
            .collect();
        assert!(bounds.contains(&Point3::new(1.0, 0.0, 0.5)));
        assert!(!bounds.contains(&Point3::new(1.01, 0.0, 0.5)));
    }

    #[test]
    fn test_bounding_cube_of_single_point() {
        let bounds = AABB::from_min_max(Point3::new(1.0, 1.0, 1.0), Point3::new(1.0, 1.0, 1.0));
        let cube = bounds.bounding_cube(2.0);
        assert_eq!(cube.extent(), Vector3::new(2.0, 2.0, 2.0));
        assert_eq!(*cube.min(), Point3::new(0.0, 0.0, 0.0));
    }
}
