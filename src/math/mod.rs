/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Reflects a point across the YZ plane by negating its X coordinate.
#[must_use]
pub fn mirror_x(point: &Point3) -> Point3 {
    Point3::new(-point.x, point.y, point.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_x_negates_only_x() {
        let p = mirror_x(&Point3::new(1.5, -2.0, 3.0));
        assert_eq!(p, Point3::new(-1.5, -2.0, 3.0));
    }

    #[test]
    fn mirror_x_is_an_involution() {
        let p = Point3::new(0.25, 7.0, -1.0);
        assert_eq!(mirror_x(&mirror_x(&p)), p);
    }
}
