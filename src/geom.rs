//! Coordinate points, geometry kinds, and ring classification.

/// A point in a layer's local tile coordinate space.
///
/// 2D and 3D points share this trait so the geometry decoder can be
/// written once and instantiated for either dimensionality: `z` is a no-op
/// on [`Point2`] and a real accumulator on [`Point3`].
pub trait Point: Copy + Default + std::fmt::Debug + PartialEq {
    fn new(x: i32, y: i32) -> Self;
    fn x(&self) -> i32;
    fn y(&self) -> i32;
    fn get_z(&self) -> i64 {
        0
    }
    fn set_z(&mut self, _z: i64) {}
    fn add_to_z(&mut self, _dz: i64) {}
}

/// A 2D integer coordinate, `(x, y)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point2 {
    pub x: i32,
    pub y: i32,
}

impl Point for Point2 {
    fn new(x: i32, y: i32) -> Self {
        Point2 { x, y }
    }
    fn x(&self) -> i32 {
        self.x
    }
    fn y(&self) -> i32 {
        self.y
    }
}

/// A 3D integer coordinate, `(x, y, z)`. `z` is stored independently of
/// `x`/`y` and is typically decoded through an elevation [`Scaling`](crate::value::Scaling).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point3 {
    pub x: i32,
    pub y: i32,
    pub z: i64,
}

impl Point for Point3 {
    fn new(x: i32, y: i32) -> Self {
        Point3 { x, y, z: 0 }
    }
    fn x(&self) -> i32 {
        self.x
    }
    fn y(&self) -> i32 {
        self.y
    }
    fn get_z(&self) -> i64 {
        self.z
    }
    fn set_z(&mut self, z: i64) {
        self.z = z;
    }
    fn add_to_z(&mut self, dz: i64) {
        self.z += dz;
    }
}

/// The geometry kind stored in a feature's header.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GeometryType {
    #[default]
    Unknown,
    Point,
    Linestring,
    Polygon,
    /// v3 only.
    Spline,
}

impl GeometryType {
    pub fn as_u64(self) -> u64 {
        match self {
            GeometryType::Unknown => 0,
            GeometryType::Point => 1,
            GeometryType::Linestring => 2,
            GeometryType::Polygon => 3,
            GeometryType::Spline => 4,
        }
    }
}

impl From<u64> for GeometryType {
    fn from(v: u64) -> Self {
        match v {
            1 => GeometryType::Point,
            2 => GeometryType::Linestring,
            3 => GeometryType::Polygon,
            4 => GeometryType::Spline,
            _ => GeometryType::Unknown,
        }
    }
}

/// Classification of a polygon ring derived from its signed area.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RingRole {
    /// Signed area > 0: the ring is an exterior ring.
    Outer,
    /// Signed area < 0: the ring is a hole in the preceding outer ring.
    Inner,
    /// Signed area == 0: degenerate, zero-area ring.
    Invalid,
}

/// Computes twice the signed area of a closed ring (first point repeated as
/// last) in 64-bit arithmetic via the shoelace formula, then classifies it.
///
/// Coordinates are `i32`; each cross-product fits comfortably in `i64`, so
/// accumulation never overflows and never touches floating point, keeping
/// the classification a deterministic, platform-independent function of
/// the ring's points alone.
pub fn classify_ring(points: &[(i32, i32)]) -> RingRole {
    let area2 = signed_area2(points);
    match area2.cmp(&0) {
        std::cmp::Ordering::Greater => RingRole::Outer,
        std::cmp::Ordering::Less => RingRole::Inner,
        std::cmp::Ordering::Equal => {
            log::trace!("ring with zero signed area");
            RingRole::Invalid
        }
    }
}

/// Twice the signed area of `points`, which must already be closed (or will
/// be treated as implicitly closed by wrapping back to `points[0]`).
pub fn signed_area2(points: &[(i32, i32)]) -> i64 {
    if points.len() < 2 {
        return 0;
    }
    let mut area: i64 = 0;
    for i in 0..points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % points.len()];
        area += i64::from(x0) * i64::from(y1) - i64::from(x1) * i64::from(y0);
    }
    area
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winding_order_determines_outer_vs_inner() {
        let square = [(0, 0), (4, 0), (4, 4), (0, 4)];
        assert_eq!(classify_ring(&square), RingRole::Outer);
        let reversed: Vec<_> = square.iter().rev().copied().collect();
        assert_eq!(classify_ring(&reversed), RingRole::Inner);
    }

    #[test]
    fn degenerate_ring_is_invalid() {
        let _ = env_logger::builder().is_test(true).try_init();
        let line = [(0, 0), (1, 1), (0, 0)];
        assert_eq!(classify_ring(&line), RingRole::Invalid);
    }

    #[test]
    fn point3_z_accumulates_point2_is_noop() {
        let mut p3 = Point3::new(1, 2);
        p3.add_to_z(5);
        p3.add_to_z(3);
        assert_eq!(p3.get_z(), 8);

        let mut p2 = Point2::new(1, 2);
        p2.add_to_z(5);
        assert_eq!(p2.get_z(), 0);
    }
}
