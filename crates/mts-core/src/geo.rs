//! Planar vectors, geographic coordinates, and the bearing sort used to
//! number the edges around an intersection.
//!
//! Direction vectors are only ever used for *ordering*, never for rendering,
//! so a flat `(lon, lat)` plane is precise enough at intersection scale.

use std::f64::consts::PI;

// ── Vec2d ─────────────────────────────────────────────────────────────────────

/// A 2-D vector in the `(x = lon, y = lat)` plane.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2d {
    pub x: f64,
    pub y: f64,
}

impl Vec2d {
    /// Two vectors closer than this (after normalisation) are the same bearing.
    pub const EPSILON: f64 = 1e-9;

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn dot(self, other: Vec2d) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 3-D cross product.  Positive iff `other` lies
    /// counter-clockwise of `self`.
    #[inline]
    pub fn cross(self, other: Vec2d) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn len(self) -> f64 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.len() < Self::EPSILON
    }

    /// Unit vector with the same bearing; the zero vector stays zero.
    pub fn normalized(self) -> Vec2d {
        let len = self.len();
        if len < Self::EPSILON {
            return self;
        }
        Vec2d::new(self.x / len, self.y / len)
    }

    /// `true` if both vectors point the same way (length is ignored).
    pub fn same_bearing(self, other: Vec2d) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        (a.x - b.x).abs() < Self::EPSILON && (a.y - b.y).abs() < Self::EPSILON
    }

    /// Angle in `[0, 2π)` swept from `zero` to `self`, turning clockwise if
    /// `clockwise` is set and counter-clockwise otherwise.
    pub fn angle_from(self, zero: Vec2d, clockwise: bool) -> f64 {
        let denom = zero.len() * self.len();
        if denom < Self::EPSILON {
            return 0.0;
        }
        let alpha = (zero.dot(self) / denom).clamp(-1.0, 1.0).acos();
        let turn = zero.cross(self);
        // A counter-clockwise turn is "the long way round" when sorting
        // clockwise, and vice versa.
        let mirrored = if clockwise { turn > 0.0 } else { turn < 0.0 };
        if mirrored { 2.0 * PI - alpha } else { alpha }
    }
}

impl std::ops::Neg for Vec2d {
    type Output = Vec2d;
    #[inline]
    fn neg(self) -> Vec2d {
        Vec2d::new(-self.x, -self.y)
    }
}

impl std::ops::Sub for Vec2d {
    type Output = Vec2d;
    #[inline]
    fn sub(self, rhs: Vec2d) -> Vec2d {
        Vec2d::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Sort `vectors` by their angle from `zero`, ascending, turning clockwise or
/// counter-clockwise.  Returns positions into `vectors`; equal angles keep
/// their input order.
///
/// `zero` itself (or any vector with its bearing) sorts first with angle 0.
pub fn sort_by_bearing(zero: Vec2d, vectors: &[Vec2d], clockwise: bool) -> Vec<usize> {
    let angles: Vec<f64> = vectors.iter().map(|v| v.angle_from(zero, clockwise)).collect();
    let mut order: Vec<usize> = (0..vectors.len()).collect();
    order.sort_by(|&a, &b| angles[a].total_cmp(&angles[b]));
    order
}

// ── GeoPoint ──────────────────────────────────────────────────────────────────

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        const R: f64 = 6_371_000.0; // mean Earth radius, metres

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        R * c
    }

    /// Direction vector from `self` towards `other` in the `(lon, lat)` plane.
    #[inline]
    pub fn direction_to(self, other: GeoPoint) -> Vec2d {
        Vec2d::new(other.lon - self.lon, other.lat - self.lat)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}
