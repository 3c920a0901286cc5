//! Vec3, AABox, Ray: the crate's base math vocabulary.

use nalgebra as na;

/// Common math alias for clarity and consistency across the crate.
pub type Vec3 = na::Vector3<f32>;

const NORMALIZE_EPS: f32 = 1e-8;

/// Returns a unit vector, or the zero vector when `v`'s magnitude is at or
/// below `NORMALIZE_EPS` (avoids NaN propagation from near-degenerate
/// directions).
#[inline]
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    let len = v.norm();
    if len <= NORMALIZE_EPS {
        Vec3::zeros()
    } else {
        v / len
    }
}

/// Axis-aligned bounding box, stored as its low and high corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABox {
    pub low: Vec3,
    pub high: Vec3,
}

impl AABox {
    #[inline]
    pub fn new(low: Vec3, high: Vec3) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { low: p, high: p }
    }

    /// Degenerate empty box (low > high on every axis); `merge` with any real
    /// box yields that box unchanged.
    pub fn empty() -> Self {
        Self {
            low: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            high: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    pub fn merge(&self, other: &AABox) -> AABox {
        AABox {
            low: self.low.zip_map(&other.low, f32::min),
            high: self.high.zip_map(&other.high, f32::max),
        }
    }

    pub fn merge_point(&self, p: Vec3) -> AABox {
        self.merge(&AABox::from_point(p))
    }

    pub fn inflate(&self, amount: f32) -> AABox {
        let pad = Vec3::new(amount, amount, amount);
        AABox {
            low: self.low - pad,
            high: self.high + pad,
        }
    }

    #[inline]
    pub fn intersects(&self, other: &AABox) -> bool {
        self.low.x <= other.high.x
            && self.high.x >= other.low.x
            && self.low.y <= other.high.y
            && self.high.y >= other.low.y
            && self.low.z <= other.high.z
            && self.high.z >= other.low.z
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.low.x
            && p.x <= self.high.x
            && p.y >= self.low.y
            && p.y <= self.high.y
            && p.z >= self.low.z
            && p.z <= self.high.z
    }

    /// Intersection against a 2D (x, y) box, ignoring z entirely. Used by
    /// terrain tile lookups, which index purely by (x, y).
    pub fn intersects_xy(&self, low_xy: (f32, f32), high_xy: (f32, f32)) -> bool {
        self.low.x <= high_xy.0
            && self.high.x >= low_xy.0
            && self.low.y <= high_xy.1
            && self.high.y >= low_xy.1
    }

    pub fn half_diagonal(&self) -> f32 {
        (self.high - self.low).norm() * 0.5
    }

    pub fn center(&self) -> Vec3 {
        (self.low + self.high) * 0.5
    }

    pub fn to_parry(&self) -> parry3d::bounding_volume::Aabb {
        parry3d::bounding_volume::Aabb::new(self.low.into(), self.high.into())
    }
}

/// A ray: origin plus a direction normalized at construction time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: normalize_or_zero(dir),
        }
    }

    pub fn between(a: Vec3, b: Vec3) -> (Self, f32) {
        let delta = b - a;
        let dist = delta.norm();
        (Self::new(a, delta), dist)
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_or_zero_degenerate() {
        assert_eq!(normalize_or_zero(Vec3::zeros()), Vec3::zeros());
        assert_eq!(normalize_or_zero(Vec3::new(1e-9, 0.0, 0.0)), Vec3::zeros());
    }

    #[test]
    fn aabox_merge_and_intersect() {
        let a = AABox::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let b = AABox::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(2.0, 2.0, 2.0));
        assert!(a.intersects(&b));
        let merged = a.merge(&b);
        assert_eq!(merged.low, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(merged.high, Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn aabox_contains() {
        let a = AABox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(a.contains(Vec3::new(0.0, 0.0, 0.0)));
        assert!(!a.contains(Vec3::new(2.0, 0.0, 0.0)));
    }
}
