//! Capsule primitive: two endpoints plus a radius.
//!
//! Convention: `p0` is the feet reference, `p1` the head reference, with
//! `p1.z - p0.z` equal to the usable height minus `2*radius`. World axes are
//! right-handed, +Z up (see DESIGN.md "axis convention").

use super::primitives::{AABox, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capsule {
    pub p0: Vec3,
    pub p1: Vec3,
    pub radius: f32,
}

impl Capsule {
    pub fn new(p0: Vec3, p1: Vec3, radius: f32) -> Self {
        Self { p0, p1, radius }
    }

    /// Build a full-height capsule from a feet position: `p0` sits at
    /// `feet + radius*z`, `p1` at `feet + (height - radius)*z`, clamped to
    /// `p0` when `height < 2*radius` (degenerates to a sphere at the feet).
    pub fn from_feet(feet: Vec3, height: f32, radius: f32) -> Self {
        let p0 = feet + Vec3::new(0.0, 0.0, radius);
        let top_z = (height - radius).max(radius);
        let p1 = Vec3::new(feet.x, feet.y, feet.z + top_z);
        Self {
            p0,
            p1: if top_z > radius { p1 } else { p0 },
            radius,
        }
    }

    #[inline]
    pub fn axis(&self) -> Vec3 {
        self.p1 - self.p0
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.p0 + self.p1) * 0.5
    }

    #[inline]
    pub fn feet_z(&self) -> f32 {
        self.p0.z - self.radius
    }

    #[inline]
    pub fn head_z(&self) -> f32 {
        self.p1.z + self.radius
    }

    pub fn translated(&self, delta: Vec3) -> Capsule {
        Capsule {
            p0: self.p0 + delta,
            p1: self.p1 + delta,
            radius: self.radius,
        }
    }

    pub fn local_aabox(&self) -> AABox {
        let lo = self.p0.zip_map(&self.p1, f32::min) - Vec3::new(self.radius, self.radius, self.radius);
        let hi = self.p0.zip_map(&self.p1, f32::max) + Vec3::new(self.radius, self.radius, self.radius);
        AABox::new(lo, hi)
    }

    /// AABox enclosing the capsule both at its current position and after a
    /// displacement by `delta`, inflated by `skin`. Used to build the
    /// broad-phase query box for a sweep.
    pub fn swept_aabox(&self, delta: Vec3, skin: f32) -> AABox {
        let start = self.local_aabox();
        let end = self.translated(delta).local_aabox();
        start.merge(&end).inflate(skin)
    }

    pub fn to_parry(&self) -> parry3d::shape::Capsule {
        parry3d::shape::Capsule::new(self.p0.into(), self.p1.into(), self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_feet_full_height() {
        let c = Capsule::from_feet(Vec3::new(0.0, 0.0, 0.0), 2.0, 0.5);
        assert!((c.p0.z - 0.5).abs() < 1e-6);
        assert!((c.p1.z - 1.5).abs() < 1e-6);
    }

    #[test]
    fn from_feet_degenerate_short() {
        let c = Capsule::from_feet(Vec3::new(0.0, 0.0, 0.0), 0.5, 0.5);
        assert_eq!(c.p0, c.p1);
    }
}
