//! Triangle primitive for mesh collision.

use super::primitives::{AABox, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    /// When false, the triangle only blocks from the side its normal faces.
    pub double_sided: bool,
    pub collision_mask: u32,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a,
            b,
            c,
            double_sided: true,
            collision_mask: u32::MAX,
        }
    }

    /// Unnormalized normal, `(b-a) x (c-a)`; magnitude is twice the
    /// triangle's area.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vec3 {
        (self.b - self.a).cross(&(self.c - self.a))
    }

    /// Outward unit normal, or the zero vector for a degenerate
    /// (near-zero-area) triangle.
    pub fn normal(&self) -> Vec3 {
        super::primitives::normalize_or_zero(self.normal_unnormalized())
    }

    /// Twice the triangle's area; below 1e-12 the triangle is considered
    /// degenerate per spec.
    #[inline]
    pub fn double_area(&self) -> f32 {
        self.normal_unnormalized().norm()
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.double_area() < 1e-12
    }

    pub fn aabox(&self) -> AABox {
        AABox::from_point(self.a)
            .merge_point(self.b)
            .merge_point(self.c)
    }

    /// Signed distance from `p` to the triangle's plane, along the outward
    /// normal (positive = in front of the triangle).
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal().dot(&(p - self.a))
    }

    /// Barycentric coordinates of `p`'s projection onto the triangle's
    /// plane. Degenerate triangles return `(1, 0, 0)` (collapses onto `a`).
    pub fn barycentric(&self, p: Vec3) -> (f32, f32, f32) {
        let v0 = self.b - self.a;
        let v1 = self.c - self.a;
        let v2 = p - self.a;
        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < 1e-12 {
            return (1.0, 0.0, 0.0);
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;
        (u, v, w)
    }

    #[inline]
    pub fn contains_barycentric(bary: (f32, f32, f32), eps: f32) -> bool {
        bary.0 >= -eps && bary.1 >= -eps && bary.2 >= -eps
    }

    pub fn point_from_barycentric(&self, bary: (f32, f32, f32)) -> Vec3 {
        self.a * bary.0 + self.b * bary.1 + self.c * bary.2
    }

    pub fn to_parry(&self) -> parry3d::shape::Triangle {
        parry3d::shape::Triangle::new(self.a.into(), self.b.into(), self.c.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_points_up_for_xy_triangle() {
        let t = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let n = t.normal();
        assert!((n.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn barycentric_roundtrip() {
        let t = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        );
        let p = Vec3::new(0.5, 0.5, 0.0);
        let bary = t.barycentric(p);
        let back = t.point_from_barycentric(bary);
        assert!((back - p).norm() < 1e-5);
    }

    #[test]
    fn degenerate_triangle_detected() {
        let t = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        );
        assert!(t.is_degenerate());
    }
}
