//! Coordinate frame transforms: world <-> map-internal <-> model-local.
//!
//! Map-internal coordinates are the frame the BIH and mesh indices are
//! stored in; they may differ from world coordinates by a fixed
//! rotation/mirror (most static-map formats store geometry mirrored or
//! axis-swapped relative to the live world frame). Model-local coordinates
//! are local to one `ModelInstance`'s mesh data.

use nalgebra as na;

use crate::geometry::Vec3;

/// Fixed rotation/mirror between world space and the frame the static map
/// data is stored in. Identity unless the caller's map format requires
/// otherwise.
#[derive(Clone, Copy, Debug)]
pub struct MapFrame {
    pub world_to_internal: na::Isometry3<f32>,
}

impl Default for MapFrame {
    fn default() -> Self {
        Self {
            world_to_internal: na::Isometry3::identity(),
        }
    }
}

impl MapFrame {
    pub fn world_to_internal(&self, p: Vec3) -> Vec3 {
        self.world_to_internal.transform_point(&p.into()).coords
    }

    pub fn internal_to_world(&self, p: Vec3) -> Vec3 {
        self.world_to_internal
            .inverse_transform_point(&p.into())
            .coords
    }

    /// Direction-only variant: rotation only, no translation. Used for
    /// transforming normals and velocities.
    pub fn world_to_internal_dir(&self, d: Vec3) -> Vec3 {
        self.world_to_internal.rotation.transform_vector(&d)
    }

    pub fn internal_to_world_dir(&self, d: Vec3) -> Vec3 {
        self.world_to_internal
            .rotation
            .inverse_transform_vector(&d)
    }
}

/// World (or map-internal) <-> model-local transform for one instance:
/// translation, rotation, and a uniform scale plus its precomputed inverse.
#[derive(Clone, Copy, Debug)]
pub struct ModelTransform {
    pub translation: Vec3,
    pub rotation: na::UnitQuaternion<f32>,
    pub scale: f32,
    inv_scale: f32,
}

impl ModelTransform {
    pub fn new(translation: Vec3, rotation: na::UnitQuaternion<f32>, scale: f32) -> Self {
        let inv_scale = if scale.abs() > 1e-9 { 1.0 / scale } else { 0.0 };
        Self {
            translation,
            rotation,
            scale,
            inv_scale,
        }
    }

    pub fn to_local(&self, world_or_internal: Vec3) -> Vec3 {
        let rel = world_or_internal - self.translation;
        self.rotation.inverse_transform_vector(&rel) * self.inv_scale
    }

    pub fn to_parent(&self, local: Vec3) -> Vec3 {
        self.rotation.transform_vector(&(local * self.scale)) + self.translation
    }

    /// Direction-only variant (rotation + inverse-scale, no translation) for
    /// normals and velocities.
    pub fn to_local_dir(&self, d: Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&d) * self.inv_scale
    }

    pub fn to_parent_dir(&self, d: Vec3) -> Vec3 {
        self.rotation.transform_vector(&(d * self.scale))
    }

    #[inline]
    pub fn inv_scale(&self) -> f32 {
        self.inv_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_transform_roundtrip() {
        let xf = ModelTransform::new(
            Vec3::new(10.0, 5.0, 0.0),
            na::UnitQuaternion::from_axis_angle(&na::Vector3::z_axis(), 0.7),
            2.0,
        );
        let p = Vec3::new(1.0, 2.0, 3.0);
        let local = xf.to_local(p);
        let back = xf.to_parent(local);
        assert!((back - p).norm() < 1e-4);
    }

    #[test]
    fn direction_roundtrip_preserves_norm() {
        let xf = ModelTransform::new(
            Vec3::new(10.0, 5.0, 0.0),
            na::UnitQuaternion::from_axis_angle(&na::Vector3::z_axis(), 0.3),
            1.0,
        );
        let d = Vec3::new(0.0, 0.0, 1.0);
        let local = xf.to_local_dir(d);
        let back = xf.to_parent_dir(local);
        assert!((back - d).norm() < 1e-4);
    }

    #[test]
    fn map_frame_identity_is_noop() {
        let frame = MapFrame::default();
        let p = Vec3::new(3.0, 4.0, 5.0);
        assert_eq!(frame.world_to_internal(p), p);
        assert_eq!(frame.internal_to_world(p), p);
    }
}
