//! Pure contact-manifold utilities used by the slide resolver and the
//! ground/step logic in `physics::step`.

use crate::geometry::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPlane {
    pub normal: Vec3,
    pub point: Vec3,
    pub walkable: bool,
    pub penetrating: bool,
}

/// Merges planes whose normals agree within `eps_normal` and whose
/// reference points agree within `(eps_xy, eps_z)`; walkable/penetrating
/// bits are OR-ed across merged entries.
pub fn deduplicate_planes(
    planes: &[ContactPlane],
    eps_normal: f32,
    eps_xy: f32,
    eps_z: f32,
) -> Vec<ContactPlane> {
    let mut out: Vec<ContactPlane> = Vec::new();
    for &p in planes {
        if let Some(existing) = out.iter_mut().find(|e: &&mut ContactPlane| {
            (e.normal - p.normal).norm() <= eps_normal
                && (e.point.x - p.point.x).abs() <= eps_xy
                && (e.point.y - p.point.y).abs() <= eps_xy
                && (e.point.z - p.point.z).abs() <= eps_z
        }) {
            existing.walkable |= p.walkable;
            existing.penetrating |= p.penetrating;
        } else {
            out.push(p);
        }
    }
    out
}

/// Priority, never returning a plane while swimming: (1) penetrating and
/// walkable, (2) non-penetrating and walkable only while moving, (3) any
/// walkable, (4) deepest penetrating.
pub fn choose_primary_plane(
    planes: &[ContactPlane],
    moving: bool,
    start_swimming: bool,
) -> Option<ContactPlane> {
    if start_swimming {
        return None;
    }
    if let Some(p) = planes.iter().find(|p| p.penetrating && p.walkable) {
        return Some(*p);
    }
    if moving {
        if let Some(p) = planes.iter().find(|p| !p.penetrating && p.walkable) {
            return Some(*p);
        }
    }
    if let Some(p) = planes.iter().find(|p| p.walkable) {
        return Some(*p);
    }
    planes
        .iter()
        .filter(|p| p.penetrating)
        .max_by(|a, b| a.point.z.total_cmp(&b.point.z))
        .copied()
}

/// Slide direction given a primary plane and the set of currently-walkable
/// constraint planes: when a second walkable plane shares a non-parallel
/// normal, the slide follows the intersection line of the two planes
/// projected onto `move_dir`; otherwise it's the projection of `move_dir`
/// onto the primary plane.
pub fn compute_slide_dir(
    primary: &ContactPlane,
    walkable_planes: &[ContactPlane],
    move_dir: Vec3,
) -> Option<Vec3> {
    let secondary = walkable_planes.iter().find(|p| {
        (p.normal - primary.normal).norm() > 1e-3 && (p.normal.cross(&primary.normal)).norm() > 1e-4
    });
    let dir = if let Some(secondary) = secondary {
        let crease = primary.normal.cross(&secondary.normal);
        if crease.dot(&move_dir) < 0.0 {
            -crease
        } else {
            crease
        }
    } else {
        move_dir - primary.normal * primary.normal.dot(&move_dir)
    };
    let dir = crate::geometry::primitives::normalize_or_zero(dir);
    if dir.norm_squared() > 0.0 {
        Some(dir)
    } else {
        None
    }
}

/// Snaps `(x, y, currentZ)` onto the primary plane's z at that (x, y),
/// unless the adjustment would exceed the step limits.
pub fn clamp_z_to_plane(
    n: Vec3,
    p: Vec3,
    x: f32,
    y: f32,
    current_z: f32,
    step_up: f32,
    step_down: f32,
) -> f32 {
    if n.z.abs() < 1e-6 {
        return current_z;
    }
    // Plane equation: n . (q - p) = 0 => z = p.z - (n.x*(x-p.x) + n.y*(y-p.y)) / n.z
    let plane_z = p.z - (n.x * (x - p.x) + n.y * (y - p.y)) / n.z;
    let delta = plane_z - current_z;
    if delta > step_up || delta < -step_down {
        current_z
    } else {
        plane_z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(normal: Vec3, point: Vec3, walkable: bool, penetrating: bool) -> ContactPlane {
        ContactPlane {
            normal,
            point,
            walkable,
            penetrating,
        }
    }

    #[test]
    fn dedup_merges_close_planes() {
        let planes = vec![
            plane(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 0.0), true, false),
            plane(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.001, 0.0, 0.0), false, true),
        ];
        let out = deduplicate_planes(&planes, 1e-3, 0.01, 0.01);
        assert_eq!(out.len(), 1);
        assert!(out[0].walkable && out[0].penetrating);
    }

    #[test]
    fn primary_prefers_penetrating_walkable() {
        let planes = vec![
            plane(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 0.0), true, false),
            plane(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), true, true),
        ];
        let primary = choose_primary_plane(&planes, true, false).unwrap();
        assert!(primary.penetrating);
    }

    #[test]
    fn clamp_respects_step_limits() {
        let n = Vec3::new(0.0, 0.0, 1.0);
        let p = Vec3::new(0.0, 0.0, 1.0);
        assert_eq!(clamp_z_to_plane(n, p, 0.0, 0.0, 0.0, 0.75, 0.75), 1.0);
        assert_eq!(clamp_z_to_plane(n, p, 0.0, 0.0, 0.0, 0.5, 0.5), 0.0);
    }
}
