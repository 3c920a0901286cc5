//! CollideAndSlide: the iterative contact-response routine that advances a
//! capsule along a desired direction, handling single-plane slides, corner
//! (crease) constraints, ceiling slide prevention, and skin preservation.

use crate::geometry::{normalize_or_zero, Capsule, Vec3};
use crate::map_tree::StaticMapTree;
use crate::scene_query::SceneQuery;
use crate::terrain::TerrainGrid;
use crate::tolerances::Tolerances;

#[derive(Clone, Copy, Debug, Default)]
pub struct TriangleHeightRange {
    pub min_z: f32,
    pub max_z: f32,
    pub touched: bool,
}

impl TriangleHeightRange {
    fn record(&mut self, z: f32) {
        if !self.touched {
            self.min_z = z;
            self.max_z = z;
            self.touched = true;
        } else {
            self.min_z = self.min_z.min(z);
            self.max_z = self.max_z.max(z);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SlideResult {
    pub end_pos: Vec3,
    pub slide_dir: Vec3,
    pub distance_moved: f32,
    pub iterations: u32,
    pub hit_wall: bool,
    pub hit_corner: bool,
    pub hit_ceiling: bool,
    pub height_range: TriangleHeightRange,
}

/// Advances `start_capsule`'s position along `move_dir` for `distance`,
/// resolving contacts via iterative collide-and-slide. `horizontal_only`
/// projects the remaining direction onto the XY plane each iteration (used
/// by the grounded branch of the step orchestrator); `prevent_ceiling_slide`
/// short-circuits on the first ceiling contact.
#[allow(clippy::too_many_arguments)]
pub fn collide_and_slide(
    map: &StaticMapTree,
    terrain: &TerrainGrid,
    tolerances: &Tolerances,
    start_capsule: &Capsule,
    move_dir: Vec3,
    distance: f32,
    horizontal_only: bool,
    prevent_ceiling_slide: bool,
) -> SlideResult {
    let scene = SceneQuery::new(map, terrain, tolerances);
    let original_dir = normalize_or_zero(move_dir);
    let mut current = start_capsule.center();
    let mut target = current + original_dir * distance;
    let mut remaining = distance;
    let mut distance_moved = 0.0;
    let mut constraint_normals: Vec<Vec3> = Vec::new();
    let mut height_range = TriangleHeightRange::default();
    let mut hit_wall = false;
    let mut hit_corner = false;
    let mut hit_ceiling = false;
    let mut current_dir = original_dir;
    let mut iterations = 0;

    while iterations < tolerances.max_iterations && remaining > tolerances.min_move_distance {
        iterations += 1;

        let mut want_dir = normalize_or_zero(target - current);
        if horizontal_only {
            want_dir.z = 0.0;
            want_dir = normalize_or_zero(want_dir);
        }
        if want_dir.norm_squared() < 1e-8 {
            break;
        }
        if want_dir.dot(&original_dir) <= 0.0 {
            // Breaks oscillation in sloping corners.
            break;
        }
        current_dir = want_dir;

        let capsule = Capsule::new(
            start_capsule.p0 + (current - start_capsule.center()),
            start_capsule.p1 + (current - start_capsule.center()),
            start_capsule.radius,
        );
        let hits = scene.sweep_capsule(&capsule, current_dir, remaining);
        let Some(hit) = hits
            .iter()
            .find(|h| !h.start_penetrating && h.distance > tolerances.min_move_distance * 0.1)
        else {
            current += current_dir * remaining;
            distance_moved += remaining;
            remaining = 0.0;
            break;
        };

        let advance = (hit.distance - tolerances.contact_offset(start_capsule.radius)).max(0.0);
        current += current_dir * advance;
        distance_moved += advance;
        remaining -= advance;
        height_range.record(hit.point.z);

        let is_ceiling = hit.normal.z <= tolerances.ceiling_normal_z_threshold;
        if is_ceiling {
            hit_ceiling = true;
            if prevent_ceiling_slide {
                break;
            }
        } else {
            hit_wall = true;
        }

        let horizontal_normal = normalize_or_zero(Vec3::new(hit.normal.x, hit.normal.y, 0.0));
        let normal_for_stack = if horizontal_normal.norm_squared() > 1e-8 {
            horizontal_normal
        } else {
            hit.normal
        };
        constraint_normals.push(normal_for_stack);

        if constraint_normals.len() >= 2 {
            let n1 = constraint_normals[constraint_normals.len() - 2];
            let n2 = constraint_normals[constraint_normals.len() - 1];
            let mut crease = n1.cross(&n2);
            if crease.dot(&current_dir) < 0.0 {
                crease = -crease;
            }
            let crease = normalize_or_zero(crease);
            let blocked = crease.norm_squared() < 1e-8
                || constraint_normals
                    .iter()
                    .any(|n| crease.dot(n) < -1e-3);
            if blocked {
                hit_corner = true;
                break;
            }
            target = current + crease * remaining;
            continue;
        }

        // Reflection-and-friction slide (the PhysX response).
        let reflected = current_dir - hit.normal * (2.0 * current_dir.dot(&hit.normal));
        let normal_component = hit.normal * reflected.dot(&hit.normal);
        let tangent_component = reflected - normal_component;
        let step = tangent_component * tolerances.slide_friction * remaining
            + hit.normal * tolerances.slide_bump * remaining;
        target = current + step;
    }

    SlideResult {
        end_pos: current,
        slide_dir: current_dir,
        distance_moved,
        iterations,
        hit_wall,
        hit_corner,
        hit_ceiling,
        height_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_tree::{ModelInstance, WorldModel};
    use nalgebra as na;
    use std::sync::Arc;

    /// A single-quad obstacle placed at the identity transform, double-sided
    /// so winding order doesn't matter (the sweep's orientation fix-up
    /// handles facing).
    fn quad_instance(id: u32, a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> ModelInstance {
        let world_aabox = AABox::from_point(a).merge_point(b).merge_point(c).merge_point(d);
        let model = WorldModel::new(vec![a, b, c, d], vec![[0, 1, 2], [0, 2, 3]]);
        ModelInstance {
            id,
            transform: crate::coords::ModelTransform::new(Vec3::zeros(), na::UnitQuaternion::identity(), 1.0),
            world_aabox,
            model: Some(Arc::new(model)),
            collision_mask: u32::MAX,
        }
    }

    fn map_with(instances: Vec<ModelInstance>) -> StaticMapTree {
        let mut map = StaticMapTree::new();
        map.load_tile(0, 0, instances);
        map
    }

    fn standing_capsule(feet: Vec3) -> Capsule {
        Capsule::from_feet(feet, 1.8, 0.3)
    }

    #[test]
    fn wall_slide_stops_at_radius_plus_skin_from_wall() {
        // Vertical wall in the XZ... actually YZ plane at x=1, spanning y and z.
        let wall = quad_instance(
            1,
            Vec3::new(1.0, -5.0, -1.0),
            Vec3::new(1.0, 5.0, -1.0),
            Vec3::new(1.0, 5.0, 6.0),
            Vec3::new(1.0, -5.0, 6.0),
        );
        let map = map_with(vec![wall]);
        let terrain = TerrainGrid::new(533.333_3);
        let tol = Tolerances::default();
        let capsule = standing_capsule(Vec3::new(0.0, 0.0, 0.0));

        let result = collide_and_slide(&map, &terrain, &tol, &capsule, Vec3::new(1.0, 0.0, 0.0), 5.0, true, true);

        assert!(result.hit_wall);
        let expected_x = 1.0 - capsule.radius - tol.contact_offset(capsule.radius);
        assert!((result.end_pos.x - expected_x).abs() < 0.05, "end x {} expected near {}", result.end_pos.x, expected_x);
        assert!(result.end_pos.y.abs() < 1e-4, "capsule must not drift sideways along a flat wall");
    }

    #[test]
    fn corner_stop_does_not_tunnel_through_either_wall() {
        let wall_x = quad_instance(
            1,
            Vec3::new(1.0, -5.0, -1.0),
            Vec3::new(1.0, 5.0, -1.0),
            Vec3::new(1.0, 5.0, 6.0),
            Vec3::new(1.0, -5.0, 6.0),
        );
        let wall_y = quad_instance(
            2,
            Vec3::new(-5.0, 1.0, -1.0),
            Vec3::new(5.0, 1.0, -1.0),
            Vec3::new(5.0, 1.0, 6.0),
            Vec3::new(-5.0, 1.0, 6.0),
        );
        let map = map_with(vec![wall_x, wall_y]);
        let terrain = TerrainGrid::new(533.333_3);
        let tol = Tolerances::default();
        let capsule = standing_capsule(Vec3::new(-2.0, -2.0, 0.0));

        let result = collide_and_slide(
            &map,
            &terrain,
            &tol,
            &capsule,
            Vec3::new(1.0, 1.0, 0.0),
            10.0,
            true,
            true,
        );

        assert!(result.hit_wall);
        assert!(result.end_pos.x <= 1.0 - capsule.radius + 1e-3, "must not tunnel through the x-wall");
        assert!(result.end_pos.y <= 1.0 - capsule.radius + 1e-3, "must not tunnel through the y-wall");
        assert!(result.distance_moved < 10.0, "the corner must arrest forward progress");
    }

    #[test]
    fn ceiling_contact_halts_upward_motion_without_sliding() {
        let ceiling = quad_instance(
            1,
            Vec3::new(-5.0, -5.0, 2.0),
            Vec3::new(5.0, -5.0, 2.0),
            Vec3::new(5.0, 5.0, 2.0),
            Vec3::new(-5.0, 5.0, 2.0),
        );
        let map = map_with(vec![ceiling]);
        let terrain = TerrainGrid::new(533.333_3);
        let tol = Tolerances::default();
        let capsule = standing_capsule(Vec3::new(0.0, 0.0, 0.0));

        let result = collide_and_slide(&map, &terrain, &tol, &capsule, Vec3::new(0.0, 0.0, 1.0), 10.0, false, true);

        assert!(result.hit_ceiling);
        assert!(!result.hit_wall);
        assert!(result.end_pos.z < 2.0, "must stop below the ceiling");
        assert!(result.end_pos.z > capsule.center().z, "should still have advanced upward before stopping");
    }
}
