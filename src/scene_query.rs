//! SceneQuery: the unified broad-and-narrow-phase query layer over a
//! `StaticMapTree` (instanced meshes) and a `TerrainGrid` (terrain
//! triangles).

use crate::geometry::kernel::{
    capsule_triangle_sweep, intersect_capsule_triangle, intersect_sphere_triangle,
};
use crate::geometry::{normalize_or_zero, AABox, Capsule, Triangle, Vec3};
use crate::map_tree::{SceneHit, StaticMapTree, TERRAIN_INSTANCE_ID};
use crate::terrain::TerrainGrid;
use crate::tolerances::Tolerances;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiquidInfo {
    pub level: f32,
    pub type_id: u32,
    pub from_vmap: bool,
    pub has_level: bool,
    pub is_swimming: bool,
}

/// Bitmask of liquid types; `1` is conventionally "water" for the swim
/// test. Callers supply their own mapping from source-specific liquid
/// type ids.
pub const LIQUID_TYPE_WATER: u32 = 1;

pub struct SceneQuery<'a> {
    pub map: &'a StaticMapTree,
    pub terrain: &'a TerrainGrid,
    pub tolerances: &'a Tolerances,
}

impl<'a> SceneQuery<'a> {
    pub fn new(map: &'a StaticMapTree, terrain: &'a TerrainGrid, tolerances: &'a Tolerances) -> Self {
        Self {
            map,
            terrain,
            tolerances,
        }
    }

    /// Sweeps `start_capsule` along `dir * distance`, returning every
    /// contact sorted with start-penetrating hits first (descending z, then
    /// descending depth), then sweep hits (ascending time, ties broken by
    /// triangle index).
    pub fn sweep_capsule(&self, start_capsule: &Capsule, dir: Vec3, distance: f32) -> Vec<SceneHit> {
        let dir = normalize_or_zero(dir);
        let velocity = dir * distance;
        let skin = self.tolerances.contact_offset(start_capsule.radius);
        let broad = start_capsule.swept_aabox(velocity, skin);

        let mut start_pen = Vec::new();
        let mut swept = Vec::new();

        let z_window = (
            start_capsule.feet_z() - self.tolerances.step_down_height - 1e-3,
            start_capsule.head_z() + 1e-3,
        );

        let mut visit = |tri_idx: u32, source_id: u32, tri: &Triangle| {
            if let Some(hit) = intersect_capsule_triangle(start_capsule, tri) {
                if in_z_window(hit.point.z, z_window) {
                    start_pen.push(SceneHit {
                        point: hit.point,
                        normal: hit.normal,
                        time: 0.0,
                        distance: 0.0,
                        source_instance_id: source_id,
                        triangle_index: tri_idx,
                        start_penetrating: true,
                        penetration_depth: hit.depth,
                        capsule_region: hit.region,
                        normal_flipped: false,
                    });
                }
                return;
            }
            if velocity.norm_squared() < 1e-12 {
                return;
            }
            if let Some(hit) = capsule_triangle_sweep(start_capsule, velocity, tri) {
                if !in_z_window(hit.point.z, z_window) {
                    return;
                }
                let (normal, flipped) = orient_for_sweep(hit.normal, velocity);
                swept.push(SceneHit {
                    point: hit.point,
                    normal,
                    time: hit.t,
                    distance: hit.t * distance,
                    source_instance_id: source_id,
                    triangle_index: tri_idx,
                    start_penetrating: false,
                    penetration_depth: 0.0,
                    capsule_region: hit.region,
                    normal_flipped: flipped,
                });
            }
        };

        for idx in self.map.query_aabb(&broad) {
            let Some(inst) = self.map.instances().get(idx as usize) else {
                continue;
            };
            let Some(model) = &inst.model else { continue };
            let local_p0 = inst.transform.to_local(start_capsule.p0);
            let local_p1 = inst.transform.to_local(start_capsule.p1);
            let local_capsule = Capsule::new(local_p0, local_p1, start_capsule.radius * inst.transform.inv_scale());
            let local_vel = inst.transform.to_local_dir(velocity);
            let local_box = local_capsule.swept_aabox(local_vel, skin);
            for (tri_idx, local_tri) in model.mesh_data_in_bounds(&local_box) {
                let world_tri = Triangle {
                    a: inst.transform.to_parent(local_tri.a),
                    b: inst.transform.to_parent(local_tri.b),
                    c: inst.transform.to_parent(local_tri.c),
                    double_sided: local_tri.double_sided,
                    collision_mask: local_tri.collision_mask,
                };
                visit(tri_idx as u32, inst.id, &world_tri);
            }
        }

        let terrain_box_lo = broad.low;
        let terrain_box_hi = broad.high;
        for terrain_tri in self.terrain.triangles_in(terrain_box_lo, terrain_box_hi) {
            visit(
                terrain_tri.cell_index as u32,
                TERRAIN_INSTANCE_ID,
                &terrain_tri.triangle,
            );
        }

        start_pen.sort_by(|a, b| {
            b.point
                .z
                .total_cmp(&a.point.z)
                .then(b.penetration_depth.total_cmp(&a.penetration_depth))
        });
        swept.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.triangle_index.cmp(&b.triangle_index)));

        start_pen.extend(swept);
        start_pen
    }

    pub fn overlap_capsule(&self, capsule: &Capsule, include_mask: u32) -> Vec<SceneHit> {
        let broad = capsule.local_aabox().inflate(self.tolerances.contact_offset(capsule.radius));
        let mut hits = Vec::new();
        for idx in self.map.query_aabb(&broad) {
            let Some(inst) = self.map.instances().get(idx as usize) else {
                continue;
            };
            if inst.collision_mask & include_mask == 0 {
                continue;
            }
            let Some(model) = &inst.model else { continue };
            let local_p0 = inst.transform.to_local(capsule.p0);
            let local_p1 = inst.transform.to_local(capsule.p1);
            let local_capsule = Capsule::new(local_p0, local_p1, capsule.radius * inst.transform.inv_scale());
            for (tri_idx, local_tri) in model.mesh_data_in_bounds(&local_capsule.local_aabox()) {
                if local_tri.collision_mask & include_mask == 0 {
                    continue;
                }
                if let Some(hit) = intersect_capsule_triangle(&local_capsule, &local_tri) {
                    let point = inst.transform.to_parent(hit.point);
                    let mid = inst.transform.to_parent(local_capsule.center());
                    let (normal, flipped) = orient_for_overlap(inst.transform.to_parent_dir(hit.normal), point, mid);
                    hits.push(SceneHit {
                        point,
                        normal,
                        time: 0.0,
                        distance: 0.0,
                        source_instance_id: inst.id,
                        triangle_index: tri_idx as u32,
                        start_penetrating: true,
                        penetration_depth: hit.depth,
                        capsule_region: hit.region,
                        normal_flipped: flipped,
                    });
                }
            }
        }
        for terrain_tri in self.terrain.triangles_in(broad.low, broad.high) {
            if let Some(hit) = intersect_capsule_triangle(capsule, &terrain_tri.triangle) {
                let mid = capsule.center();
                let (normal, flipped) = orient_for_overlap(hit.normal, hit.point, mid);
                hits.push(SceneHit {
                    point: hit.point,
                    normal,
                    time: 0.0,
                    distance: 0.0,
                    source_instance_id: TERRAIN_INSTANCE_ID,
                    triangle_index: terrain_tri.cell_index as u32,
                    start_penetrating: true,
                    penetration_depth: hit.depth,
                    capsule_region: hit.region,
                    normal_flipped: flipped,
                });
            }
        }
        hits.sort_by(|a, b| b.point.z.total_cmp(&a.point.z));
        hits
    }

    pub fn overlap_sphere(&self, center: Vec3, radius: f32, include_mask: u32) -> Vec<SceneHit> {
        self.overlap_capsule(&Capsule::new(center, center, radius), include_mask)
    }

    /// Approximated by a sphere of radius equal to the half-diagonal.
    pub fn overlap_box(&self, query_box: &AABox, include_mask: u32) -> Vec<SceneHit> {
        self.overlap_sphere(query_box.center(), query_box.half_diagonal(), include_mask)
    }

    pub fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        if !self.map.is_in_line_of_sight(from, to) {
            return false;
        }
        let (ray, dist) = crate::geometry::Ray::between(from, to);
        for terrain_tri in self.terrain.triangles_in(
            Vec3::new(from.x.min(to.x), from.y.min(to.y), 0.0),
            Vec3::new(from.x.max(to.x), from.y.max(to.y), 0.0),
        ) {
            let capsule = Capsule::new(ray.origin, ray.origin, 0.0);
            if capsule_triangle_sweep(&capsule, ray.dir * dist, &terrain_tri.triangle)
                .is_some_and(|h| h.t * dist <= dist)
            {
                return false;
            }
        }
        true
    }

    pub fn evaluate_liquid_at(&self, x: f32, y: f32, z: f32, height: f32) -> LiquidInfo {
        // "Volume" liquid (e.g. a placed water-volume instance) wins when
        // present; this core has no area-table of its own, so volume liquid
        // is left to a caller-supplied layer above `evaluate_liquid_at` and
        // only ADT-style terrain liquid is evaluated here.
        let adt = self.terrain.liquid_at(x, y);
        let Some(patch) = adt else {
            return LiquidInfo {
                level: 0.0,
                type_id: 0,
                from_vmap: false,
                has_level: false,
                is_swimming: false,
            };
        };
        let (level, type_id, from_vmap) = (patch.level, patch.type_id, false);
        let immersion = level - z;
        let is_swimming = immersion > 0.0
            && type_id == LIQUID_TYPE_WATER
            && immersion > self.tolerances.swim_immersion_fraction * height;
        LiquidInfo {
            level,
            type_id,
            from_vmap,
            has_level: true,
            is_swimming,
        }
    }
}

fn in_z_window(z: f32, window: (f32, f32)) -> bool {
    z >= window.0 && z <= window.1
}

/// Sweep hits: flip so `n . velocity <= 0`.
fn orient_for_sweep(normal: Vec3, velocity: Vec3) -> (Vec3, bool) {
    if normal.dot(&velocity) > 0.0 {
        (-normal, true)
    } else {
        (normal, false)
    }
}

/// Overlap hits: flip so `n . (triangleContact - capsuleMid) <= 0`, i.e.
/// pointing from the capsule toward the triangle.
fn orient_for_overlap(normal: Vec3, triangle_contact: Vec3, capsule_mid: Vec3) -> (Vec3, bool) {
    let towards = triangle_contact - capsule_mid;
    if normal.dot(&towards) > 0.0 {
        (-normal, true)
    } else {
        (normal, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_tree::StaticMapTree;
    use crate::terrain::{tile_coord_of, LiquidPatch, TerrainTile, TileCoord, TILE_CELLS_PER_SIDE};

    fn flat_terrain(z: f32, grid_size: f32, liquid: Option<LiquidPatch>) -> TerrainGrid {
        let mut grid = TerrainGrid::new(grid_size);
        let origin = Vec3::new(-grid_size / 2.0, -grid_size / 2.0, 0.0);
        let coord = tile_coord_of(0.0, 0.0, grid_size);
        let side = TILE_CELLS_PER_SIDE + 1;
        grid.insert_tile(TerrainTile {
            coord,
            origin,
            grid_size,
            heights: vec![z; side * side],
            liquid,
        });
        grid
    }

    fn harness(z: f32, grid_size: f32) -> (StaticMapTree, TerrainGrid, Tolerances) {
        (StaticMapTree::new(), flat_terrain(z, grid_size, None), Tolerances::default())
    }

    #[test]
    fn sweep_down_hits_flat_terrain_with_upward_normal() {
        let (map, terrain, tol) = harness(0.0, 32.0);
        let scene = SceneQuery::new(&map, &terrain, &tol);
        let capsule = Capsule::new(Vec3::new(0.0, 0.0, 5.3), Vec3::new(0.0, 0.0, 6.7), 0.3);
        let hits = scene.sweep_capsule(&capsule, Vec3::new(0.0, 0.0, -1.0), 10.0);
        let hit = hits.iter().find(|h| !h.start_penetrating).expect("expected a sweep hit");
        assert!(hit.time > 0.0 && hit.time <= 1.0);
        assert!((hit.distance - hit.time * 10.0).abs() < 1e-3);
        // P2: sweep normal opposes the sweep direction (downward velocity).
        assert!(hit.normal.dot(&Vec3::new(0.0, 0.0, -1.0)) <= 1e-3);
        assert!(hit.normal.z > 0.9);
    }

    #[test]
    fn start_penetrating_hits_sort_before_sweep_hits() {
        let (map, terrain, tol) = harness(0.0, 32.0);
        let scene = SceneQuery::new(&map, &terrain, &tol);
        // Resting exactly on the ground: some contact should already be a
        // start-penetrating discrete overlap at t=0.
        let capsule = Capsule::new(Vec3::new(0.0, 0.0, 0.25), Vec3::new(0.0, 0.0, 1.25), 0.3);
        let hits = scene.sweep_capsule(&capsule, Vec3::new(0.0, 0.0, -1.0), 1.0);
        assert!(!hits.is_empty());
        let first_sweep_idx = hits.iter().position(|h| !h.start_penetrating);
        let last_pen_idx = hits.iter().rposition(|h| h.start_penetrating);
        if let (Some(sweep_idx), Some(pen_idx)) = (first_sweep_idx, last_pen_idx) {
            assert!(pen_idx < sweep_idx, "start-penetrating hits must sort before sweep hits");
        }
    }

    #[test]
    fn overlap_capsule_normal_points_toward_triangle() {
        let (map, terrain, tol) = harness(0.0, 32.0);
        let scene = SceneQuery::new(&map, &terrain, &tol);
        // Capsule resting on the ground plane overlaps it; the overlap
        // normal points from the capsule axis toward the triangle
        // (downward here, since the ground is below).
        let capsule = Capsule::new(Vec3::new(0.0, 0.0, 0.2), Vec3::new(0.0, 0.0, 1.2), 0.3);
        let hits = scene.overlap_capsule(&capsule, u32::MAX);
        let hit = hits.first().expect("expected an overlap hit");
        let mid = capsule.center();
        assert!(hit.normal.dot(&(hit.point - mid)) <= 1e-3);
    }

    #[test]
    fn sweep_z_window_excludes_distant_contacts() {
        // Ground is far below the capsule's step-down window; a long sweep
        // distance alone shouldn't surface it as a contact for a short,
        // step-scaled query (the z-window gate is distance-in-z, not
        // distance-in-time).
        let (map, terrain, tol) = harness(-50.0, 32.0);
        let scene = SceneQuery::new(&map, &terrain, &tol);
        let capsule = Capsule::new(Vec3::new(0.0, 0.0, 0.3), Vec3::new(0.0, 0.0, 1.7), 0.3);
        let hits = scene.sweep_capsule(&capsule, Vec3::new(0.0, 0.0, -1.0), 100.0);
        let _ = tol;
        assert!(hits.is_empty(), "ground far outside the z-window must not surface a contact");
    }

    #[test]
    fn liquid_evaluation_classifies_swimming_when_submerged() {
        let (map, terrain, tol) =
            (StaticMapTree::new(), flat_terrain(0.0, 32.0, Some(LiquidPatch { level: 5.0, type_id: LIQUID_TYPE_WATER })), Tolerances::default());
        let scene = SceneQuery::new(&map, &terrain, &tol);
        // P8: isSwimming <=> liquidLevel - z > 0 and type == water (this
        // call doesn't know about grounded state; the orchestrator ANDs in
        // `!isGrounded` itself).
        let deep = scene.evaluate_liquid_at(0.0, 0.0, 1.0, 2.0);
        assert!(deep.is_swimming);
        assert_eq!(deep.type_id, LIQUID_TYPE_WATER);

        // Head above the liquid surface: not swimming regardless of type.
        let above = scene.evaluate_liquid_at(0.0, 0.0, 5.5, 2.0);
        assert!(!above.is_swimming);
        assert!(above.has_level);
    }

    #[test]
    fn liquid_evaluation_ignores_non_water_types() {
        let (map, terrain, tol) =
            (StaticMapTree::new(), flat_terrain(0.0, 32.0, Some(LiquidPatch { level: 5.0, type_id: LIQUID_TYPE_WATER + 1 })), Tolerances::default());
        let scene = SceneQuery::new(&map, &terrain, &tol);
        let info = scene.evaluate_liquid_at(0.0, 0.0, 1.0, 2.0);
        assert!(info.has_level);
        assert!(!info.is_swimming);
    }

    #[test]
    fn liquid_evaluation_reports_none_outside_loaded_tile() {
        let (map, terrain, tol) = harness(0.0, 32.0);
        let scene = SceneQuery::new(&map, &terrain, &tol);
        let far = scene.evaluate_liquid_at(10_000.0, 10_000.0, 0.0, 2.0);
        assert!(!far.has_level);
        assert!(!far.is_swimming);
    }

    #[test]
    fn unused_import_guard() {
        let _ = TileCoord { x: 0, y: 0 };
    }
}
