//! StaticMapTree: per-map root owning the BIH, the dense model-instance
//! array, tile lifecycle, and point/ray queries against instanced meshes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bih::Bih;
use crate::geometry::kernel::CapsuleRegion;
use crate::geometry::{AABox, Ray, Triangle, Vec3};

/// Stable id reserved for "terrain / no instance".
pub const TERRAIN_INSTANCE_ID: u32 = 0;

/// Indexed mesh shared across every instance of the same model, reference
/// counted by the map loader.
pub struct WorldModel {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

impl WorldModel {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle(&self, index: usize) -> Option<Triangle> {
        let [i0, i1, i2] = *self.indices.get(index)?;
        Some(Triangle::new(
            *self.vertices.get(i0 as usize)?,
            *self.vertices.get(i1 as usize)?,
            *self.vertices.get(i2 as usize)?,
        ))
    }

    /// Mesh data overlapping a model-local AABB. A real collaborator would
    /// maintain its own per-model BIH over triangle bounds for large meshes;
    /// this scans linearly and is correct for any mesh size, falling back
    /// to "the full mesh" when called with an unbounded box.
    pub fn mesh_data_in_bounds(&self, local_aabb: &AABox) -> Vec<(usize, Triangle)> {
        self.indices
            .iter()
            .enumerate()
            .filter_map(|(i, _)| {
                let tri = self.triangle(i)?;
                if tri.aabox().intersects(local_aabb) {
                    Some((i, tri))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A placed instance of a shared `WorldModel`.
#[derive(Clone)]
pub struct ModelInstance {
    pub id: u32,
    pub transform: crate::coords::ModelTransform,
    pub world_aabox: AABox,
    pub model: Option<Arc<WorldModel>>,
    pub collision_mask: u32,
}

/// Contact record returned by `SceneQuery` operations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneHit {
    pub point: Vec3,
    pub normal: Vec3,
    /// Time-of-impact in [0, 1]; only meaningful for sweeps.
    pub time: f32,
    pub distance: f32,
    /// 0 = terrain.
    pub source_instance_id: u32,
    pub triangle_index: u32,
    pub start_penetrating: bool,
    pub penetration_depth: f32,
    pub capsule_region: CapsuleRegion,
    pub normal_flipped: bool,
}

/// Per-map container: BIH over instance bounds, the dense instance array,
/// loaded-tile bookkeeping, and per-instance reference counts.
pub struct StaticMapTree {
    instances: Vec<ModelInstance>,
    bih: Bih,
    loaded_tiles: std::collections::HashSet<(u32, u32)>,
    ref_counts: HashMap<u32, u32>,
}

impl StaticMapTree {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            bih: Bih::build(&[]),
            loaded_tiles: Default::default(),
            ref_counts: Default::default(),
        }
    }

    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    fn rebuild_bih(&mut self) {
        let entries: Vec<(u32, AABox)> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.model.is_some())
            .map(|(i, inst)| (i as u32, inst.world_aabox))
            .collect();
        self.bih = Bih::build(&entries);
    }

    /// Idempotent: loading an already-loaded tile only increments reference
    /// counts on instances newly visible from it (the caller supplies the
    /// instances this tile introduces).
    pub fn load_tile(&mut self, tile_x: u32, tile_y: u32, tile_instances: Vec<ModelInstance>) {
        if !self.loaded_tiles.insert((tile_x, tile_y)) {
            return;
        }
        for inst in tile_instances {
            *self.ref_counts.entry(inst.id).or_insert(0) += 1;
            if !self.instances.iter().any(|existing| existing.id == inst.id) {
                self.instances.push(inst);
            }
        }
        self.rebuild_bih();
    }

    /// Decrements reference counts for the tile's instances; an instance
    /// whose count reaches zero is marked unloaded (`model = None`) but its
    /// slot is retained so ids stay stable.
    pub fn unload_tile(&mut self, tile_x: u32, tile_y: u32, tile_instance_ids: &[u32]) {
        if !self.loaded_tiles.remove(&(tile_x, tile_y)) {
            return;
        }
        for &id in tile_instance_ids {
            if let Some(count) = self.ref_counts.get_mut(&id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    if let Some(inst) = self.instances.iter_mut().find(|i| i.id == id) {
                        inst.model = None;
                    }
                }
            }
        }
        self.rebuild_bih();
    }

    pub fn query_aabb(&self, query: &AABox) -> Vec<u32> {
        self.bih.query_aabb(query)
    }

    /// Downward raycast in map-internal space; returns the z of the first
    /// hit, or `f32::NEG_INFINITY` when nothing is hit within `max_search_dist`.
    pub fn get_height(&self, point: Vec3, max_search_dist: f32) -> f32 {
        let ray = Ray::new(point + Vec3::new(0.0, 0.0, max_search_dist), Vec3::new(0.0, 0.0, -1.0));
        let mut best = f32::NEG_INFINITY;
        let mut max_dist = 2.0 * max_search_dist;
        for idx in self.query_aabb(&ray_bounds(&ray, max_dist)) {
            let Some(inst) = self.instances.get(idx as usize) else {
                continue;
            };
            let Some(model) = &inst.model else { continue };
            let local_origin = inst.transform.to_local(ray.origin);
            let local_dir = inst.transform.to_local_dir(ray.dir);
            let local_ray = Ray::new(local_origin, local_dir);
            let local_max_dist = max_dist * inst.transform.inv_scale();
            for (_, tri) in model.mesh_data_in_bounds(&local_ray_box(&local_ray, local_max_dist)) {
                if let Some((t, _)) = ray_triangle(&local_ray, &tri) {
                    if t > local_max_dist {
                        continue;
                    }
                    let world_hit = inst.transform.to_parent(local_ray.at(t));
                    if world_hit.z > best {
                        best = world_hit.z;
                        max_dist = max_dist.min(t * inst.transform.scale);
                    }
                }
            }
        }
        best
    }

    pub fn is_in_line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let (ray, dist) = Ray::between(from, to);
        if dist < 1e-6 {
            return true;
        }
        for idx in self.query_aabb(&ray_bounds(&ray, dist)) {
            let Some(inst) = self.instances.get(idx as usize) else {
                continue;
            };
            let Some(model) = &inst.model else { continue };
            let local_origin = inst.transform.to_local(ray.origin);
            let local_dir = inst.transform.to_local_dir(ray.dir);
            let local_ray = Ray::new(local_origin, local_dir);
            // Rotation preserves length; only the uniform scale rescales
            // distances when moving into model-local space.
            let local_dist = dist * inst.transform.inv_scale();
            for (_, tri) in model.mesh_data_in_bounds(&local_ray_box(&local_ray, local_dist)) {
                if ray_triangle(&local_ray, &tri).is_some_and(|(t, _)| t <= local_dist) {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for StaticMapTree {
    fn default() -> Self {
        Self::new()
    }
}

fn ray_bounds(ray: &Ray, max_dist: f32) -> AABox {
    AABox::from_point(ray.origin).merge_point(ray.at(max_dist))
}

fn local_ray_box(ray: &Ray, max_dist: f32) -> AABox {
    ray_bounds(ray, max_dist).inflate(1e-3)
}

/// Moller-Trumbore ray/triangle intersection, returning `(t, barycentric)`.
fn ray_triangle(ray: &Ray, tri: &Triangle) -> Option<(f32, (f32, f32, f32))> {
    let edge1 = tri.b - tri.a;
    let edge2 = tri.c - tri.a;
    let pvec = ray.dir.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.origin - tri.a;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&edge1);
    let v = ray.dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(&qvec) * inv_det;
    if t < 0.0 {
        return None;
    }
    Some((t, (1.0 - u - v, u, v)))
}

/// Point-in-volume area classification. The core only knows how to report
/// the enclosing instance's id and mask; richer ADT-style flags are
/// supplied by the caller's own area table keyed on `adt_id`/`root_id`/`group_id`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaInfo {
    pub flags: u32,
    pub adt_id: u32,
    pub root_id: u32,
    pub group_id: u32,
    pub ground_z: f32,
}

impl StaticMapTree {
    pub fn get_area_info(&self, point: Vec3) -> Option<AreaInfo> {
        let candidates = self.query_aabb(&AABox::from_point(point));
        let inst = candidates
            .into_iter()
            .filter_map(|idx| self.instances.get(idx as usize))
            .filter(|inst| inst.model.is_some() && inst.world_aabox.contains(point))
            .max_by(|a, b| a.world_aabox.high.z.total_cmp(&b.world_aabox.high.z))?;
        Some(AreaInfo {
            flags: inst.collision_mask,
            adt_id: 0,
            root_id: inst.id,
            group_id: 0,
            ground_z: inst.world_aabox.high.z,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::ModelTransform;
    use nalgebra as na;

    /// A flat 10x10 quad centered on the origin, sitting at `z`.
    fn floor_instance(id: u32, z: f32) -> ModelInstance {
        let (a, b, c, d) = (
            Vec3::new(-5.0, -5.0, z),
            Vec3::new(5.0, -5.0, z),
            Vec3::new(5.0, 5.0, z),
            Vec3::new(-5.0, 5.0, z),
        );
        let world_aabox = AABox::from_point(a).merge_point(b).merge_point(c).merge_point(d);
        let model = WorldModel::new(vec![a, b, c, d], vec![[0, 1, 2], [0, 2, 3]]);
        ModelInstance {
            id,
            transform: ModelTransform::new(Vec3::zeros(), na::UnitQuaternion::identity(), 1.0),
            world_aabox,
            model: Some(Arc::new(model)),
            collision_mask: u32::MAX,
        }
    }

    #[test]
    fn get_height_finds_floor_below_point() {
        let mut map = StaticMapTree::new();
        map.load_tile(0, 0, vec![floor_instance(1, 3.0)]);
        let h = map.get_height(Vec3::new(0.0, 0.0, 10.0), 50.0);
        assert!((h - 3.0).abs() < 1e-3);
    }

    #[test]
    fn get_height_returns_neg_infinity_with_nothing_loaded() {
        let map = StaticMapTree::new();
        assert_eq!(map.get_height(Vec3::new(0.0, 0.0, 10.0), 50.0), f32::NEG_INFINITY);
    }

    #[test]
    fn line_of_sight_blocked_by_intervening_floor() {
        let mut map = StaticMapTree::new();
        map.load_tile(0, 0, vec![floor_instance(1, 0.0)]);
        assert!(!map.is_in_line_of_sight(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0)));
        assert!(map.is_in_line_of_sight(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 0.0, 5.0)));
    }

    #[test]
    fn unload_tile_zeroes_model_once_refcount_drops() {
        let mut map = StaticMapTree::new();
        let inst = floor_instance(7, 0.0);
        map.load_tile(0, 0, vec![inst.clone()]);
        // A second tile referencing the same instance id keeps it alive
        // after the first tile unloads.
        map.load_tile(0, 1, vec![inst.clone()]);
        assert!(map.instances().iter().any(|i| i.id == 7 && i.model.is_some()));

        map.unload_tile(0, 0, &[7]);
        assert!(
            map.instances().iter().any(|i| i.id == 7 && i.model.is_some()),
            "instance still referenced by a second loaded tile must stay resident"
        );

        map.unload_tile(0, 1, &[7]);
        assert!(
            map.instances().iter().any(|i| i.id == 7 && i.model.is_none()),
            "instance with no remaining references must be unloaded"
        );
    }

    #[test]
    fn loading_same_tile_twice_is_idempotent() {
        let mut map = StaticMapTree::new();
        let inst = floor_instance(1, 0.0);
        map.load_tile(0, 0, vec![inst.clone()]);
        map.load_tile(0, 0, vec![inst]);
        assert_eq!(map.instances().len(), 1);
    }
}
