//! TerrainGrid: per-map uniform grid of terrain tiles.
//!
//! Each map is 64x64 tiles; each tile is a fixed-resolution 16x16x2
//! triangle mesh (two triangles per grid cell). Tile coordinates are
//! derived as `tileX = floor((mid - y) / gridSize)`,
//! `tileY = floor((mid - x) / gridSize)`, `mid = 32 * gridSize`.

use crate::geometry::{AABox, Triangle, Vec3};

pub const TILES_PER_SIDE: u32 = 64;
pub const TILE_CELLS_PER_SIDE: usize = 16;
pub const TRIANGLES_PER_CELL: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

pub fn tile_coord_of(x: f32, y: f32, grid_size: f32) -> TileCoord {
    let mid = 32.0 * grid_size;
    TileCoord {
        x: ((mid - y) / grid_size).floor() as u32,
        y: ((mid - x) / grid_size).floor() as u32,
    }
}

/// A terrain triangle as returned by `trianglesIn`; carries the originating
/// tile so callers can cross-reference height/liquid samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainTriangle {
    pub tile: TileCoord,
    pub cell_index: u16,
    pub triangle: Triangle,
}

/// Height samples for one tile, laid out as `(TILE_CELLS_PER_SIDE+1)^2`
/// vertices (a regular grid), with liquid data sampled at the same
/// resolution.
pub struct TerrainTile {
    pub coord: TileCoord,
    pub origin: Vec3,
    pub grid_size: f32,
    /// `(TILE_CELLS_PER_SIDE + 1) * (TILE_CELLS_PER_SIDE + 1)` height samples.
    pub heights: Vec<f32>,
    pub liquid: Option<LiquidPatch>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LiquidPatch {
    pub level: f32,
    pub type_id: u32,
}

impl TerrainTile {
    fn cell_size(&self) -> f32 {
        self.grid_size / TILE_CELLS_PER_SIDE as f32
    }

    fn sample_height(&self, ix: usize, iy: usize) -> f32 {
        let side = TILE_CELLS_PER_SIDE + 1;
        self.heights[iy * side + ix]
    }

    /// Bilinear height sample at world (x, y), or `None` when outside this
    /// tile's footprint.
    pub fn height_at(&self, x: f32, y: f32) -> Option<f32> {
        let local_x = (x - self.origin.x) / self.cell_size();
        let local_y = (y - self.origin.y) / self.cell_size();
        if local_x < 0.0
            || local_y < 0.0
            || local_x > TILE_CELLS_PER_SIDE as f32
            || local_y > TILE_CELLS_PER_SIDE as f32
        {
            return None;
        }
        let ix = (local_x.floor() as usize).min(TILE_CELLS_PER_SIDE - 1);
        let iy = (local_y.floor() as usize).min(TILE_CELLS_PER_SIDE - 1);
        let fx = local_x - ix as f32;
        let fy = local_y - iy as f32;
        let h00 = self.sample_height(ix, iy);
        let h10 = self.sample_height(ix + 1, iy);
        let h01 = self.sample_height(ix, iy + 1);
        let h11 = self.sample_height(ix + 1, iy + 1);
        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        Some(h0 * (1.0 - fy) + h1 * fy)
    }

    /// The two triangles composing grid cell `(ix, iy)`.
    pub fn cell_triangles(&self, ix: usize, iy: usize) -> [Triangle; TRIANGLES_PER_CELL] {
        let cell = self.cell_size();
        let x0 = self.origin.x + ix as f32 * cell;
        let y0 = self.origin.y + iy as f32 * cell;
        let v00 = Vec3::new(x0, y0, self.sample_height(ix, iy));
        let v10 = Vec3::new(x0 + cell, y0, self.sample_height(ix + 1, iy));
        let v01 = Vec3::new(x0, y0 + cell, self.sample_height(ix, iy + 1));
        let v11 = Vec3::new(x0 + cell, y0 + cell, self.sample_height(ix + 1, iy + 1));
        [Triangle::new(v00, v10, v11), Triangle::new(v00, v11, v01)]
    }

    pub fn triangles_in(&self, xy_box: (Vec3, Vec3)) -> Vec<TerrainTriangle> {
        let cell = self.cell_size();
        let mut out = Vec::new();
        for iy in 0..TILE_CELLS_PER_SIDE {
            for ix in 0..TILE_CELLS_PER_SIDE {
                let cell_lo = Vec3::new(
                    self.origin.x + ix as f32 * cell,
                    self.origin.y + iy as f32 * cell,
                    0.0,
                );
                let cell_hi = cell_lo + Vec3::new(cell, cell, 0.0);
                if cell_hi.x < xy_box.0.x
                    || cell_lo.x > xy_box.1.x
                    || cell_hi.y < xy_box.0.y
                    || cell_lo.y > xy_box.1.y
                {
                    continue;
                }
                for (i, tri) in self.cell_triangles(ix, iy).into_iter().enumerate() {
                    out.push(TerrainTriangle {
                        tile: self.coord,
                        cell_index: (iy * TILE_CELLS_PER_SIDE + ix) as u16 * 2 + i as u16,
                        triangle: tri,
                    });
                }
            }
        }
        out
    }
}

/// Per-map collection of loaded terrain tiles.
#[derive(Default)]
pub struct TerrainGrid {
    pub grid_size: f32,
    tiles: std::collections::HashMap<TileCoord, TerrainTile>,
}

impl TerrainGrid {
    pub fn new(grid_size: f32) -> Self {
        Self {
            grid_size,
            tiles: Default::default(),
        }
    }

    pub fn insert_tile(&mut self, tile: TerrainTile) {
        self.tiles.insert(tile.coord, tile);
    }

    pub fn remove_tile(&mut self, coord: TileCoord) {
        self.tiles.remove(&coord);
    }

    /// Bilinear sample of the terrain patch at (x, y). Returns `None`
    /// (mapped to the ABI's `INVALID` sentinel by callers) when no loaded
    /// tile covers the point.
    pub fn height_at(&self, x: f32, y: f32) -> Option<f32> {
        let coord = tile_coord_of(x, y, self.grid_size);
        self.tiles.get(&coord).and_then(|t| t.height_at(x, y))
    }

    pub fn liquid_at(&self, x: f32, y: f32) -> Option<LiquidPatch> {
        let coord = tile_coord_of(x, y, self.grid_size);
        self.tiles.get(&coord)?.liquid
    }

    /// Terrain triangles overlapping an XY box, spanning however many tiles
    /// the box touches.
    pub fn triangles_in(&self, xy_box_lo: Vec3, xy_box_hi: Vec3) -> Vec<TerrainTriangle> {
        let min_coord = tile_coord_of(xy_box_lo.x, xy_box_hi.y, self.grid_size);
        let max_coord = tile_coord_of(xy_box_hi.x, xy_box_lo.y, self.grid_size);
        let (x_lo, x_hi) = (min_coord.x.min(max_coord.x), min_coord.x.max(max_coord.x));
        let (y_lo, y_hi) = (min_coord.y.min(max_coord.y), min_coord.y.max(max_coord.y));
        let mut out = Vec::new();
        for ty in y_lo..=y_hi {
            for tx in x_lo..=x_hi {
                if let Some(tile) = self.tiles.get(&TileCoord { x: tx, y: ty }) {
                    out.extend(tile.triangles_in((xy_box_lo, xy_box_hi)));
                }
            }
        }
        out
    }

    pub fn bounds_box(lo: (f32, f32), hi: (f32, f32)) -> AABox {
        AABox::new(Vec3::new(lo.0, lo.1, f32::MIN), Vec3::new(hi.0, hi.1, f32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_tile(coord: TileCoord, origin: Vec3, grid_size: f32, z: f32) -> TerrainTile {
        let side = TILE_CELLS_PER_SIDE + 1;
        TerrainTile {
            coord,
            origin,
            grid_size,
            heights: vec![z; side * side],
            liquid: None,
        }
    }

    #[test]
    fn flat_tile_height_is_constant() {
        let tile = flat_tile(TileCoord { x: 0, y: 0 }, Vec3::new(0.0, 0.0, 0.0), 16.0, 5.0);
        let h = tile.height_at(3.3, 9.9).unwrap();
        assert!((h - 5.0).abs() < 1e-5);
    }

    #[test]
    fn height_outside_tile_is_none() {
        let tile = flat_tile(TileCoord { x: 0, y: 0 }, Vec3::new(0.0, 0.0, 0.0), 16.0, 5.0);
        assert!(tile.height_at(-1.0, -1.0).is_none());
    }

    #[test]
    fn grid_samples_loaded_tile() {
        let mut grid = TerrainGrid::new(533.333_3);
        let coord = tile_coord_of(0.0, 0.0, grid.grid_size);
        grid.insert_tile(flat_tile(coord, Vec3::new(-8.0, -8.0, 0.0), 16.0, 2.5));
        assert!((grid.height_at(0.0, 0.0).unwrap() - 2.5).abs() < 1e-4);
    }
}
