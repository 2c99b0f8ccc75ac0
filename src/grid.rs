// SPDX-License-Identifier: GPL-3.0-or-later
//! The shared pixel grid (spec §3, §4.A).
//!
//! Every cell is guarded by its own lock so that decoders touching
//! different cells never contend with each other, and the frame builder
//! only blocks the one cell it is currently encoding.
use parking_lot::Mutex;

use crate::frame::Snapshot;

/// Valid paint coordinates are `x <= 512` and `y <= 512` inclusive, so the
/// backing array needs 513 slots on each axis.
pub const GRID_EXTENT: usize = 513;

/// Canvas dimensions advertised to subscribers and the `/` page.
pub const CANVAS_WIDTH: usize = 512;
pub const CANVAS_HEIGHT: usize = 512;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Pixel {
    r: u8,
    g: u8,
    b: u8,
    changed: bool,
}

/// A 513x513 grid of mutually-exclusive pixel cells.
///
/// Allocated once at startup and never freed or resized.
pub struct PixelGrid {
    cells: Vec<Mutex<Pixel>>,
}

impl PixelGrid {
    /// Create a grid with every cell initialized to opaque black.
    pub fn new() -> Self {
        let mut cells = Vec::with_capacity(GRID_EXTENT * GRID_EXTENT);
        cells.resize_with(GRID_EXTENT * GRID_EXTENT, || Mutex::new(Pixel::default()));
        Self { cells }
    }

    fn index(x: u16, y: u16) -> usize {
        x as usize * GRID_EXTENT + y as usize
    }

    /// Apply a paint command to cell `(x, y)`.
    ///
    /// Last writer wins: if the color is unchanged from what is already
    /// stored, `changed` is left alone so redundant traffic does not
    /// produce spurious incremental frames.
    ///
    /// Panics if `x` or `y` is outside `0..GRID_EXTENT`; callers must have
    /// already validated `x <= 512 && y <= 512` (see [crate::packet]).
    pub fn apply(&self, x: u16, y: u16, r: u8, g: u8, b: u8) {
        let mut cell = self.cells[Self::index(x, y)].lock();
        if cell.r != r || cell.g != g || cell.b != b {
            cell.r = r;
            cell.g = g;
            cell.b = b;
            cell.changed = true;
        }
    }

    /// Walk every cell in row-major order, producing a full frame (if
    /// `full_needed`) and/or an incremental frame (if `incremental_needed`
    /// and at least one cell has changed since the last incremental
    /// snapshot that included it).
    ///
    /// Clearing `changed` happens here, under the per-cell lock, so a full
    /// and incremental snapshot taken together never leave a stale dirty
    /// flag: the incremental pass always consumes the dirty signal.
    pub fn snapshot(&self, full_needed: bool, incremental_needed: bool) -> Snapshot {
        let mut builder = Snapshot::builder(full_needed);
        let mut any_change = false;
        for x in 0..GRID_EXTENT as u16 {
            for y in 0..GRID_EXTENT as u16 {
                let mut cell = self.cells[Self::index(x, y)].lock();
                if incremental_needed && cell.changed {
                    cell.changed = false;
                    any_change = true;
                    builder.set_incremental(x, y, cell.r, cell.g, cell.b);
                    builder.set_full(x, y, cell.r, cell.g, cell.b);
                } else if full_needed {
                    builder.set_full(x, y, cell.r, cell.g, cell.b);
                }
            }
        }
        builder.finish(any_change)
    }
}

impl Default for PixelGrid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_grid_is_opaque_black() {
        let grid = PixelGrid::new();
        let snapshot = grid.snapshot(true, false);
        let full = snapshot.full.expect("full frame requested");
        assert_eq!(full.get_pixel(5, 7).0, [0, 0, 0, 255]);
    }

    #[test]
    fn apply_sets_dirty_flag_once() {
        let grid = PixelGrid::new();
        grid.apply(5, 7, 0xAA, 0xBB, 0xCC);
        let snap1 = grid.snapshot(false, true);
        assert!(snap1.incremental.is_some());
        let snap2 = grid.snapshot(false, true);
        assert!(snap2.incremental.is_none());
    }

    #[test]
    fn repeated_identical_paint_does_not_redirty() {
        let grid = PixelGrid::new();
        grid.apply(1, 1, 10, 20, 30);
        let first = grid.snapshot(false, true);
        assert!(first.incremental.is_some());
        // Applying the exact same color again must not re-set `changed`.
        grid.apply(1, 1, 10, 20, 30);
        let second = grid.snapshot(false, true);
        assert!(second.incremental.is_none());
    }

    #[test]
    fn last_writer_wins() {
        let grid = PixelGrid::new();
        grid.apply(2, 2, 1, 1, 1);
        grid.apply(2, 2, 9, 9, 9);
        let snapshot = grid.snapshot(true, false);
        let full = snapshot.full.unwrap();
        assert_eq!(full.get_pixel(2, 2).0, [9, 9, 9, 255]);
    }

    #[test]
    fn boundary_coordinate_512_is_addressable() {
        let grid = PixelGrid::new();
        grid.apply(512, 512, 1, 2, 3);
        // 512 is the last valid index but lies outside the advertised
        // 512x512 image (indices 0..512); the cell is still stored.
        let snapshot = grid.snapshot(true, false);
        assert!(snapshot.full.is_some());
    }
}
