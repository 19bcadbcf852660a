//! Grid geometry.
//!
//! A [`Grid`] splits an area into `dim × dim` equal cells.  Cell sizes use
//! integer division, so any remainder pixels on the right and bottom edges
//! are never scanned (none for 288 / 2 / 3).

use turret_types::{GRID_DIM, ImageDescriptor, Region};

/// `dim × dim` partition of `area`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    area: Region,
    dim: u8,
}

impl Grid {
    pub fn new(area: Region, dim: u8) -> Self {
        Self { area, dim }
    }

    pub fn dim(&self) -> u8 {
        self.dim
    }

    /// `(width, height)` of one cell.
    pub fn cell_size(&self) -> (u32, u32) {
        let d = u32::from(self.dim.max(1));
        (self.area.width / d, self.area.height / d)
    }

    /// Pixel rectangle of cell `(row, col)`.
    pub fn cell(&self, row: u8, col: u8) -> Region {
        let (w, h) = self.cell_size();
        Region::new(
            self.area.x + u32::from(col) * w,
            self.area.y + u32::from(row) * h,
            w,
            h,
        )
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u8, u8, Region)> + '_ {
        (0..self.dim).flat_map(move |row| (0..self.dim).map(move |col| (row, col, self.cell(row, col))))
    }
}

/// The global 3×3 grid over `image`.
pub fn global_grid(image: &ImageDescriptor) -> Grid {
    Grid::new(image.full_region(), GRID_DIM)
}

/// Global `(row, col)` of the pixel `(x, y)`: `floor(coord * 3 / dim)`,
/// clamped to the last cell.
pub fn global_cell(image: &ImageDescriptor, x: u32, y: u32) -> (u8, u8) {
    let dim = u64::from(GRID_DIM);
    let last = dim - 1;
    let col = (u64::from(x) * dim / u64::from(image.width.max(1))).min(last);
    let row = (u64::from(y) * dim / u64::from(image.height.max(1))).min(last);
    (row as u8, col as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageDescriptor {
        ImageDescriptor::new(288, 288, 1)
    }

    #[test]
    fn global_cells_are_96_pixels() {
        let grid = global_grid(&image());
        assert_eq!(grid.cell_size(), (96, 96));
        assert_eq!(grid.cell(1, 1), Region::new(96, 96, 96, 96));
        assert_eq!(grid.cell(2, 0), Region::new(0, 192, 96, 96));
    }

    #[test]
    fn cells_iterate_row_major() {
        let order: Vec<(u8, u8)> = global_grid(&image()).cells().map(|(r, c, _)| (r, c)).collect();
        assert_eq!(order[0], (0, 0));
        assert_eq!(order[1], (0, 1));
        assert_eq!(order[3], (1, 0));
        assert_eq!(order.len(), 9);
    }

    #[test]
    fn quadrant_subgrid() {
        let quadrants = Grid::new(image().full_region(), 2);
        let q = quadrants.cell(1, 1);
        assert_eq!(q, Region::new(144, 144, 144, 144));
        let sub = Grid::new(q, 3);
        assert_eq!(sub.cell(0, 0), Region::new(144, 144, 48, 48));
        assert_eq!(sub.cell(2, 2), Region::new(240, 240, 48, 48));
    }

    #[test]
    fn global_cell_mapping() {
        let img = image();
        assert_eq!(global_cell(&img, 120, 120), (1, 1));
        assert_eq!(global_cell(&img, 95, 96), (1, 0));
        assert_eq!(global_cell(&img, 264, 24), (0, 2));
        assert_eq!(global_cell(&img, 287, 287), (2, 2));
        assert_eq!(global_cell(&img, 400, 0), (0, 2));
    }
}
