use std::sync::Arc;

use thiserror::Error;

use super::animation::SpriteSheet;
use super::canvas::{world_to_screen, Canvas, BACKDROP_TILE_COLOR, SOLID_TILE_COLOR};
use super::geometry::Rect;
use super::node::Node;

pub const DEFAULT_TILE_SIZE: i32 = 8;
pub const EMPTY_CELL: i32 = -1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(i32),
}

/// Row-major table of cell codes. `-1` is empty, anything `>= 0` is a tile id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    columns: usize,
    rows: usize,
    cells: Vec<i32>,
}

impl TileGrid {
    pub fn new(columns: usize, rows: usize, cells: Vec<i32>) -> Result<Self, TilemapError> {
        let expected = columns * rows;
        let actual = cells.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            columns,
            rows,
            cells,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell(&self, column: i32, row: i32) -> Option<i32> {
        if column < 0 || row < 0 {
            return None;
        }
        let (column, row) = (column as usize, row as usize);
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.columns + column).copied()
    }
}

/// Unit-tile rectangle moved onto each candidate cell during a broad-phase scan.
#[derive(Debug, Clone, Copy)]
pub struct TileProbe {
    bounds: Rect,
}

impl TileProbe {
    pub fn new(tile_size: i32) -> Self {
        Self {
            bounds: Rect::new(0, 0, tile_size, tile_size),
        }
    }

    pub fn move_to(&mut self, x: i32, y: i32) {
        self.bounds.x = x;
        self.bounds.y = y;
    }

    pub fn bounds(&self) -> &Rect {
        &self.bounds
    }
}

/// One map layer anchored at the level origin.
///
/// Pixel coordinates map to cells with floor division, so anything left of or
/// above the origin is outside the grid.
#[derive(Debug, Clone)]
pub struct TileLayer {
    grid: TileGrid,
    tile_size: i32,
    solid: bool,
    sheet: Option<Arc<SpriteSheet>>,
}

impl TileLayer {
    pub fn new(grid: TileGrid, tile_size: i32, solid: bool) -> Result<Self, TilemapError> {
        if tile_size <= 0 {
            return Err(TilemapError::InvalidTileSize(tile_size));
        }
        Ok(Self {
            grid,
            tile_size,
            solid,
            sheet: None,
        })
    }

    pub fn with_sheet(mut self, sheet: Option<Arc<SpriteSheet>>) -> Self {
        self.sheet = sheet;
        self
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn is_solid_layer(&self) -> bool {
        self.solid
    }

    pub fn width_px(&self) -> i32 {
        self.grid.columns() as i32 * self.tile_size
    }

    pub fn height_px(&self) -> i32 {
        self.grid.rows() as i32 * self.tile_size
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width_px(), self.height_px())
    }

    fn cell_at_px(&self, x: i32, y: i32) -> Option<(i32, i32, i32)> {
        let column = x.div_euclid(self.tile_size);
        let row = y.div_euclid(self.tile_size);
        self.grid.cell(column, row).map(|code| (column, row, code))
    }

    pub fn solid_at(&self, x: i32, y: i32) -> bool {
        self.solid
            && self
                .cell_at_px(x, y)
                .is_some_and(|(_, _, code)| code >= 0)
    }

    /// Conservative broad phase: samples every half tile across `other`'s
    /// bounds grown by one tile, then tests the exact cell rectangle.
    pub fn collides_with(&self, other: &Node) -> bool {
        if !self.solid {
            return false;
        }

        let stride = (self.tile_size / 2).max(1);
        let area = other.bounds.expanded(self.tile_size);
        let mut probe = TileProbe::new(self.tile_size);

        let mut y = area.y;
        while y <= area.bottom() {
            let mut x = area.x;
            while x <= area.right() {
                if let Some((column, row, code)) = self.cell_at_px(x, y) {
                    if code >= 0 {
                        probe.move_to(column * self.tile_size, row * self.tile_size);
                        if other.collides_with_rect(probe.bounds()) {
                            return true;
                        }
                    }
                }
                x += stride;
            }
            y += stride;
        }
        false
    }

    fn tile_sample(&self, sheet: &SpriteSheet, code: i32) -> Rect {
        let sheet_columns = (sheet.width() as i32 / self.tile_size).max(1);
        Rect::new(
            (code % sheet_columns) * self.tile_size,
            (code / sheet_columns) * self.tile_size,
            self.tile_size,
            self.tile_size,
        )
    }

    pub(crate) fn draw(&self, canvas: &mut dyn Canvas, camera: &Rect) {
        if self.grid.columns() == 0 || self.grid.rows() == 0 {
            return;
        }
        let t = self.tile_size;
        let first_column = camera.x.div_euclid(t).max(0);
        let first_row = camera.y.div_euclid(t).max(0);
        let last_column = (camera.right() - 1)
            .div_euclid(t)
            .min(self.grid.columns() as i32 - 1);
        let last_row = (camera.bottom() - 1)
            .div_euclid(t)
            .min(self.grid.rows() as i32 - 1);

        for row in first_row..=last_row {
            for column in first_column..=last_column {
                let Some(code) = self.grid.cell(column, row) else {
                    continue;
                };
                if code < 0 {
                    continue;
                }
                let dest = world_to_screen(Rect::new(column * t, row * t, t, t), camera);
                match &self.sheet {
                    Some(sheet) => canvas.blit(sheet, self.tile_sample(sheet, code), dest, false),
                    None if self.solid => canvas.fill_rect(dest, SOLID_TILE_COLOR),
                    None => canvas.fill_rect(dest, BACKDROP_TILE_COLOR),
                }
            }
        }
    }
}

/// Tile map metadata. The layers themselves are child nodes; `solid_layer`
/// indexes the one that answers solidity queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tilemap {
    pub solid_layer: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::canvas::recording::{DrawOp, RecordingCanvas};
    use crate::scene::node::{NodeFlags, NodeId, NodeKind};

    fn layer(columns: usize, rows: usize, cells: Vec<i32>, solid: bool) -> TileLayer {
        let grid = TileGrid::new(columns, rows, cells).expect("grid");
        TileLayer::new(grid, 8, solid).expect("layer")
    }

    fn body(bounds: Rect) -> Node {
        Node::new(NodeId::new(1), bounds, NodeFlags::COLLIDABLE, NodeKind::Group)
    }

    #[test]
    fn grid_rejects_wrong_cell_count() {
        assert_eq!(
            TileGrid::new(2, 2, vec![0; 3]),
            Err(TilemapError::TileCountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn layer_rejects_non_positive_tile_size() {
        let grid = TileGrid::new(1, 1, vec![0]).expect("grid");
        assert!(matches!(
            TileLayer::new(grid, 0, true),
            Err(TilemapError::InvalidTileSize(0))
        ));
    }

    #[test]
    fn solid_at_matches_cell_lookup_across_boundaries() {
        let cells = vec![
            0, -1, 3, //
            -1, 7, -1,
        ];
        let layer = layer(3, 2, cells.clone(), true);

        for y in -10..26 {
            for x in -10..34 {
                let expected = if x < 0 || y < 0 {
                    false
                } else {
                    let (column, row) = ((x / 8) as usize, (y / 8) as usize);
                    column < 3 && row < 2 && cells[row * 3 + column] >= 0
                };
                assert_eq!(layer.solid_at(x, y), expected, "mismatch at ({x}, {y})");
            }
        }
    }

    #[test]
    fn non_solid_layer_never_reports_solid() {
        let layer = layer(1, 1, vec![5], false);
        assert!(!layer.solid_at(0, 0));
        assert!(!layer.collides_with(&body(Rect::new(0, 0, 8, 8))));
    }

    #[test]
    fn layer_metrics_derive_from_grid() {
        let layer = layer(4, 3, vec![-1; 12], true);
        assert_eq!(layer.width_px(), 32);
        assert_eq!(layer.height_px(), 24);
        assert_eq!(layer.bounds(), Rect::new(0, 0, 32, 24));
    }

    #[test]
    fn collision_detects_single_pixel_overlap_at_tile_edges() {
        // Lone solid tile at cell (2, 2), pixels [16, 24) on both axes.
        let mut cells = vec![-1; 25];
        cells[2 * 5 + 2] = 0;
        let layer = layer(5, 5, cells, true);

        for (x, y) in [(9, 16), (23, 16), (16, 9), (16, 23), (9, 9), (23, 23)] {
            assert!(
                layer.collides_with(&body(Rect::new(x, y, 8, 8))),
                "expected hit at ({x}, {y})"
            );
        }
        for (x, y) in [(8, 16), (24, 16), (16, 8), (16, 24)] {
            assert!(
                !layer.collides_with(&body(Rect::new(x, y, 8, 8))),
                "expected miss at ({x}, {y})"
            );
        }
    }

    #[test]
    fn collision_finds_tile_straddled_by_narrow_body() {
        let mut cells = vec![-1; 9];
        cells[4] = 1;
        let layer = layer(3, 3, cells, true);
        assert!(layer.collides_with(&body(Rect::new(15, 12, 2, 1))));
    }

    #[test]
    fn collision_requires_collidable_body() {
        let layer = layer(1, 1, vec![0], true);
        let ghost = Node::new(
            NodeId::new(1),
            Rect::new(0, 0, 8, 8),
            NodeFlags::empty(),
            NodeKind::Group,
        );
        assert!(!layer.collides_with(&ghost));
    }

    #[test]
    fn draw_uses_placeholder_fill_without_sheet() {
        let layer = layer(2, 1, vec![0, -1], true);
        let mut canvas = RecordingCanvas::default();
        layer.draw(&mut canvas, &Rect::new(4, 0, 16, 8));

        assert_eq!(
            canvas.ops,
            vec![DrawOp::Fill(Rect::new(-4, 0, 8, 8), SOLID_TILE_COLOR)]
        );
    }

    #[test]
    fn draw_samples_sheet_by_tile_code() {
        let sheet = Arc::new(SpriteSheet::new("tiles", 16, 16, vec![0; 16 * 16 * 4]));
        let layer = layer(1, 1, vec![3], false).with_sheet(Some(sheet));
        let mut canvas = RecordingCanvas::default();
        layer.draw(&mut canvas, &Rect::new(0, 0, 8, 8));

        assert_eq!(
            canvas.ops,
            vec![DrawOp::Blit {
                sheet: "tiles".to_string(),
                sample: Rect::new(8, 8, 8, 8),
                dest: Rect::new(0, 0, 8, 8),
                flipped: false,
            }]
        );
    }
}
