use std::fs;
use std::path::{Path, PathBuf};

use crate::scene::{TileGrid, TileLayer, TilemapError, DEFAULT_TILE_SIZE};

use super::error::LoadError;

const TILES_HIGH_LABEL: &str = "tileshigh";
const TILE_WIDTH_LABEL: &str = "tilewidth";
const LAYER_LABEL: &str = "layer";

/// One parsed layer: the cell table and its tile edge length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedGrid {
    pub grid: TileGrid,
    pub tile_size: i32,
}

impl LoadedGrid {
    pub fn into_layer(self, solid: bool) -> Result<TileLayer, TilemapError> {
        TileLayer::new(self.grid, self.tile_size, solid)
    }
}

/// Source of tile grids keyed by resource name and layer index.
pub trait TileGridProvider {
    fn load_grid(&self, resource: &str, layer: usize) -> Result<LoadedGrid, LoadError>;
}

/// Reads map text files relative to an asset directory.
#[derive(Debug, Clone)]
pub struct MapFiles {
    root: PathBuf,
}

impl MapFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileGridProvider for MapFiles {
    fn load_grid(&self, resource: &str, layer: usize) -> Result<LoadedGrid, LoadError> {
        let path = self.root.join(resource);
        let raw = fs::read_to_string(&path).map_err(|source| LoadError::ReadMap {
            path: path.clone(),
            source,
        })?;
        parse_map_layer(&path, &raw, layer)
    }
}

/// Parse layer `layer` out of map text.
///
/// `tileshigh N` caps how many rows a layer may have, `tilewidth N` sets the
/// tile edge, and `layer K` starts a block of comma separated rows that ends
/// at the first blank line. Headers after the wanted layer are not read.
pub fn parse_map_layer(path: &Path, raw: &str, layer: usize) -> Result<LoadedGrid, LoadError> {
    let mut max_rows: Option<usize> = None;
    let mut tile_size = DEFAULT_TILE_SIZE;
    let mut lines = raw.lines().map(str::trim_end).enumerate();

    while let Some((index, line)) = lines.next() {
        let line_number = index + 1;
        if line.starts_with(TILES_HIGH_LABEL) {
            let rows = parse_labeled_number(path, line, line_number)?;
            max_rows = Some(usize::try_from(rows).unwrap_or(0));
        } else if line.starts_with(TILE_WIDTH_LABEL) {
            tile_size = parse_labeled_number(path, line, line_number)?;
            if tile_size <= 0 {
                return Err(LoadError::InvalidTileSize {
                    path: path.to_path_buf(),
                    size: tile_size,
                });
            }
        } else if line.starts_with(LAYER_LABEL) {
            let found = parse_labeled_number(path, line, line_number)?;
            if usize::try_from(found).ok() != Some(layer) {
                continue;
            }
            let rows = parse_rows(path, layer, lines.by_ref().map(|(_, row)| row), max_rows)?;
            return build_grid(path, layer, rows, tile_size);
        }
    }

    Err(LoadError::MissingLayer {
        path: path.to_path_buf(),
        layer,
    })
}

fn parse_labeled_number(path: &Path, line: &str, line_number: usize) -> Result<i32, LoadError> {
    line.split_whitespace()
        .nth(1)
        .and_then(|value| value.parse::<i32>().ok())
        .ok_or_else(|| LoadError::InvalidHeader {
            path: path.to_path_buf(),
            line: line_number,
        })
}

fn parse_rows<'a>(
    path: &Path,
    layer: usize,
    lines: impl Iterator<Item = &'a str>,
    max_rows: Option<usize>,
) -> Result<Vec<Vec<i32>>, LoadError> {
    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        if max_rows.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let row_index = rows.len();
        let mut row = Vec::new();
        for value in line.split(',').map(str::trim).filter(|value| !value.is_empty()) {
            let code = value
                .parse::<i32>()
                .map_err(|_| LoadError::InvalidCell {
                    path: path.to_path_buf(),
                    layer,
                    row: row_index,
                    column: row.len(),
                    value: value.to_string(),
                })?;
            row.push(code.max(-1));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn build_grid(
    path: &Path,
    layer: usize,
    rows: Vec<Vec<i32>>,
    tile_size: i32,
) -> Result<LoadedGrid, LoadError> {
    let Some(columns) = rows.first().map(Vec::len) else {
        return Err(LoadError::MissingLayer {
            path: path.to_path_buf(),
            layer,
        });
    };
    if let Some((row, cells)) = rows
        .iter()
        .enumerate()
        .find(|(_, cells)| cells.len() != columns)
    {
        return Err(LoadError::RaggedLayer {
            path: path.to_path_buf(),
            layer,
            row,
            expected: columns,
            actual: cells.len(),
        });
    }

    let row_count = rows.len();
    let cells = rows.into_iter().flatten().collect();
    let grid = TileGrid::new(columns, row_count, cells).map_err(|source| LoadError::InvalidGrid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(LoadedGrid { grid, tile_size })
}
