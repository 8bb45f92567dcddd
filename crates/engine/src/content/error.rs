use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scene::TilemapError;

/// Everything that can abort the one-time load pass. No partial scene is
/// built once one of these is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read map file {path}: {source}")]
    ReadMap {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("map file {path} line {line}: expected 'label number'")]
    InvalidHeader { path: PathBuf, line: usize },
    #[error("map file {path} has no layer {layer} (nothing loaded)")]
    MissingLayer { path: PathBuf, layer: usize },
    #[error(
        "map file {path} layer {layer} row {row} column {column}: '{value}' is not a tile code"
    )]
    InvalidCell {
        path: PathBuf,
        layer: usize,
        row: usize,
        column: usize,
        value: String,
    },
    #[error("map file {path} layer {layer}: row {row} has {actual} cells, expected {expected}")]
    RaggedLayer {
        path: PathBuf,
        layer: usize,
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("map file {path}: tile width must be positive, got {size}")]
    InvalidTileSize { path: PathBuf, size: i32 },
    #[error("map file {path}: {source}")]
    InvalidGrid {
        path: PathBuf,
        #[source]
        source: TilemapError,
    },
    #[error("failed to open image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    DecodeImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read level definitions {path}: {source}")]
    ReadLevels {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse level definitions {path} at {field}: {source}")]
    ParseLevels {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("level '{level}' references unknown sprite sheet '{key}'")]
    UnknownSheet { level: String, key: String },
    #[error("level '{level}' has a door to unknown level '{target}'")]
    UnknownLevel { level: String, target: String },
    #[error("level '{level}' uses unknown interaction key '{key}'")]
    UnknownKey { level: String, key: String },
    #[error("level '{level}' does not place a player")]
    MissingPlayer { level: String },
    #[error("level name '{name}' is defined more than once")]
    DuplicateLevel { name: String },
    #[error("start level {index} is out of range for {count} levels")]
    StartLevelOutOfRange { index: usize, count: usize },
    #[error("level set defines no levels")]
    NoLevels,
}
