//! Error type shared by every stage of the landscape build.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuilderError {
    // Configuration
    #[error("Configuration error: {0}")]
    Config(String),

    // Inputs
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported pixel format {format} in {path}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Invalid tile name '{0}' (expected four digits, e.g. 0203)")]
    InvalidTileName(String),

    // Raster processing
    #[error("Block ({block_x}, {block_y}) of {source_width}x{source_height} does not fit in a {dest_width}x{dest_height} buffer")]
    BlockOutOfBounds {
        block_x: usize,
        block_y: usize,
        source_width: usize,
        source_height: usize,
        dest_width: usize,
        dest_height: usize,
    },

    #[error("Tile {tile} is {width}x{height} but the output size is {output_size}")]
    TileTooLarge {
        tile: String,
        width: usize,
        height: usize,
        output_size: usize,
    },

    #[error("Forest masks of tile {tile} differ in size: deciduous {deciduous:?}, coniferous {coniferous:?}")]
    MaskSizeMismatch {
        tile: String,
        deciduous: (usize, usize),
        coniferous: (usize, usize),
    },

    #[error("Thermal tile {tile} is {width}x{height}, expected {expected}x{expected}")]
    ThermalTileSizeMismatch {
        tile: String,
        width: usize,
        height: usize,
        expected: usize,
    },

    #[error("Thermal header stores tile counts in one byte; landscape is {tiles_wide}x{tiles_high} tiles")]
    ThermalHeaderOverflow { tiles_wide: usize, tiles_high: usize },

    // Terrain flattening
    #[error("Coordinate conversion unavailable for runway '{runway}' ({corner} corner)")]
    ConversionUnavailable { runway: String, corner: String },

    #[error("Runway '{runway}' has a degenerate footprint: {reason}")]
    DegenerateFootprint { runway: String, reason: String },

    #[error("Point ({x}, {y}) lies outside the landscape height grid")]
    OutsideLandscape { x: i64, y: i64 },

    #[error("Height map {path} is corrupt: {reason}")]
    CorruptHeightmap { path: PathBuf, reason: String },

    // External programs
    #[error("External tool '{tool}' failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for all build operations
pub type BuildResult<T> = Result<T, BuilderError>;
