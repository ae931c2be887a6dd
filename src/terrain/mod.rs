//! Terrain flattening around runways.
//!
//! - `geometry`: points, corner sets and grid rounding
//! - `projection`: geographic to landscape coordinate conversion
//! - `heightgrid`: height-map patch files and the shared patch store
//! - `flattener`: footprint rounding, boundary tracing and flattening

pub mod flattener;
pub mod geometry;
pub mod heightgrid;
pub mod projection;

pub use flattener::{flatten_runways, RunwayFootprint, RunwayResult, TerrainFlattener};
pub use geometry::{GeoPoint, GridPoint, LandscapePoint, RunwayCorner, RunwayCorners};
pub use heightgrid::{GridCell, HeightGridPatch, HeightGridStore};
pub use projection::{parse_converter_output, CommandTransform, CoordinateTransform};
