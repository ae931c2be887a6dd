//! Landscape asset builder
//!
//! Turns classified land-cover tiles into textures, forest maps and a thermal
//! map for a flight-simulator landscape, and flattens terrain under runways.

pub mod airport;
pub mod classification;
pub mod config;
pub mod error;
pub mod external;
pub mod forest;
pub mod land_cover;
pub mod patches;
pub mod pipeline;
pub mod pixel;
pub mod pixel_buffer;
pub mod progress;
pub mod rasterizer;
pub mod terrain;
pub mod thermal;
pub mod tile;

pub use error::{BuildResult, BuilderError};
