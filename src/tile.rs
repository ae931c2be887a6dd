//! Tile and patch naming, input discovery and landscape extent.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{BuildResult, BuilderError};

/// Patches per tile along each axis.
pub const PATCHES_PER_SIDE: usize = 4;

/// Grid position of an input tile, named `XXYY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: usize,
    pub y: usize,
}

impl TileCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Global coordinate of sub-patch (i, j) of this tile.
    pub fn patch(&self, i: usize, j: usize) -> PatchCoord {
        PatchCoord {
            x: self.x * PATCHES_PER_SIDE + i,
            y: self.y * PATCHES_PER_SIDE + j,
        }
    }

    /// All 16 patches of this tile with their sub-indices.
    pub fn patches(&self) -> impl Iterator<Item = (usize, usize, PatchCoord)> + '_ {
        (0..PATCHES_PER_SIDE).flat_map(move |i| {
            (0..PATCHES_PER_SIDE).map(move |j| (i, j, self.patch(i, j)))
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BuilderError::InvalidTileName(s.to_string()));
        }
        let x = s[..2].parse().map_err(|_| BuilderError::InvalidTileName(s.to_string()))?;
        let y = s[2..].parse().map_err(|_| BuilderError::InvalidTileName(s.to_string()))?;
        Ok(Self { x, y })
    }
}

/// Global patch position, named `XXYY` like tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchCoord {
    pub x: usize,
    pub y: usize,
}

impl PatchCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PatchCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.x, self.y)
    }
}

impl FromStr for PatchCoord {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tile: TileCoord = s.parse()?;
        Ok(Self::new(tile.x, tile.y))
    }
}

/// A classification tile found in the input directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputTile {
    pub coord: TileCoord,
    pub path: PathBuf,
}

const TILE_EXTENSIONS: [&str; 2] = ["png", "bmp"];

/// Scan `dir` for `XXYY.png` / `XXYY.bmp` tiles, sorted by coordinate.
///
/// Files with other names are skipped. A coordinate that appears under both
/// extensions keeps the first one in sort order.
pub fn discover_tiles(dir: &Path) -> BuildResult<Vec<InputTile>> {
    if !dir.is_dir() {
        return Err(BuilderError::MissingInput(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }

    let mut tiles = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if !extension.is_some_and(|e| TILE_EXTENSIONS.contains(&e.as_str())) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match stem.parse::<TileCoord>() {
            Ok(coord) => tiles.push(InputTile { coord, path }),
            Err(_) => log::debug!("Skipping {}: not a tile name", path.display()),
        }
    }

    tiles.sort_by(|a, b| a.coord.cmp(&b.coord).then_with(|| a.path.cmp(&b.path)));
    tiles.dedup_by_key(|t| t.coord);

    if tiles.is_empty() {
        return Err(BuilderError::MissingInput(format!(
            "no tiles found in {}",
            dir.display()
        )));
    }
    Ok(tiles)
}

/// Size of the landscape in tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LandscapeExtent {
    pub tiles_wide: usize,
    pub tiles_high: usize,
}

impl LandscapeExtent {
    pub fn new(tiles_wide: usize, tiles_high: usize) -> Self {
        Self {
            tiles_wide,
            tiles_high,
        }
    }

    /// Smallest extent covering every tile coordinate.
    pub fn covering<'a>(coords: impl IntoIterator<Item = &'a TileCoord>) -> Self {
        coords.into_iter().fold(Self::new(0, 0), |extent, c| Self {
            tiles_wide: extent.tiles_wide.max(c.x + 1),
            tiles_high: extent.tiles_high.max(c.y + 1),
        })
    }
}

/// QGIS atlas expression mapping feature numbers to tile names.
///
/// Names run from the far corner down to `0000`, X outer and Y inner, after a
/// leading `'0'` placeholder for feature number zero.
pub fn atlas_expression(tiles_wide: usize, tiles_high: usize) -> String {
    let mut names = vec!["'0'".to_string()];
    for i in (0..tiles_wide).rev() {
        for j in (0..tiles_high).rev() {
            names.push(format!("'{}'", TileCoord::new(i, j)));
        }
    }
    format!("array_get(array({}), @atlas_featurenumber)", names.join(","))
}
