//! Splitting tile buffers into the 4x4 grid of named patches.
//!
//! Sub-index (0, 0) is the bottom-right quarter of the tile, increasing
//! leftwards in X and upwards in Y. Patch files must follow this order or the
//! renderer places them in the wrong cells.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{BuildResult, BuilderError};
use crate::pixel_buffer::PixelBuffer;
use crate::tile::{PatchCoord, TileCoord, PATCHES_PER_SIDE};

/// Split `buffer` into its 16 patches keyed by global patch coordinate.
pub fn split(buffer: &PixelBuffer, tile: TileCoord) -> BuildResult<BTreeMap<PatchCoord, PixelBuffer>> {
    if buffer.width % PATCHES_PER_SIDE != 0 || buffer.height % PATCHES_PER_SIDE != 0 {
        return Err(BuilderError::Config(format!(
            "tile {tile} is {}x{}, not divisible into {PATCHES_PER_SIDE}x{PATCHES_PER_SIDE} patches",
            buffer.width, buffer.height
        )));
    }

    let patch_width = buffer.width / PATCHES_PER_SIDE;
    let patch_height = buffer.height / PATCHES_PER_SIDE;
    let last = PATCHES_PER_SIDE - 1;

    Ok(tile
        .patches()
        .map(|(i, j, coord)| {
            let x = (last - i) * patch_width;
            let y = (last - j) * patch_height;
            (coord, buffer.sub_buffer(x, y, patch_width, patch_height))
        })
        .collect())
}

/// Rebuild a tile from its patches, placing each by the same inverted order.
pub fn assemble(
    patches: &BTreeMap<PatchCoord, PixelBuffer>,
    tile: TileCoord,
    width: usize,
    height: usize,
) -> BuildResult<PixelBuffer> {
    let mut buffer = PixelBuffer::new(width, height);
    for (i, j, coord) in tile.patches() {
        let patch = patches.get(&coord).ok_or_else(|| {
            BuilderError::MissingInput(format!("patch {coord} of tile {tile}"))
        })?;
        buffer.copy_block_into(i, j, patch)?;
    }
    Ok(buffer)
}

/// Write each patch as `t{patch}.bmp` under `dir`.
pub fn save_texture_patches(buffer: &PixelBuffer, tile: TileCoord, dir: &Path) -> BuildResult<usize> {
    let patches = split(buffer, tile)?;
    for (coord, patch) in &patches {
        patch.save(dir.join(format!("t{coord}.bmp")), None)?;
    }
    Ok(patches.len())
}
