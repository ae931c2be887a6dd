//! Forest `.for` files: one byte per cell, no header.

use std::fs;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{BuildResult, BuilderError};
use crate::land_cover::ForestClass;
use crate::patches;
use crate::pixel_buffer::PixelBuffer;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::tile::TileCoord;

/// Combine a deciduous and a coniferous mask patch into forest bytes.
///
/// Cell (i, j) reads both masks at the mirrored position
/// `(width - 1 - i, height - 1 - j)` and is stored at `i * height + j`.
/// Anything other than opaque black counts as trees present.
pub fn encode_patch(deciduous: &PixelBuffer, coniferous: &PixelBuffer) -> Vec<u8> {
    let (width, height) = (deciduous.width, deciduous.height);
    let mut data = vec![0u8; width * height];

    for i in 0..width {
        for j in 0..height {
            let (x, y) = (width - 1 - i, height - 1 - j);
            let class = ForestClass::from_presence(
                !deciduous.get(x, y).is_black(),
                !coniferous.get(x, y).is_black(),
            );
            data[i * height + j] = class.code();
        }
    }
    data
}

/// Encode both masks of one tile into its 16 `.for` files under `out_dir`.
pub fn encode_tile(
    tile: TileCoord,
    deciduous: &PixelBuffer,
    coniferous: &PixelBuffer,
    out_dir: &Path,
) -> BuildResult<usize> {
    if (deciduous.width, deciduous.height) != (coniferous.width, coniferous.height) {
        return Err(BuilderError::MaskSizeMismatch {
            tile: tile.name(),
            deciduous: (deciduous.width, deciduous.height),
            coniferous: (coniferous.width, coniferous.height),
        });
    }

    let deciduous_patches = patches::split(deciduous, tile)?;
    let coniferous_patches = patches::split(coniferous, tile)?;

    let work: Vec<_> = deciduous_patches
        .iter()
        .filter_map(|(coord, d)| coniferous_patches.get(coord).map(|c| (coord, d, c)))
        .collect();

    work.par_iter()
        .try_for_each(|(coord, d, c)| -> BuildResult<()> {
            fs::write(out_dir.join(format!("{coord}.for")), encode_patch(d, c))?;
            Ok(())
        })?;

    Ok(work.len())
}

/// Encode every `b{tile}.bmp` / `s{tile}.bmp` pair found in `mask_dir`.
///
/// Returns the number of `.for` files written.
pub fn generate_forest_files(mask_dir: &Path, out_dir: &Path, sink: &dyn ProgressSink) -> BuildResult<usize> {
    fs::create_dir_all(out_dir)?;

    let mut tiles = Vec::new();
    for entry in fs::read_dir(mask_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bmp") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(Ok(coord)) = stem.strip_prefix('b').map(str::parse::<TileCoord>) {
            tiles.push(coord);
        }
    }
    tiles.sort();

    let mut written = 0;
    for tile in tiles {
        let started = Instant::now();
        let name = tile.name();
        sink.emit(ProgressEvent::TileStarted { tile: name.clone() });

        let deciduous = PixelBuffer::load(mask_dir.join(format!("b{name}.bmp")))?;
        let coniferous = PixelBuffer::load(mask_dir.join(format!("s{name}.bmp")))?;
        written += encode_tile(tile, &deciduous, &coniferous, out_dir)?;

        sink.emit(ProgressEvent::TileFinished {
            tile: name,
            elapsed: started.elapsed(),
        });
    }
    Ok(written)
}
