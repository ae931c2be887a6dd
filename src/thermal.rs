//! Landscape-wide thermal mosaic and the `.tdm` thermal file.

use std::fs;
use std::path::Path;

use crate::error::{BuildResult, BuilderError};
use crate::pixel_buffer::PixelBuffer;
use crate::tile::{LandscapeExtent, TileCoord};

/// Bytes before the sample grid in a `.tdm` file.
pub const TDM_HEADER_LEN: usize = 8;

/// Place each tile's thermal buffer at its grid position, counting from the
/// bottom-right corner of the mosaic.
pub fn compose(
    tiles: &[(TileCoord, PixelBuffer)],
    extent: LandscapeExtent,
    tile_size: usize,
) -> BuildResult<PixelBuffer> {
    let mut mosaic = PixelBuffer::new(extent.tiles_wide * tile_size, extent.tiles_high * tile_size);
    for (coord, buffer) in tiles {
        if buffer.width != tile_size || buffer.height != tile_size {
            return Err(BuilderError::ThermalTileSizeMismatch {
                tile: coord.name(),
                width: buffer.width,
                height: buffer.height,
                expected: tile_size,
            });
        }
        mosaic.copy_block_into(coord.x, coord.y, buffer)?;
    }
    Ok(mosaic)
}

/// Load every `XXYY.bmp` thermal tile in `dir`.
pub fn load_tiles(dir: &Path) -> BuildResult<Vec<(TileCoord, PixelBuffer)>> {
    let mut tiles = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bmp") {
            continue;
        }
        let Some(Ok(coord)) = path.file_stem().and_then(|s| s.to_str()).map(str::parse::<TileCoord>) else {
            continue;
        };
        tiles.push((coord, PixelBuffer::load(&path)?));
    }
    tiles.sort_by_key(|(coord, _)| *coord);
    Ok(tiles)
}

/// Compose the thermal tiles in `tile_dir` and save the mosaic to `mosaic_path`.
pub fn generate_thermal_map(
    tile_dir: &Path,
    extent: LandscapeExtent,
    tile_size: usize,
    mosaic_path: &Path,
) -> BuildResult<PixelBuffer> {
    let tiles = load_tiles(tile_dir)?;
    if tiles.is_empty() {
        return Err(BuilderError::MissingInput(format!(
            "no thermal tiles in {}",
            tile_dir.display()
        )));
    }
    let mosaic = compose(&tiles, extent, tile_size)?;
    mosaic.save(mosaic_path, None)?;
    log::debug!(
        "Thermal mosaic {}x{} from {} tiles",
        mosaic.width,
        mosaic.height,
        tiles.len()
    );
    Ok(mosaic)
}

/// Encode a mosaic as a `.tdm` file.
///
/// Header byte 1 holds the width in tiles and byte 5 the height in tiles; the
/// rest of the header is zero. The body stores the red channel of every
/// pixel, scanning the mosaic mirrored on both axes.
pub fn encode(mosaic: &PixelBuffer, extent: LandscapeExtent) -> BuildResult<Vec<u8>> {
    let (tiles_wide, tiles_high) = (extent.tiles_wide, extent.tiles_high);
    let (Ok(wide), Ok(high)) = (u8::try_from(tiles_wide), u8::try_from(tiles_high)) else {
        return Err(BuilderError::ThermalHeaderOverflow {
            tiles_wide,
            tiles_high,
        });
    };

    let (width, height) = (mosaic.width, mosaic.height);
    let mut data = vec![0u8; width * height + TDM_HEADER_LEN];
    data[1] = wide;
    data[5] = high;

    let body = &mut data[TDM_HEADER_LEN..];
    for j in 0..height {
        for i in 0..width {
            body[j * width + i] = mosaic.get(width - 1 - i, height - 1 - j).r;
        }
    }
    Ok(data)
}

/// Read the saved mosaic and write the `.tdm` file.
pub fn write_thermal_file(mosaic_path: &Path, extent: LandscapeExtent, out_path: &Path) -> BuildResult<usize> {
    let mosaic = PixelBuffer::load(mosaic_path)?;
    let data = encode(&mosaic, extent)?;
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(out_path, &data)?;
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::land_cover::ThermalClass;
    use crate::pixel::Pixel;
    use tempfile::tempdir;

    #[test]
    fn test_single_tile_moderate_file() {
        let mosaic = PixelBuffer::new_with(256, 256, ThermalClass::Moderate.color());
        let data = encode(&mosaic, LandscapeExtent::new(1, 1)).unwrap();

        assert_eq!(data.len(), 256 * 256 + 8);
        assert_eq!(&data[..8], &[0, 1, 0, 0, 0, 1, 0, 0]);
        assert!(data[8..].iter().all(|&b| b == 0x66));
    }

    #[test]
    fn test_body_is_mirrored() {
        let mut mosaic = PixelBuffer::new_with(3, 2, Pixel::BLACK);
        mosaic.set(2, 1, Pixel::rgb(7, 0, 0));
        mosaic.set(0, 1, Pixel::rgb(9, 0, 0));

        let data = encode(&mosaic, LandscapeExtent::new(1, 1)).unwrap();
        assert_eq!(&data[8..], &[7, 0, 9, 0, 0, 0]);
    }

    #[test]
    fn test_header_overflow() {
        let mosaic = PixelBuffer::new(1, 1);
        let result = encode(&mosaic, LandscapeExtent::new(256, 1));
        assert!(matches!(result, Err(BuilderError::ThermalHeaderOverflow { .. })));
        assert!(encode(&mosaic, LandscapeExtent::new(255, 255)).is_ok());
    }

    #[test]
    fn test_compose_places_tiles_from_bottom_right() {
        let a = PixelBuffer::new_with(2, 2, Pixel::rgb(1, 0, 0));
        let b = PixelBuffer::new_with(2, 2, Pixel::rgb(2, 0, 0));
        let tiles = vec![(TileCoord::new(0, 0), a), (TileCoord::new(1, 0), b)];

        let mosaic = compose(&tiles, LandscapeExtent::new(2, 1), 2).unwrap();
        assert_eq!((mosaic.width, mosaic.height), (4, 2));
        assert_eq!(mosaic.get(3, 0), Pixel::rgb(1, 0, 0));
        assert_eq!(mosaic.get(0, 1), Pixel::rgb(2, 0, 0));

        // Mirrored scan reads tile 0000 first
        let data = encode(&mosaic, LandscapeExtent::new(2, 1)).unwrap();
        assert_eq!(&data[8..12], &[1, 1, 2, 2]);
    }

    #[test]
    fn test_compose_rejects_wrong_tile_size() {
        let tiles = vec![(TileCoord::new(0, 0), PixelBuffer::new(3, 3))];
        assert!(matches!(
            compose(&tiles, LandscapeExtent::new(1, 1), 2),
            Err(BuilderError::ThermalTileSizeMismatch { width: 3, expected: 2, .. })
        ));

        let small = vec![(TileCoord::new(0, 0), PixelBuffer::new(1, 1))];
        assert!(matches!(
            compose(&small, LandscapeExtent::new(1, 1), 2),
            Err(BuilderError::ThermalTileSizeMismatch { width: 1, height: 1, .. })
        ));
    }

    #[test]
    fn test_generate_and_write_file() {
        let dir = tempdir().unwrap();
        let tiles = dir.path().join("Tiles");
        fs::create_dir_all(&tiles).unwrap();
        PixelBuffer::new_with(4, 4, ThermalClass::Best.color())
            .save(tiles.join("0000.bmp"), None)
            .unwrap();
        PixelBuffer::new_with(4, 4, ThermalClass::Weak.color())
            .save(tiles.join("0001.bmp"), None)
            .unwrap();

        let extent = LandscapeExtent::new(1, 2);
        let mosaic_path = dir.path().join("ThermalMap.bmp");
        let mosaic = generate_thermal_map(&tiles, extent, 4, &mosaic_path).unwrap();
        assert_eq!((mosaic.width, mosaic.height), (4, 8));

        let out = dir.path().join("Final").join("Alps.tdm");
        let len = write_thermal_file(&mosaic_path, extent, &out).unwrap();
        assert_eq!(len, 4 * 8 + 8);

        let data = fs::read(&out).unwrap();
        assert_eq!(data[5], 2);
        assert_eq!(data[8], 0xb2);
        assert_eq!(data[8 + 4 * 4], 0x40);
    }
}
