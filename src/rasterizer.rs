//! Per-tile rasterization of classification pixels into the four output layers.
//!
//! Every input pixel is classified independently, so rows are processed in
//! parallel with rayon. Each worker owns one row of each output buffer.

use rayon::prelude::*;

use crate::classification::ClassificationTable;
use crate::error::{BuildResult, BuilderError};
use crate::pixel_buffer::PixelBuffer;

/// The four layers produced for one tile.
#[derive(Clone, Debug)]
pub struct TileOutputs {
    pub texture: PixelBuffer,
    pub deciduous: PixelBuffer,
    pub coniferous: PixelBuffer,
    pub thermal: PixelBuffer,
}

pub struct TileRasterizer<'a> {
    table: &'a ClassificationTable,
    output_size: usize,
}

impl<'a> TileRasterizer<'a> {
    pub fn new(table: &'a ClassificationTable, output_size: usize) -> Self {
        Self { table, output_size }
    }

    /// Classify every pixel of `input` and write the matching pixel of each layer.
    ///
    /// Outputs are `output_size` square. Only the region covered by the input is
    /// written; the rest stays transparent black.
    pub fn rasterize(&self, tile: &str, input: &PixelBuffer) -> BuildResult<TileOutputs> {
        let size = self.output_size;
        if input.width > size || input.height > size {
            return Err(BuilderError::TileTooLarge {
                tile: tile.to_string(),
                width: input.width,
                height: input.height,
                output_size: size,
            });
        }

        let mut texture = PixelBuffer::new(size, size);
        let mut deciduous = PixelBuffer::new(size, size);
        let mut coniferous = PixelBuffer::new(size, size);
        let mut thermal = PixelBuffer::new(size, size);

        texture
            .as_mut_slice()
            .par_chunks_mut(size)
            .zip(deciduous.as_mut_slice().par_chunks_mut(size))
            .zip(coniferous.as_mut_slice().par_chunks_mut(size))
            .zip(thermal.as_mut_slice().par_chunks_mut(size))
            .take(input.height)
            .enumerate()
            .for_each(|(j, (((texture_row, deciduous_row), coniferous_row), thermal_row))| {
                for i in 0..input.width {
                    let cover = self.table.lookup(&input.get(i, j));
                    texture_row[i] = cover.color_for(i, j);
                    deciduous_row[i] = cover.deciduous_mask();
                    coniferous_row[i] = cover.coniferous_mask();
                    thermal_row[i] = cover.thermal_color();
                }
            });

        Ok(TileOutputs {
            texture,
            deciduous,
            coniferous,
            thermal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::colors;
    use crate::land_cover::ThermalClass;
    use crate::pixel::Pixel;
    use crate::progress::NullSink;
    use std::sync::Arc;

    fn flat_table() -> ClassificationTable {
        let mut table = ClassificationTable::defaults();
        // No texture dir: textured entries paint white
        table.load_textures(std::path::Path::new("/nonexistent"), &NullSink);
        table
    }

    #[test]
    fn test_layers_follow_classification() {
        let table = flat_table();
        let mut input = PixelBuffer::new_with(4, 4, colors::ROAD_PAVED);
        input.set(1, 2, colors::FOREST_MIXED);
        input.set(3, 0, colors::WATER);
        input.set(0, 3, colors::FOREST_CONIFEROUS);

        let out = TileRasterizer::new(&table, 8).rasterize("0000", &input).unwrap();

        assert_eq!(out.texture.get(0, 0), colors::ROAD_PAVED);
        assert_eq!(out.thermal.get(0, 0), ThermalClass::Best.color());
        assert_eq!(out.deciduous.get(0, 0), Pixel::BLACK);

        assert_eq!(out.deciduous.get(1, 2), Pixel::WHITE);
        assert_eq!(out.coniferous.get(1, 2), Pixel::WHITE);
        assert_eq!(out.texture.get(1, 2), Pixel::WHITE);

        assert_eq!(out.deciduous.get(0, 3), Pixel::BLACK);
        assert_eq!(out.coniferous.get(0, 3), Pixel::WHITE);

        assert_eq!(out.texture.get(3, 0).a, 0);
        assert_eq!(out.thermal.get(3, 0), ThermalClass::None.color());

        // Outside the input region nothing is written
        assert_eq!(out.texture.get(5, 5), Pixel::default());
    }

    #[test]
    fn test_unknown_colors_use_default() {
        let mut table = ClassificationTable::defaults();
        table.load_textures(std::path::Path::new("/nonexistent"), &NullSink);
        let input = PixelBuffer::new_with(2, 2, Pixel::rgb(1, 2, 3));

        let out = TileRasterizer::new(&table, 2).rasterize("0000", &input).unwrap();
        let default = table.default_land_cover();
        for (_, _, p) in out.thermal.iter() {
            assert_eq!(p, default.thermal_color());
        }
    }

    #[test]
    fn test_texture_tiles_across_output() {
        let mut table = ClassificationTable::defaults();
        let mut texture = PixelBuffer::new(2, 2);
        texture.set(0, 0, Pixel::rgb(10, 0, 0));
        texture.set(1, 0, Pixel::rgb(20, 0, 0));
        texture.set(0, 1, Pixel::rgb(30, 0, 0));
        texture.set(1, 1, Pixel::rgb(40, 0, 0));
        let shared = Arc::new(texture);

        let mut entries = std::collections::HashMap::new();
        for (color, cover) in table.iter() {
            let mut cover = cover.clone();
            if let crate::land_cover::LandVisual::Texture { texture, .. } = &mut cover.visual {
                *texture = Some(shared.clone());
            }
            entries.insert(*color, cover);
        }
        table = ClassificationTable::new(entries).unwrap();

        let input = PixelBuffer::new_with(6, 6, colors::GRASSLAND);
        let out = TileRasterizer::new(&table, 6).rasterize("0000", &input).unwrap();
        assert_eq!(out.texture.get(4, 2), Pixel::rgb(10, 0, 0));
        assert_eq!(out.texture.get(5, 3), Pixel::rgb(40, 0, 0));
    }

    #[test]
    fn test_oversized_input_rejected() {
        let table = flat_table();
        let input = PixelBuffer::new(16, 16);
        let result = TileRasterizer::new(&table, 8).rasterize("0102", &input);
        assert!(matches!(result, Err(BuilderError::TileTooLarge { .. })));
    }
}
