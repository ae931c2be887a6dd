//! End-to-end landscape build: tiles in, renderer assets out.
//!
//! Stages run in a fixed order: per-tile textures and masks, the thermal
//! mosaic, DDS compression, forest files, the `.tdm` thermal file. Airports
//! are a separate pass over the height grid.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::airport::{self, Airport};
use crate::classification::ClassificationTable;
use crate::config::{BuildConfig, OutputLayout};
use crate::error::{BuildResult, BuilderError};
use crate::external::ExternalTool;
use crate::forest;
use crate::patches;
use crate::pixel_buffer::PixelBuffer;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::rasterizer::TileRasterizer;
use crate::terrain::{flatten_runways, CoordinateTransform, HeightGridStore, RunwayFootprint, RunwayResult};
use crate::thermal;
use crate::tile::{discover_tiles, InputTile, LandscapeExtent, TileCoord};

const SUMMARY_FILE: &str = "build_summary.json";

/// Which optional stages to run. Textures are always built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    pub gen_dds: bool,
    pub gen_forest: bool,
    pub gen_thermal: bool,
    /// Write final outputs into the installed landscape directory
    pub output_to_landscape: bool,
    /// Only build this tile
    pub single_tile: Option<TileCoord>,
    /// Flatten the whole runway polygon, not just its outline
    pub fill_interior: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            gen_dds: false,
            gen_forest: false,
            gen_thermal: false,
            output_to_landscape: false,
            single_tile: None,
            fill_interior: true,
        }
    }
}

impl BuildOptions {
    pub fn all() -> Self {
        Self {
            gen_dds: true,
            gen_forest: true,
            gen_thermal: true,
            ..Self::default()
        }
    }
}

/// Record of a finished build, saved as `build_summary.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub landscape: String,
    pub tiles: Vec<String>,
    pub tiles_wide: usize,
    pub tiles_high: usize,
    /// RFC 3339, UTC
    pub started_at: String,
    pub elapsed_seconds: f64,
    pub warnings: Vec<String>,
}

impl BuildSummary {
    pub fn load<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> BuildResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Forwards events and keeps every warning for the summary.
struct RecordingSink<'a> {
    inner: &'a dyn ProgressSink,
    warnings: Mutex<Vec<String>>,
}

impl<'a> RecordingSink<'a> {
    fn new(inner: &'a dyn ProgressSink) -> Self {
        Self {
            inner,
            warnings: Mutex::new(Vec::new()),
        }
    }

    fn into_warnings(self) -> Vec<String> {
        self.warnings.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressSink for RecordingSink<'_> {
    fn emit(&self, event: ProgressEvent) {
        if let ProgressEvent::Warning { .. } | ProgressEvent::RunwayFailed { .. } = &event {
            self.warnings
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.to_string());
        }
        self.inner.emit(event);
    }
}

fn stage<T>(sink: &dyn ProgressSink, name: &str, run: impl FnOnce() -> BuildResult<T>) -> BuildResult<T> {
    sink.emit(ProgressEvent::StageStarted {
        stage: name.to_string(),
    });
    let started = Instant::now();
    let result = run()?;
    sink.emit(ProgressEvent::StageFinished {
        stage: name.to_string(),
        elapsed: started.elapsed(),
    });
    Ok(result)
}

pub struct LandscapeBuilder {
    config: BuildConfig,
    table: ClassificationTable,
    sink: Arc<dyn ProgressSink>,
}

impl LandscapeBuilder {
    /// The table's textures should already be loaded.
    pub fn new(config: BuildConfig, table: ClassificationTable, sink: Arc<dyn ProgressSink>) -> BuildResult<Self> {
        config.validate()?;
        Ok(Self { config, table, sink })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build textures and, as requested, forest and thermal files.
    pub fn build(&self, options: &BuildOptions) -> BuildResult<BuildSummary> {
        let started_at = Utc::now();
        let started = Instant::now();
        let sink = RecordingSink::new(self.sink.as_ref());

        let layout = self.config.layout(options.output_to_landscape);
        layout.create_all()?;

        let mut tiles = discover_tiles(&self.config.input_dir)?;
        let extent = LandscapeExtent::covering(tiles.iter().map(|t| &t.coord));
        if let Some(only) = options.single_tile {
            tiles.retain(|t| t.coord == only);
            if tiles.is_empty() {
                return Err(BuilderError::MissingInput(format!(
                    "tile {only} not found in {}",
                    self.config.input_dir.display()
                )));
            }
        }
        log::info!(
            "Landscape {} is {}x{} tiles, building {}",
            self.config.landscape_file_stem(),
            extent.tiles_wide,
            extent.tiles_high,
            tiles.len()
        );

        let rasterizer = TileRasterizer::new(&self.table, self.config.tile_size);
        stage(&sink, "Building textures", || {
            tiles
                .iter()
                .try_for_each(|tile| self.build_tile(&rasterizer, tile, &layout, &sink))
        })?;

        stage(&sink, "Composing thermal map", || {
            thermal::generate_thermal_map(
                &layout.thermal_tiles(),
                extent,
                self.config.thermal_tile_size,
                &layout.thermal_mosaic(),
            )
        })?;

        if options.gen_dds {
            stage(&sink, "Compressing textures", || {
                let tool = ExternalTool::dds_compressor(
                    &self.config.tools.dds_compressor,
                    &layout.texture_patches(),
                    &layout.final_textures(),
                );
                if let Err(e) = tool.run() {
                    sink.warn(format!("DDS conversion failed: {e}"));
                }
                Ok(())
            })?;
        }

        if options.gen_forest {
            stage(&sink, "Generating forest files", || {
                let written = forest::generate_forest_files(&layout.forest_maps(), &layout.final_forest_maps(), &sink)?;
                log::info!("Wrote {written} forest files to {}", layout.final_forest_maps().display());
                if layout.written_to_landscape {
                    self.regenerate_hashes(&sink);
                }
                Ok(())
            })?;
        }

        if options.gen_thermal {
            stage(&sink, "Writing thermal file", || {
                let tdm = layout
                    .final_dir
                    .join(format!("{}.tdm", self.config.landscape_file_stem()));
                thermal::write_thermal_file(&layout.thermal_mosaic(), extent, &tdm)
            })?;
        }

        let summary = BuildSummary {
            landscape: self.config.landscape_file_stem().to_string(),
            tiles: tiles.iter().map(|t| t.coord.name()).collect(),
            tiles_wide: extent.tiles_wide,
            tiles_high: extent.tiles_high,
            started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            elapsed_seconds: started.elapsed().as_secs_f64(),
            warnings: sink.into_warnings(),
        };
        summary.save(layout.output.join(SUMMARY_FILE))?;
        Ok(summary)
    }

    fn build_tile(
        &self,
        rasterizer: &TileRasterizer<'_>,
        tile: &InputTile,
        layout: &OutputLayout,
        sink: &dyn ProgressSink,
    ) -> BuildResult<()> {
        let started = Instant::now();
        let name = tile.coord.name();
        sink.emit(ProgressEvent::TileStarted { tile: name.clone() });

        let outputs = rasterizer.rasterize(&name, &PixelBuffer::load(&tile.path)?)?;

        outputs
            .texture
            .save(layout.textures().join(format!("{name}.bmp")), None)?;
        patches::save_texture_patches(&outputs.texture, tile.coord, &layout.texture_patches())?;

        let mask_size = Some(self.config.forest_mask_size);
        outputs
            .deciduous
            .save(layout.forest_maps().join(format!("b{name}.bmp")), mask_size)?;
        outputs
            .coniferous
            .save(layout.forest_maps().join(format!("s{name}.bmp")), mask_size)?;
        outputs.thermal.save(
            layout.thermal_tiles().join(format!("{name}.bmp")),
            Some(self.config.thermal_tile_size),
        )?;

        sink.emit(ProgressEvent::TileFinished {
            tile: name,
            elapsed: started.elapsed(),
        });
        Ok(())
    }

    fn regenerate_hashes(&self, sink: &dyn ProgressSink) {
        let tool = ExternalTool::hash_generator(&self.config.tools.landscape_editor, self.config.landscape_file_stem());
        match tool.run() {
            Ok(_) => log::info!("Regenerated hashes for {}", self.config.landscape_file_stem()),
            Err(e) => sink.warn(format!("Hash regeneration failed: {e}")),
        }
    }

    /// Write the `.apt` file and flatten terrain under every runway with known corners.
    ///
    /// Runways fail independently; the returned results say which succeeded.
    /// Modified height-map patches are written to the final height-map directory.
    pub fn build_airports(
        &self,
        airports: &[Airport],
        transform: &dyn CoordinateTransform,
        options: &BuildOptions,
    ) -> BuildResult<Vec<RunwayResult>> {
        let layout = self.config.layout(options.output_to_landscape);
        fs::create_dir_all(&layout.final_dir)?;

        let apt = layout
            .final_dir
            .join(format!("{}.apt", self.config.landscape_file_stem()));
        let bytes = airport::write_apt(airports, &apt)?;
        log::info!("Wrote {} airports ({bytes} bytes) to {}", airports.len(), apt.display());

        let footprints: Vec<RunwayFootprint> = airports.iter().filter_map(Airport::footprint).collect();
        if footprints.is_empty() {
            return Ok(Vec::new());
        }

        let store = HeightGridStore::new(
            self.config.heightmap_source_dir(&layout),
            layout.final_heightmap_dir(),
            self.config.height_grid,
        );
        let results = stage(self.sink.as_ref(), "Flattening runways", || {
            Ok(flatten_runways(
                &footprints,
                transform,
                &store,
                options.fill_interior,
                self.sink.as_ref(),
            ))
        })?;

        let written = store.persist()?;
        log::info!("Wrote {} height-map patches", written.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeightGridLayout;
    use crate::land_cover::{ForestClass, LandCover, ThermalClass};
    use crate::pixel::Pixel;
    use crate::progress::{ChannelSink, NullSink};
    use crate::terrain::{GeoPoint, HeightGridPatch, LandscapePoint, RunwayCorners};
    use crate::tile::PatchCoord;
    use std::collections::HashMap;
    use std::sync::mpsc;
    use tempfile::{tempdir, TempDir};

    const FOREST: Pixel = Pixel::rgb(0x1c, 0x63, 0x30);

    fn table() -> ClassificationTable {
        ClassificationTable::new(HashMap::from([
            (
                Pixel::WHITE,
                LandCover::flat("open", Pixel::rgb(200, 200, 150), ThermalClass::Weak).as_default(),
            ),
            (
                FOREST,
                LandCover::flat("forest", FOREST, ThermalClass::Best).with_forest(ForestClass::Coniferous),
            ),
        ]))
        .unwrap()
    }

    /// Input tiles 0000 (forest) and 0100 (open), 16x16 each.
    fn workspace() -> (TempDir, BuildConfig) {
        let dir = tempdir().unwrap();
        let input = dir.path().join("Atlas");
        fs::create_dir_all(&input).unwrap();
        PixelBuffer::new_with(16, 16, FOREST)
            .to_image()
            .save(input.join("0000.png"))
            .unwrap();
        PixelBuffer::new_with(16, 16, Pixel::WHITE)
            .to_image()
            .save(input.join("0100.png"))
            .unwrap();

        let config = BuildConfig {
            landscape_name: Some("Test".to_string()),
            input_dir: input,
            output_dir: dir.path().join("out"),
            tile_size: 16,
            forest_mask_size: 8,
            thermal_tile_size: 4,
            ..BuildConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_full_build() {
        let (_dir, mut config) = workspace();
        config.tools.dds_compressor = "no-such-dds-tool-on-path".to_string();
        let output = config.output_dir.clone();

        let (tx, rx) = mpsc::channel();
        let builder = LandscapeBuilder::new(config, table(), Arc::new(ChannelSink::new(tx))).unwrap();
        let summary = builder.build(&BuildOptions::all()).unwrap();

        assert_eq!(summary.tiles, vec!["0000", "0100"]);
        assert_eq!((summary.tiles_wide, summary.tiles_high), (2, 1));
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("DDS"));
        assert_eq!(BuildSummary::load(output.join("build_summary.json")).unwrap(), summary);

        assert!(output.join("Textures").join("0100.bmp").exists());
        let patch_count = fs::read_dir(output.join("Textures").join("Patches")).unwrap().count();
        assert_eq!(patch_count, 32);

        let mask = PixelBuffer::load(output.join("ForestMaps").join("s0000.bmp")).unwrap();
        assert_eq!((mask.width, mask.height), (8, 8));

        // 8x8 masks split into 2x2 patches, one byte per cell
        let final_dir = output.join("Final");
        let forest_tile = fs::read(final_dir.join("ForestMaps").join("0000.for")).unwrap();
        assert_eq!(forest_tile, vec![1; 4]);
        let open_tile = fs::read(final_dir.join("ForestMaps").join("0400.for")).unwrap();
        assert_eq!(open_tile, vec![0; 4]);

        // Mosaic is 8x4; tile 0000 sits on the right and is read first
        let tdm = fs::read(final_dir.join("Test.tdm")).unwrap();
        assert_eq!(tdm.len(), 8 * 4 + 8);
        assert_eq!((tdm[1], tdm[5]), (2, 1));
        assert_eq!(&tdm[8..12], &[0xb2; 4]);
        assert_eq!(&tdm[12..16], &[0x40; 4]);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&ProgressEvent::TileStarted {
            tile: "0100".to_string()
        }));
    }

    #[test]
    fn test_single_tile_build() {
        let (_dir, config) = workspace();
        let output = config.output_dir.clone();
        let builder = LandscapeBuilder::new(config, table(), Arc::new(NullSink)).unwrap();

        let options = BuildOptions {
            single_tile: Some(TileCoord::new(1, 0)),
            ..BuildOptions::default()
        };
        let summary = builder.build(&options).unwrap();
        assert_eq!(summary.tiles, vec!["0100"]);
        assert_eq!(summary.tiles_wide, 2);
        assert!(!output.join("Textures").join("0000.bmp").exists());
        assert!(!output.join("Final").join("Test.tdm").exists());

        // The mosaic is composed on every build for manual import
        let mosaic = PixelBuffer::load(output.join("ThermalMaps").join("ThermalMap.bmp")).unwrap();
        assert_eq!((mosaic.width, mosaic.height), (8, 4));

        let missing = BuildOptions {
            single_tile: Some(TileCoord::new(5, 5)),
            ..BuildOptions::default()
        };
        assert!(matches!(builder.build(&missing), Err(BuilderError::MissingInput(_))));
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Atlas")).unwrap();
        let config = BuildConfig {
            input_dir: dir.path().join("Atlas"),
            output_dir: dir.path().join("out"),
            ..BuildConfig::default()
        };
        let builder = LandscapeBuilder::new(config, table(), Arc::new(NullSink)).unwrap();
        assert!(matches!(
            builder.build(&BuildOptions::default()),
            Err(BuilderError::MissingInput(_))
        ));
    }

    fn airport(name: &str, corners: Option<RunwayCorners<GeoPoint>>) -> Airport {
        Airport {
            name: name.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            altitude: 250.4,
            direction: 90,
            length: 60,
            width: 60,
            asphalt: false,
            frequency: 123.3,
            primary_direction_reversed: false,
            tow_primary_left_side: false,
            tow_secondary_left_side: false,
            runway_corners: corners,
        }
    }

    #[test]
    fn test_build_airports_flattens_and_writes_apt() {
        let (dir, config) = workspace();
        let layout = config.layout(false);
        let heightmaps = layout.final_heightmap_dir();
        fs::create_dir_all(&heightmaps).unwrap();
        HeightGridPatch::new_flat(PatchCoord::new(0, 0), &HeightGridLayout::default(), 0)
            .save(&heightmaps)
            .unwrap();

        // lat is landscape Y, lon is landscape X
        let corners = RunwayCorners {
            top_left: GeoPoint::new(100.0, 95.0),
            top_right: GeoPoint::new(100.0, 35.0),
            bottom_right: GeoPoint::new(40.0, 35.0),
            bottom_left: GeoPoint::new(40.0, 95.0),
        };
        let airports = [airport("Strip", Some(corners)), airport("Pad", None)];
        let transform = |p: GeoPoint| Some(LandscapePoint::new(p.lon, p.lat));

        let builder = LandscapeBuilder::new(config, table(), Arc::new(NullSink)).unwrap();
        let results = builder
            .build_airports(&airports, &transform, &BuildOptions::default())
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result.as_ref().unwrap(), &16);

        let apt = fs::read(dir.path().join("out").join("Final").join("Test.apt")).unwrap();
        assert_eq!(apt.len(), 2 * airport::APT_RECORD_LEN);

        let patch = HeightGridPatch::load(PatchCoord::new(0, 0), &heightmaps, &HeightGridLayout::default()).unwrap();
        assert_eq!(patch.get(4, 4), 250);
        assert_eq!(patch.get(2, 3), 250);
        assert_eq!(patch.get(5, 5), 0);
    }
}
