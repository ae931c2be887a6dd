//! Classification colour to land-cover mapping.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BuildResult, BuilderError};
use crate::land_cover::{ForestClass, LandCover, LandVisual, ThermalClass};
use crate::pixel::Pixel;
use crate::pixel_buffer::PixelBuffer;
use crate::progress::ProgressSink;

/// NLCD-style classification colours recognised by the built-in table.
pub mod colors {
    use crate::pixel::Pixel;

    pub const DEVELOPED_OPEN_SPACE: Pixel = Pixel::from_argb(0xffdd_c9c9);
    pub const DEVELOPED_LOW_INTENSITY: Pixel = Pixel::from_argb(0xffd8_9382);
    pub const DEVELOPED_MEDIUM_INTENSITY: Pixel = Pixel::from_argb(0xffed_0000);
    pub const DEVELOPED_HIGH_INTENSITY: Pixel = Pixel::from_argb(0xffaa_0000);
    pub const BARREN_LAND: Pixel = Pixel::from_argb(0xffb2_ada3);
    pub const FOREST_DECIDUOUS: Pixel = Pixel::from_argb(0xff68_aa63);
    pub const FOREST_CONIFEROUS: Pixel = Pixel::from_argb(0xff1c_6330);
    pub const FOREST_MIXED: Pixel = Pixel::from_argb(0xffb5_c98e);
    pub const GRASSLAND: Pixel = Pixel::from_argb(0xffe2_e2c1);
    pub const PASTURE: Pixel = Pixel::from_argb(0xffdb_d83d);
    pub const CULTIVATED_CROPS: Pixel = Pixel::from_argb(0xffaa_7028);
    pub const WETLANDS_WOODY: Pixel = Pixel::from_argb(0xffba_d8ea);
    pub const WETLANDS_EMERGENT: Pixel = Pixel::from_argb(0xff70_a3ba);
    pub const ROAD_PAVED: Pixel = Pixel::from_argb(0xff3c_4345);
    pub const ROAD_GRAVEL: Pixel = Pixel::from_argb(0xff56_5f62);
    pub const ROAD_DIRT: Pixel = Pixel::from_argb(0xff98_7d1e);
    pub const RAILWAY: Pixel = Pixel::from_argb(0xff3c_4344);
    pub const AERODROME: Pixel = Pixel::from_argb(0xff33_ff00);
    pub const RUNWAY: Pixel = Pixel::from_argb(0xff60_6060);
    pub const RUNWAY_GRASS: Pixel = Pixel::from_argb(0xff0a_7c00);
    pub const RUNWAY_DIRT: Pixel = Pixel::from_argb(0xff60_6025);
    pub const WATER: Pixel = Pixel::from_argb(0xff00_f7ff);
}

#[derive(Serialize, Deserialize)]
struct TableEntry {
    color: Pixel,
    land_cover: LandCover,
}

#[derive(Serialize, Deserialize)]
struct TableFile {
    entries: Vec<TableEntry>,
}

/// Lookup from classification colour to [`LandCover`], with exactly one default.
#[derive(Clone, Debug)]
pub struct ClassificationTable {
    entries: HashMap<Pixel, LandCover>,
    default_color: Pixel,
}

impl ClassificationTable {
    /// Build a table, requiring exactly one entry flagged as default.
    pub fn new(entries: HashMap<Pixel, LandCover>) -> BuildResult<Self> {
        let mut defaults: Vec<Pixel> = entries
            .iter()
            .filter(|(_, cover)| cover.is_default)
            .map(|(color, _)| *color)
            .collect();
        defaults.sort();

        match defaults.as_slice() {
            [color] => Ok(Self {
                default_color: *color,
                entries,
            }),
            [] => Err(BuilderError::Config(
                "classification table has no default land cover".to_string(),
            )),
            many => Err(BuilderError::Config(format!(
                "classification table has {} default land covers ({}), expected exactly one",
                many.len(),
                many.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// The built-in NLCD table. Texture paths are relative to the texture directory.
    pub fn defaults() -> Self {
        use colors::*;
        use ThermalClass::*;

        let forest = "HITW-TS2-forest-mixed-mixed-wilderness-3.jpg";
        let city_farm = "HITW-TS2-Euro-city-farm1-mixed-forest.jpg";
        let farm = "HITW-TS2-european-farm-1.jpg";
        let swamp = "HITW-TS2-swamp.jpg";

        let entries = HashMap::from([
            (
                GRASSLAND,
                LandCover::textured("NLCD Grassland", "HITW-TS2-grass-green.jpg", Moderate).as_default(),
            ),
            (
                DEVELOPED_HIGH_INTENSITY,
                LandCover::textured("NLCD Developed, High Intensity", "HITW-TS2-heavy-urban.jpg", Best),
            ),
            (
                DEVELOPED_MEDIUM_INTENSITY,
                LandCover::textured(
                    "NLCD Developed, Medium Intensity",
                    "HITW-TS2-medium-urban-grass-green.jpg",
                    Best,
                ),
            ),
            (
                DEVELOPED_LOW_INTENSITY,
                LandCover::textured("NLCD Developed, Low Intensity", city_farm, Weak),
            ),
            (
                DEVELOPED_OPEN_SPACE,
                LandCover::textured("NLCD Developed, Open Space", city_farm, Weak),
            ),
            (CULTIVATED_CROPS, LandCover::textured("NLCD Cultivated Crops", farm, Best)),
            (PASTURE, LandCover::textured("NLCD Pasture/Hay", farm, Best)),
            (
                FOREST_CONIFEROUS,
                LandCover::textured("NLCD Evergreen Forest", forest, Weak).with_forest(ForestClass::Coniferous),
            ),
            (
                FOREST_DECIDUOUS,
                LandCover::textured("NLCD Deciduous Forest", forest, Weak).with_forest(ForestClass::Deciduous),
            ),
            (
                FOREST_MIXED,
                LandCover::textured("NLCD Mixed Forest", forest, Weak).with_forest(ForestClass::Mixed),
            ),
            (WETLANDS_EMERGENT, LandCover::textured("NLCD Emergent Wetlands", swamp, None)),
            (WETLANDS_WOODY, LandCover::textured("NLCD Woody Wetlands", swamp, None)),
            (
                BARREN_LAND,
                LandCover::textured("NLCD Barren Land (Rock/Sand/Clay)", "HITW-TS2-Western-barren2.jpg", Moderate),
            ),
            (AERODROME, LandCover::textured("Aerodrome", "HITW-TS2-grass-green.jpg", Moderate)),
            (RUNWAY, LandCover::textured("Hard surface runways", "HITW-TS2-road-top.jpg", Best)),
            (RUNWAY_GRASS, LandCover::textured("Grass runways", "HITW-TS2-grass-yellow.jpg", Moderate)),
            (
                RUNWAY_DIRT,
                LandCover::textured("Dirt runways", "HITW-TS2-Western-barren-canyon-dirt.jpg", Moderate),
            ),
            (ROAD_PAVED, LandCover::flat("Paved roads", ROAD_PAVED, Best)),
            (ROAD_GRAVEL, LandCover::flat("Gravel roads", ROAD_GRAVEL, Weak)),
            (ROAD_DIRT, LandCover::flat("Dirt roads", ROAD_DIRT, Weak)),
            (
                WATER,
                LandCover::flat("Water", Pixel::from_argb(0xff2a_474d), None).as_water(),
            ),
        ]);

        Self {
            entries,
            default_color: GRASSLAND,
        }
    }

    pub fn from_json(json: &str) -> BuildResult<Self> {
        let file: TableFile = serde_json::from_str(json)?;
        let mut entries = HashMap::with_capacity(file.entries.len());
        for entry in file.entries {
            if entries.insert(entry.color, entry.land_cover).is_some() {
                return Err(BuilderError::Config(format!(
                    "classification colour {} listed twice",
                    entry.color
                )));
            }
        }
        Self::new(entries)
    }

    pub fn to_json(&self) -> BuildResult<String> {
        let mut entries: Vec<TableEntry> = self
            .entries
            .iter()
            .map(|(color, land_cover)| TableEntry {
                color: *color,
                land_cover: land_cover.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.color);
        Ok(serde_json::to_string_pretty(&TableFile { entries })?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            BuilderError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> BuildResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load the table at `path`, writing the built-in defaults there first if absent.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        log::info!("No classification table at {}, writing defaults", path.display());
        let table = Self::defaults();
        table.save(path)?;
        Ok(table)
    }

    /// Exact match, or the default land cover for unknown colours.
    pub fn lookup(&self, color: &Pixel) -> &LandCover {
        // `new` and `defaults` guarantee the default colour has an entry
        self.entries
            .get(color)
            .unwrap_or_else(|| &self.entries[&self.default_color])
    }

    pub fn default_land_cover(&self) -> &LandCover {
        self.lookup(&self.default_color)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pixel, &LandCover)> {
        self.entries.iter()
    }

    /// Decode every referenced texture once, sharing buffers between entries
    /// that name the same file. Textures that fail to load are reported and left
    /// empty, which paints them white.
    ///
    /// Returns the number of distinct textures loaded.
    pub fn load_textures(&mut self, texture_dir: &Path, sink: &dyn ProgressSink) -> usize {
        let mut cache: HashMap<PathBuf, Option<Arc<PixelBuffer>>> = HashMap::new();

        for cover in self.entries.values_mut() {
            let LandVisual::Texture { path, texture } = &mut cover.visual else {
                continue;
            };
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                texture_dir.join(path.as_path())
            };

            let loaded = cache.entry(resolved.clone()).or_insert_with(|| {
                match PixelBuffer::load(&resolved) {
                    Ok(buffer) => {
                        log::debug!("Loaded texture {} ({}x{})", resolved.display(), buffer.width, buffer.height);
                        Some(Arc::new(buffer))
                    }
                    Err(e) => {
                        sink.warn(format!("Texture {} unavailable, using white: {e}", resolved.display()));
                        None
                    }
                }
            });
            *texture = loaded.clone();
        }

        cache.values().filter(|t| t.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelSink, NullSink, ProgressEvent};
    use std::sync::mpsc;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_have_single_default() {
        let table = ClassificationTable::defaults();
        let defaults = table.iter().filter(|(_, c)| c.is_default).count();
        assert_eq!(defaults, 1);
        assert_eq!(table.default_land_cover().description, "NLCD Grassland");
    }

    #[test]
    fn test_unknown_color_falls_back_to_default() {
        let table = ClassificationTable::defaults();
        let cover = table.lookup(&Pixel::rgb(1, 2, 3));
        assert!(cover.is_default);

        let water = table.lookup(&colors::WATER);
        assert!(water.is_water);
        assert_eq!(water.thermal, ThermalClass::None);
    }

    #[test]
    fn test_no_default_is_config_error() {
        let entries = HashMap::from([(Pixel::WHITE, LandCover::flat("a", Pixel::WHITE, ThermalClass::Weak))]);
        assert!(matches!(ClassificationTable::new(entries), Err(BuilderError::Config(_))));
    }

    #[test]
    fn test_two_defaults_is_config_error() {
        let entries = HashMap::from([
            (Pixel::WHITE, LandCover::flat("a", Pixel::WHITE, ThermalClass::Weak).as_default()),
            (Pixel::BLACK, LandCover::flat("b", Pixel::BLACK, ThermalClass::Weak).as_default()),
        ]);
        let err = ClassificationTable::new(entries).unwrap_err();
        assert!(err.to_string().contains("expected exactly one"));
    }

    #[test]
    fn test_json_round_trip_keeps_variants() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("textures.json");

        let table = ClassificationTable::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reloaded = ClassificationTable::load(&path).unwrap();
        assert_eq!(reloaded.len(), table.len());
        assert_eq!(reloaded.lookup(&colors::ROAD_PAVED), table.lookup(&colors::ROAD_PAVED));
        assert_eq!(
            reloaded.lookup(&colors::FOREST_MIXED).forest,
            ForestClass::Mixed
        );
    }

    #[test]
    fn test_duplicate_color_rejected() {
        let json = r##"{"entries": [
            {"color": "#FFFFFFFF", "land_cover": {"description": "a", "is_default": true, "visual": {"kind": "flat_color", "color": "#FFFFFFFF"}}},
            {"color": "#FFFFFFFF", "land_cover": {"description": "b", "visual": {"kind": "flat_color", "color": "#FF000000"}}}
        ]}"##;
        assert!(matches!(ClassificationTable::from_json(json), Err(BuilderError::Config(_))));
    }

    #[test]
    fn test_load_textures_shares_buffers() {
        let dir = tempdir().unwrap();
        PixelBuffer::new_with(4, 4, Pixel::rgb(0, 128, 0))
            .save(dir.path().join("grass.bmp"), None)
            .unwrap();

        let entries = HashMap::from([
            (Pixel::WHITE, LandCover::textured("a", "grass.bmp", ThermalClass::Weak).as_default()),
            (Pixel::BLACK, LandCover::textured("b", "grass.bmp", ThermalClass::Best)),
        ]);
        let mut table = ClassificationTable::new(entries).unwrap();
        assert_eq!(table.load_textures(dir.path(), &NullSink), 1);

        let (a, b) = (table.lookup(&Pixel::WHITE), table.lookup(&Pixel::BLACK));
        match (&a.visual, &b.visual) {
            (LandVisual::Texture { texture: Some(ta), .. }, LandVisual::Texture { texture: Some(tb), .. }) => {
                assert!(Arc::ptr_eq(ta, tb));
            }
            other => panic!("textures not loaded: {other:?}"),
        }
        assert_eq!(a.color_for(7, 7), Pixel::rgb(0, 128, 0));
    }

    #[test]
    fn test_missing_texture_warns_and_paints_white() {
        let dir = tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut table = ClassificationTable::defaults();

        assert_eq!(table.load_textures(dir.path(), &ChannelSink::new(tx)), 0);
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, ProgressEvent::Warning { .. })));
        assert_eq!(table.lookup(&colors::GRASSLAND).color_for(0, 0), Pixel::WHITE);
    }
}
