//! Build configuration and output directory layout.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildResult, BuilderError};
use crate::terrain::CommandTransform;
use crate::tile::PATCHES_PER_SIDE;

const APP_DIR: &str = "landscape_builder";
const SETTINGS_FILE: &str = "settings.json";
const TEXTURES_FILE: &str = "textures.json";
const HEIGHTMAP_DIR: &str = "HeightMaps";

/// Geometry of the landscape height grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightGridLayout {
    /// Distance between height samples, in landscape units
    pub resolution: i64,
    /// Side length of one height-map patch, in landscape units
    pub patch_size: i64,
}

impl Default for HeightGridLayout {
    fn default() -> Self {
        Self {
            resolution: 30,
            patch_size: 5760,
        }
    }
}

impl HeightGridLayout {
    /// Samples per patch side, including the shared edge row.
    pub fn samples_per_side(&self) -> usize {
        (self.patch_size / self.resolution) as usize + 1
    }

    /// Size in bytes of one patch file.
    pub fn patch_bytes(&self) -> usize {
        let n = self.samples_per_side();
        n * n * 2
    }
}

/// Program names of the external tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub dds_compressor: String,
    pub landscape_editor: String,
    pub coordinate_converter: String,
    /// Directory the converter runs in; it reads its ini file from there
    pub converter_dir: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            dds_compressor: "nvdxt.exe".to_string(),
            landscape_editor: "LandscapeEditor.exe".to_string(),
            coordinate_converter: "CoCoCo.exe".to_string(),
            converter_dir: None,
        }
    }
}

/// Everything a build needs to know about directories and sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Landscape name, used for final file names and the live landscape directory
    pub landscape_name: Option<String>,
    /// Directory holding the `XXYY` classification tiles
    pub input_dir: PathBuf,
    /// Root for intermediate outputs
    pub output_dir: PathBuf,
    /// Directory containing installed landscapes, one sub-directory per landscape
    pub landscapes_root: Option<PathBuf>,
    /// Base directory for relative texture paths
    pub texture_dir: PathBuf,
    /// Side length of the per-tile texture, forest and thermal buffers
    pub tile_size: usize,
    /// Side length the forest masks are downsampled to
    pub forest_mask_size: usize,
    /// Side length each tile's thermal mask is downsampled to
    pub thermal_tile_size: usize,
    pub height_grid: HeightGridLayout,
    pub tools: ToolConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            landscape_name: None,
            input_dir: PathBuf::from("Atlas"),
            output_dir: PathBuf::from("BuilderOutput"),
            landscapes_root: None,
            texture_dir: PathBuf::from("Textures"),
            tile_size: 8192,
            forest_mask_size: 2048,
            thermal_tile_size: 256,
            height_grid: HeightGridLayout::default(),
            tools: ToolConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Per-user settings directory, created on demand.
    pub fn config_dir() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join(APP_DIR);
        fs::create_dir_all(&path).ok()?;
        Some(path)
    }

    pub fn default_settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(SETTINGS_FILE))
    }

    pub fn default_textures_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(TEXTURES_FILE))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            BuilderError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| BuilderError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from `path`, writing defaults there first if the file is absent.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> BuildResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> BuildResult<()> {
        for (name, size) in [
            ("tile_size", self.tile_size),
            ("forest_mask_size", self.forest_mask_size),
            ("thermal_tile_size", self.thermal_tile_size),
        ] {
            if size == 0 {
                return Err(BuilderError::Config(format!("{name} must be positive")));
            }
            if size % PATCHES_PER_SIDE != 0 {
                return Err(BuilderError::Config(format!(
                    "{name} ({size}) must be divisible by {PATCHES_PER_SIDE}"
                )));
            }
        }

        let grid = self.height_grid;
        if grid.resolution <= 0 || grid.patch_size <= 0 {
            return Err(BuilderError::Config(
                "height grid resolution and patch size must be positive".to_string(),
            ));
        }
        if grid.patch_size % grid.resolution != 0 {
            return Err(BuilderError::Config(format!(
                "height grid patch size {} is not a multiple of resolution {}",
                grid.patch_size, grid.resolution
            )));
        }
        Ok(())
    }

    /// Name used for final files when no landscape name is configured.
    pub fn landscape_file_stem(&self) -> &str {
        self.landscape_name.as_deref().unwrap_or("[LandscapeName]")
    }

    /// The installed landscape directory, if both the root and a name are known.
    pub fn landscape_dir(&self) -> Option<PathBuf> {
        match (&self.landscapes_root, &self.landscape_name) {
            (Some(root), Some(name)) => Some(root.join(name)),
            _ => None,
        }
    }

    /// Resolve where final outputs go.
    ///
    /// When `to_landscape` is requested but the landscape directory does not
    /// exist, falls back to `<output>/Final` and reports `written_to_landscape`
    /// as false.
    pub fn layout(&self, to_landscape: bool) -> OutputLayout {
        let live = if to_landscape {
            match self.landscape_dir() {
                Some(dir) if dir.is_dir() => Some(dir),
                other => {
                    log::warn!(
                        "Landscape directory {} not found, final outputs go to {}",
                        other.map(|d| d.display().to_string()).unwrap_or_else(|| "(unset)".to_string()),
                        self.output_dir.join("Final").display()
                    );
                    None
                }
            }
        } else {
            None
        };

        OutputLayout {
            output: self.output_dir.clone(),
            written_to_landscape: live.is_some(),
            final_dir: live.unwrap_or_else(|| self.output_dir.join("Final")),
        }
    }

    /// Where height-map patches are read from before flattening. When final
    /// outputs go to the landscape this is the directory they are written to.
    pub fn heightmap_source_dir(&self, layout: &OutputLayout) -> PathBuf {
        match self.landscape_dir() {
            Some(dir) => dir.join(HEIGHTMAP_DIR),
            None => layout.final_heightmap_dir(),
        }
    }

    /// Converter for this landscape's coordinates.
    pub fn coordinate_transform(&self) -> CommandTransform {
        let transform = CommandTransform::new(&self.tools.coordinate_converter, self.landscape_file_stem());
        match &self.tools.converter_dir {
            Some(dir) => transform.with_working_dir(dir),
            None => transform,
        }
    }
}

/// Directory structure for intermediate and final outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub output: PathBuf,
    pub final_dir: PathBuf,
    pub written_to_landscape: bool,
}

impl OutputLayout {
    pub fn textures(&self) -> PathBuf {
        self.output.join("Textures")
    }

    pub fn texture_patches(&self) -> PathBuf {
        self.textures().join("Patches")
    }

    pub fn forest_maps(&self) -> PathBuf {
        self.output.join("ForestMaps")
    }

    pub fn thermal_maps(&self) -> PathBuf {
        self.output.join("ThermalMaps")
    }

    pub fn thermal_tiles(&self) -> PathBuf {
        self.thermal_maps().join("Tiles")
    }

    pub fn thermal_mosaic(&self) -> PathBuf {
        self.thermal_maps().join("ThermalMap.bmp")
    }

    pub fn final_textures(&self) -> PathBuf {
        self.final_dir.join("Textures")
    }

    pub fn final_forest_maps(&self) -> PathBuf {
        self.final_dir.join("ForestMaps")
    }

    pub fn final_heightmap_dir(&self) -> PathBuf {
        self.final_dir.join(HEIGHTMAP_DIR)
    }

    pub fn create_all(&self) -> BuildResult<()> {
        for dir in [
            self.output.clone(),
            self.texture_patches(),
            self.forest_maps(),
            self.thermal_tiles(),
            self.final_textures(),
            self.final_forest_maps(),
            self.final_heightmap_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
