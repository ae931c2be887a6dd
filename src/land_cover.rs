//! Land-cover descriptors: what a classification colour turns into on each
//! output layer.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pixel::Pixel;
use crate::pixel_buffer::PixelBuffer;

/// Thermal lift strength for a land-cover type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalClass {
    #[default]
    None,
    Weak,
    Moderate,
    Best,
}

impl ThermalClass {
    /// Gray level written to the thermal mask.
    pub fn color(self) -> Pixel {
        match self {
            ThermalClass::None => Pixel::from_argb(0xff00_0000),
            ThermalClass::Weak => Pixel::from_argb(0xff40_4040),
            ThermalClass::Moderate => Pixel::from_argb(0xff66_6666),
            ThermalClass::Best => Pixel::from_argb(0xffb2_b2b2),
        }
    }
}

/// Which forest layers a land-cover type contributes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForestClass {
    #[default]
    None,
    Coniferous,
    Deciduous,
    Mixed,
}

impl ForestClass {
    /// Byte stored in `.for` files.
    pub fn code(self) -> u8 {
        match self {
            ForestClass::None => 0,
            ForestClass::Coniferous => 1,
            ForestClass::Deciduous => 2,
            ForestClass::Mixed => 3,
        }
    }

    pub fn from_presence(deciduous: bool, coniferous: bool) -> Self {
        match (deciduous, coniferous) {
            (true, true) => ForestClass::Mixed,
            (true, false) => ForestClass::Deciduous,
            (false, true) => ForestClass::Coniferous,
            (false, false) => ForestClass::None,
        }
    }

    pub fn has_deciduous(self) -> bool {
        matches!(self, ForestClass::Deciduous | ForestClass::Mixed)
    }

    pub fn has_coniferous(self) -> bool {
        matches!(self, ForestClass::Coniferous | ForestClass::Mixed)
    }
}

/// How a land-cover type is painted on the visual texture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LandVisual {
    FlatColor {
        color: Pixel,
    },
    Texture {
        /// Image path, relative paths resolve against the texture directory
        path: PathBuf,
        /// Decoded image, shared between entries that reference the same file
        #[serde(skip)]
        texture: Option<Arc<PixelBuffer>>,
    },
}

/// Descriptor for one classification colour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandCover {
    pub description: String,
    #[serde(default)]
    pub thermal: ThermalClass,
    #[serde(default)]
    pub forest: ForestClass,
    #[serde(default)]
    pub is_water: bool,
    /// Fallback for classification colours missing from the table
    #[serde(default)]
    pub is_default: bool,
    pub visual: LandVisual,
}

impl LandCover {
    pub fn flat(description: &str, color: Pixel, thermal: ThermalClass) -> Self {
        Self {
            description: description.to_string(),
            thermal,
            forest: ForestClass::None,
            is_water: false,
            is_default: false,
            visual: LandVisual::FlatColor { color },
        }
    }

    pub fn textured(description: &str, path: impl Into<PathBuf>, thermal: ThermalClass) -> Self {
        Self {
            description: description.to_string(),
            thermal,
            forest: ForestClass::None,
            is_water: false,
            is_default: false,
            visual: LandVisual::Texture {
                path: path.into(),
                texture: None,
            },
        }
    }

    pub fn with_forest(mut self, forest: ForestClass) -> Self {
        self.forest = forest;
        self
    }

    pub fn as_water(mut self) -> Self {
        self.is_water = true;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Visual colour at output position (i, j).
    ///
    /// Textures are sampled with wraparound. Water is made fully transparent so
    /// the renderer's water layer shows through. A texture that never loaded
    /// paints opaque white.
    pub fn color_for(&self, i: usize, j: usize) -> Pixel {
        let color = match &self.visual {
            LandVisual::FlatColor { color } => *color,
            LandVisual::Texture {
                texture: Some(texture),
                ..
            } => texture.get(i, j),
            LandVisual::Texture { texture: None, .. } => return Pixel::WHITE,
        };
        if self.is_water {
            color.with_alpha(0)
        } else {
            color
        }
    }

    pub fn deciduous_mask(&self) -> Pixel {
        if self.forest.has_deciduous() {
            Pixel::WHITE
        } else {
            Pixel::BLACK
        }
    }

    pub fn coniferous_mask(&self) -> Pixel {
        if self.forest.has_coniferous() {
            Pixel::WHITE
        } else {
            Pixel::BLACK
        }
    }

    pub fn thermal_color(&self) -> Pixel {
        self.thermal.color()
    }
}
