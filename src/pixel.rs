//! RGBA pixel value used for classification keys and raster outputs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single 8-bit-per-channel RGBA pixel.
///
/// Equality is exact per channel, so a pixel can key the classification table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const BLACK: Pixel = Pixel::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Pixel = Pixel::rgb(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque pixel
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0xff)
    }

    /// Build from a packed `0xAARRGGBB` value.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Anything other than opaque black counts as "present" in forest masks.
    pub fn is_black(&self) -> bool {
        *self == Self::BLACK
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_rgba(channels: [u8; 4]) -> Self {
        Self::new(channels[0], channels[1], channels[2], channels[3])
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.to_argb())
    }
}

impl std::str::FromStr for Pixel {
    type Err = String;

    /// Parses `#AARRGGBB` or `#RRGGBB` (opaque).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("invalid color '{s}': not a hex value"));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|e| format!("invalid color '{s}': {e}"))?;
        match hex.len() {
            8 => Ok(Self::from_argb(value)),
            6 => Ok(Self::from_argb(0xff00_0000 | value)),
            _ => Err(format!("invalid color '{s}': expected #AARRGGBB or #RRGGBB")),
        }
    }
}

impl Serialize for Pixel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pixel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_packing() {
        let p = Pixel::from_argb(0xff1c6330);
        assert_eq!(p, Pixel::rgb(0x1c, 0x63, 0x30));
        assert_eq!(p.to_argb(), 0xff1c6330);
    }

    #[test]
    fn test_black_requires_opaque_alpha() {
        assert!(Pixel::BLACK.is_black());
        assert!(!Pixel::new(0, 0, 0, 0).is_black());
        assert!(!Pixel::WHITE.is_black());
    }

    #[test]
    fn test_parse_and_display() {
        let p: Pixel = "#FF00F7FF".parse().unwrap();
        assert_eq!(p, Pixel::rgb(0x00, 0xf7, 0xff));
        assert_eq!(p.to_string(), "#FF00F7FF");

        let opaque: Pixel = "#2a474d".parse().unwrap();
        assert_eq!(opaque.a, 0xff);
        assert!("#12345".parse::<Pixel>().is_err());
    }

    #[test]
    fn test_parse_rejects_sign_and_whitespace() {
        assert!("#+1234567".parse::<Pixel>().is_err());
        assert!("+12345".parse::<Pixel>().is_err());
        assert!("#-1234567".parse::<Pixel>().is_err());
        assert!("# 1234567".parse::<Pixel>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Pixel::from_argb(0x80404040)).unwrap();
        assert_eq!(json, "\"#80404040\"");
        let back: Pixel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.a, 0x80);
    }
}
