//! Airport records: JSON storage and the binary `.apt` format.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BuildResult, BuilderError};
use crate::terrain::{GeoPoint, RunwayCorners, RunwayFootprint};

/// Size of one airport record in a `.apt` file.
pub const APT_RECORD_LEN: usize = 0x48;

/// Longest name that fits between the length byte and the latitude field.
pub const APT_NAME_MAX: usize = 0x24 - 0x01;

mod offset {
    pub const NAME_LENGTH: usize = 0x00;
    pub const NAME: usize = 0x01;
    pub const LATITUDE: usize = 0x24;
    pub const LONGITUDE: usize = 0x28;
    pub const ALTITUDE: usize = 0x2C;
    pub const DIRECTION: usize = 0x30;
    pub const LENGTH: usize = 0x34;
    pub const WIDTH: usize = 0x38;
    pub const ASPHALT: usize = 0x3C;
    pub const FREQUENCY: usize = 0x40;
    pub const PRIMARY_DIRECTION_REVERSED: usize = 0x44;
    pub const TOW_PRIMARY_LEFT_SIDE: usize = 0x45;
    pub const TOW_SECONDARY_LEFT_SIDE: usize = 0x46;
}

fn default_frequency() -> f32 {
    123.3
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub name: String,
    pub latitude: f32,
    pub longitude: f32,
    /// Field elevation in metres
    pub altitude: f32,
    /// Runway heading in degrees
    pub direction: i32,
    /// Runway length in metres
    pub length: i32,
    /// Runway width in metres
    pub width: i32,
    #[serde(default)]
    pub asphalt: bool,
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    #[serde(default)]
    pub primary_direction_reversed: bool,
    #[serde(default)]
    pub tow_primary_left_side: bool,
    #[serde(default)]
    pub tow_secondary_left_side: bool,
    /// Runway outline, needed for terrain flattening
    #[serde(default)]
    pub runway_corners: Option<RunwayCorners<GeoPoint>>,
}

impl Airport {
    /// Encode as a fixed-size little-endian `.apt` record. Names longer than
    /// the name field are truncated at a character boundary.
    pub fn apt_record(&self) -> [u8; APT_RECORD_LEN] {
        let mut record = [0u8; APT_RECORD_LEN];

        let mut end = self.name.len().min(APT_NAME_MAX);
        while !self.name.is_char_boundary(end) {
            end -= 1;
        }
        let name = &self.name.as_bytes()[..end];
        record[offset::NAME_LENGTH] = name.len() as u8;
        record[offset::NAME..offset::NAME + name.len()].copy_from_slice(name);

        let mut put = |at: usize, bytes: [u8; 4]| record[at..at + 4].copy_from_slice(&bytes);
        put(offset::LATITUDE, self.latitude.to_le_bytes());
        put(offset::LONGITUDE, self.longitude.to_le_bytes());
        put(offset::ALTITUDE, self.altitude.to_le_bytes());
        put(offset::DIRECTION, self.direction.to_le_bytes());
        put(offset::LENGTH, self.length.to_le_bytes());
        put(offset::WIDTH, self.width.to_le_bytes());
        put(offset::FREQUENCY, self.frequency.to_le_bytes());

        record[offset::ASPHALT] = self.asphalt as u8;
        record[offset::PRIMARY_DIRECTION_REVERSED] = self.primary_direction_reversed as u8;
        record[offset::TOW_PRIMARY_LEFT_SIDE] = self.tow_primary_left_side as u8;
        record[offset::TOW_SECONDARY_LEFT_SIDE] = self.tow_secondary_left_side as u8;
        record
    }

    /// Altitude as a height-map sample.
    pub fn elevation(&self) -> i16 {
        self.altitude.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }

    /// Runway footprint for flattening, if corners are known.
    pub fn footprint(&self) -> Option<RunwayFootprint> {
        self.runway_corners.map(|corners| RunwayFootprint {
            name: self.name.clone(),
            corners,
            elevation: self.elevation(),
        })
    }
}

pub fn load_airports<P: AsRef<Path>>(path: P) -> BuildResult<Vec<Airport>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BuilderError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Concatenate every airport's record.
pub fn apt_bytes(airports: &[Airport]) -> Vec<u8> {
    airports.iter().flat_map(|a| a.apt_record()).collect()
}

pub fn write_apt<P: AsRef<Path>>(airports: &[Airport], path: P) -> BuildResult<usize> {
    let bytes = apt_bytes(airports);
    fs::write(path, &bytes)?;
    Ok(bytes.len())
}
