//! Geographic to landscape coordinate conversion.

use std::path::PathBuf;
use std::process::Command;

use super::geometry::{GeoPoint, LandscapePoint};

/// Converts a geographic position to landscape XY.
///
/// Returns `None` when the conversion is unavailable, for example when the
/// converter program is missing or rejects the point.
pub trait CoordinateTransform: Send + Sync {
    fn to_landscape(&self, point: GeoPoint) -> Option<LandscapePoint>;
}

impl<F> CoordinateTransform for F
where
    F: Fn(GeoPoint) -> Option<LandscapePoint> + Send + Sync,
{
    fn to_landscape(&self, point: GeoPoint) -> Option<LandscapePoint> {
        self(point)
    }
}

/// Runs the landscape's coordinate converter once per point:
/// `<program> <landscape> <lat> <lon>`.
#[derive(Clone, Debug)]
pub struct CommandTransform {
    pub program: String,
    pub landscape: String,
    pub working_dir: Option<PathBuf>,
}

impl CommandTransform {
    pub fn new(program: impl Into<String>, landscape: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            landscape: landscape.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl CoordinateTransform for CommandTransform {
    fn to_landscape(&self, point: GeoPoint) -> Option<LandscapePoint> {
        let mut command = Command::new(&self.program);
        command
            .arg(&self.landscape)
            .arg(point.lat.to_string())
            .arg(point.lon.to_string());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = match command.output() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Could not run {}: {e}", self.program);
                return None;
            }
        };
        parse_converter_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the `TPPosX=` and `TPPosY=` values from converter output.
pub fn parse_converter_output(output: &str) -> Option<LandscapePoint> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.ends_with("TPPosX") {
            x = value.trim().parse::<f64>().ok();
        } else if key.ends_with("TPPosY") {
            y = value.trim().parse::<f64>().ok();
        }
    }
    Some(LandscapePoint::new(x?, y?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_converter_output() {
        let output = "CoCoCo v1.0\nTPPosX=12345.5\nTPPosY= 678.25\nDone\n";
        assert_eq!(
            parse_converter_output(output),
            Some(LandscapePoint::new(12345.5, 678.25))
        );
    }

    #[test]
    fn test_parse_requires_both_axes() {
        assert_eq!(parse_converter_output("TPPosX=1\n"), None);
        assert_eq!(parse_converter_output("TPPosX=abc\nTPPosY=2\n"), None);
        assert_eq!(parse_converter_output(""), None);
    }

    #[test]
    fn test_closure_transform() {
        let transform = |p: GeoPoint| Some(LandscapePoint::new(p.lon * 10.0, p.lat * 10.0));
        let out = transform.to_landscape(GeoPoint::new(1.5, 2.0)).unwrap();
        assert_eq!(out, LandscapePoint::new(20.0, 15.0));
    }

    #[test]
    fn test_missing_converter_is_unavailable() {
        let transform = CommandTransform::new("no-such-converter-9876", "Alps");
        assert_eq!(transform.to_landscape(GeoPoint::new(46.0, 7.0)), None);
    }
}
