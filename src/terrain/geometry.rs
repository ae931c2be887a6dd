//! Points, corners and grid rounding for runway footprints.
//!
//! Landscape X grows towards the left of a runway seen from its threshold, so
//! a footprint's left corners have the larger X.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Unrounded position in landscape units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandscapePoint {
    pub x: f64,
    pub y: f64,
}

impl LandscapePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A height-grid sample position; both coordinates are multiples of the resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

impl GridPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn to_landscape(self) -> LandscapePoint {
        LandscapePoint::new(self.x as f64, self.y as f64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunwayCorner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl RunwayCorner {
    pub const ALL: [RunwayCorner; 4] = [
        RunwayCorner::TopLeft,
        RunwayCorner::TopRight,
        RunwayCorner::BottomRight,
        RunwayCorner::BottomLeft,
    ];
}

impl fmt::Display for RunwayCorner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunwayCorner::TopLeft => "top-left",
            RunwayCorner::TopRight => "top-right",
            RunwayCorner::BottomRight => "bottom-right",
            RunwayCorner::BottomLeft => "bottom-left",
        };
        f.write_str(name)
    }
}

/// One value per runway corner, in TL, TR, BR, BL order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunwayCorners<T> {
    pub top_left: T,
    pub top_right: T,
    pub bottom_right: T,
    pub bottom_left: T,
}

impl<T> RunwayCorners<T> {
    pub fn get(&self, corner: RunwayCorner) -> &T {
        match corner {
            RunwayCorner::TopLeft => &self.top_left,
            RunwayCorner::TopRight => &self.top_right,
            RunwayCorner::BottomRight => &self.bottom_right,
            RunwayCorner::BottomLeft => &self.bottom_left,
        }
    }

    /// Apply `f` to each corner in order, stopping at the first error.
    pub fn try_map<U, E>(&self, mut f: impl FnMut(RunwayCorner, &T) -> Result<U, E>) -> Result<RunwayCorners<U>, E> {
        Ok(RunwayCorners {
            top_left: f(RunwayCorner::TopLeft, &self.top_left)?,
            top_right: f(RunwayCorner::TopRight, &self.top_right)?,
            bottom_right: f(RunwayCorner::BottomRight, &self.bottom_right)?,
            bottom_left: f(RunwayCorner::BottomLeft, &self.bottom_left)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + Clone {
        [&self.top_left, &self.top_right, &self.bottom_right, &self.bottom_left].into_iter()
    }
}

/// Round up to the next grid line.
pub fn round_up(value: f64, resolution: i64) -> i64 {
    (value / resolution as f64).ceil() as i64 * resolution
}

/// Round down to the previous grid line.
pub fn round_down(value: f64, resolution: i64) -> i64 {
    (value / resolution as f64).floor() as i64 * resolution
}

/// dy/dx from `a` to `b`. Infinite for vertical lines, NaN when the points coincide.
pub fn slope(a: LandscapePoint, b: LandscapePoint) -> f64 {
    (b.y - a.y) / (b.x - a.x)
}

/// True when `p` is inside `polygon` or on one of its edges.
pub fn polygon_contains(polygon: &[GridPoint], p: GridPoint) -> bool {
    if polygon.is_empty() {
        return false;
    }

    let edges = polygon.iter().zip(polygon.iter().cycle().skip(1));

    let mut inside = false;
    for (a, b) in edges {
        if on_segment(*a, *b, p) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x as f64 + (p.y - a.y) as f64 * (b.x - a.x) as f64 / (b.y - a.y) as f64;
            if (p.x as f64) < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_segment(a: GridPoint, b: GridPoint, p: GridPoint) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    cross == 0
        && p.x >= a.x.min(b.x)
        && p.x <= a.x.max(b.x)
        && p.y >= a.y.min(b.y)
        && p.y <= a.y.max(b.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_to_resolution() {
        assert_eq!(round_up(95.0, 30), 120);
        assert_eq!(round_up(90.0, 30), 90);
        assert_eq!(round_down(35.0, 30), 30);
        assert_eq!(round_down(-1.0, 30), -30);
        assert_eq!(round_up(-0.0, 30), 0);
    }

    #[test]
    fn test_slope_of_vertical_line_is_infinite() {
        let s = slope(LandscapePoint::new(95.0, 100.0), LandscapePoint::new(95.0, 40.0));
        assert!(s.is_infinite() && s < 0.0);
        // Stepping along a vertical side keeps X fixed
        assert_eq!((20.0 / s + 95.0), 95.0);
        assert!(slope(LandscapePoint::new(1.0, 1.0), LandscapePoint::new(1.0, 1.0)).is_nan());
    }

    #[test]
    fn test_polygon_contains_edges_and_interior() {
        let square = [
            GridPoint::new(0, 0),
            GridPoint::new(60, 0),
            GridPoint::new(60, 60),
            GridPoint::new(0, 60),
        ];
        assert!(polygon_contains(&square, GridPoint::new(30, 30)));
        assert!(polygon_contains(&square, GridPoint::new(0, 30)));
        assert!(polygon_contains(&square, GridPoint::new(60, 60)));
        assert!(!polygon_contains(&square, GridPoint::new(90, 30)));
        assert!(!polygon_contains(&square, GridPoint::new(-30, -30)));
    }

    #[test]
    fn test_polygon_contains_diamond() {
        let diamond = [
            GridPoint::new(60, 0),
            GridPoint::new(120, 60),
            GridPoint::new(60, 120),
            GridPoint::new(0, 60),
        ];
        assert!(polygon_contains(&diamond, GridPoint::new(60, 60)));
        assert!(polygon_contains(&diamond, GridPoint::new(30, 30)));
        assert!(!polygon_contains(&diamond, GridPoint::new(0, 0)));
        assert!(!polygon_contains(&diamond, GridPoint::new(120, 120)));
    }

    #[test]
    fn test_corners_try_map_stops_on_error() {
        let corners = RunwayCorners {
            top_left: 1,
            top_right: 2,
            bottom_right: 3,
            bottom_left: 4,
        };
        let doubled: Result<_, ()> = corners.try_map(|_, v| Ok(v * 2));
        assert_eq!(doubled.unwrap().bottom_left, 8);

        let failed = corners.try_map(|corner, v| if *v == 3 { Err(corner) } else { Ok(*v) });
        assert_eq!(failed.unwrap_err(), RunwayCorner::BottomRight);
    }
}
