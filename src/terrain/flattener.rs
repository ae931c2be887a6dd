//! Flattening the height grid under a runway footprint.
//!
//! The footprint's corners are converted to landscape XY and rounded outwards
//! onto the height grid. The rounded quadrilateral is traced side by side at
//! grid resolution, optionally filled, and every resulting sample is set to the
//! runway elevation.
//!
//! Corners must be given as top-left, top-right, bottom-right, bottom-left,
//! with the left side at larger X. Other orderings produce a wrong polygon.

use std::collections::BTreeSet;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::geometry::{
    polygon_contains, round_down, round_up, slope, GeoPoint, GridPoint, LandscapePoint, RunwayCorner,
    RunwayCorners,
};
use super::heightgrid::{GridCell, HeightGridStore};
use super::projection::CoordinateTransform;
use crate::config::HeightGridLayout;
use crate::error::{BuildResult, BuilderError};
use crate::progress::{ProgressEvent, ProgressSink};

/// Geographic runway outline and the elevation to flatten it to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunwayFootprint {
    pub name: String,
    pub corners: RunwayCorners<GeoPoint>,
    pub elevation: i16,
}

#[derive(Clone, Debug)]
pub struct TerrainFlattener {
    name: String,
    elevation: i16,
    layout: HeightGridLayout,
    unrounded: RunwayCorners<LandscapePoint>,
    corners: RunwayCorners<GridPoint>,
    boundary: Vec<GridPoint>,
    interior: Vec<GridPoint>,
}

impl TerrainFlattener {
    /// Convert the footprint with `transform` and compute its grid points.
    ///
    /// Fails with `ConversionUnavailable` if any corner cannot be converted.
    pub fn new(
        footprint: &RunwayFootprint,
        transform: &dyn CoordinateTransform,
        layout: HeightGridLayout,
        fill_interior: bool,
    ) -> BuildResult<Self> {
        let unrounded = footprint.corners.try_map(|corner, geo| {
            transform
                .to_landscape(*geo)
                .ok_or_else(|| BuilderError::ConversionUnavailable {
                    runway: footprint.name.clone(),
                    corner: corner.to_string(),
                })
        })?;
        Self::from_landscape(&footprint.name, unrounded, footprint.elevation, layout, fill_interior)
    }

    /// Build from corners already in landscape XY.
    pub fn from_landscape(
        name: &str,
        unrounded: RunwayCorners<LandscapePoint>,
        elevation: i16,
        layout: HeightGridLayout,
        fill_interior: bool,
    ) -> BuildResult<Self> {
        let degenerate = |reason: String| BuilderError::DegenerateFootprint {
            runway: name.to_string(),
            reason,
        };

        if let Some(corner) = RunwayCorner::ALL.into_iter().find(|c| !unrounded.get(*c).is_finite()) {
            return Err(degenerate(format!("{corner} corner is not a finite point")));
        }

        let corners = round_corners(&unrounded, layout.resolution).map_err(|corner| {
            degenerate(format!("{corner} corner cannot be rounded onto the grid"))
        })?;

        let boundary = trace_boundary(&corners, layout.resolution)
            .ok_or_else(|| degenerate("a side has an undefined slope".to_string()))?;
        let interior = if fill_interior {
            interior_points(&boundary, layout.resolution)
        } else {
            Vec::new()
        };

        Ok(Self {
            name: name.to_string(),
            elevation,
            layout,
            unrounded,
            corners,
            boundary,
            interior,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elevation(&self) -> i16 {
        self.elevation
    }

    pub fn unrounded(&self) -> &RunwayCorners<LandscapePoint> {
        &self.unrounded
    }

    pub fn corners(&self) -> &RunwayCorners<GridPoint> {
        &self.corners
    }

    pub fn boundary(&self) -> &[GridPoint] {
        &self.boundary
    }

    pub fn interior(&self) -> &[GridPoint] {
        &self.interior
    }

    /// Boundary and interior without duplicates.
    pub fn points(&self) -> BTreeSet<GridPoint> {
        self.boundary.iter().chain(self.interior.iter()).copied().collect()
    }

    /// Height-grid cells covered by this footprint.
    pub fn cells(&self) -> BuildResult<BTreeSet<GridCell>> {
        self.points().into_iter().map(|p| self.layout.locate(p)).collect()
    }

    /// Write the elevation into every covered cell of `store`.
    pub fn flatten(&self, store: &HeightGridStore) -> BuildResult<usize> {
        let cells = self.cells()?;
        store.write_cells(&cells, self.elevation)
    }

    /// Point lists for plotting, one block per stage: unrounded corners,
    /// rounded corners, boundary, interior and the union. Closed outlines repeat
    /// their first point. X is negated so the plot is not mirrored.
    pub fn plot_lines(&self) -> Vec<String> {
        fn line(x: impl std::fmt::Display, y: impl std::fmt::Display) -> String {
            format!("-{x},{y}\n")
        }
        fn closed<'a, T: 'a + Copy>(points: impl Iterator<Item = &'a T> + Clone, f: impl Fn(T) -> String) -> String {
            let mut out: String = points.clone().map(|p| f(*p)).collect();
            if let Some(first) = points.clone().next() {
                out.push_str(&f(*first));
            }
            out
        }

        let landscape = |p: LandscapePoint| line(p.x, p.y);
        let grid = |p: GridPoint| line(p.x, p.y);

        vec![
            closed(self.unrounded.iter(), landscape),
            closed(self.corners.iter(), grid),
            closed(self.boundary.iter(), grid),
            self.interior.iter().map(|p| grid(*p)).collect(),
            self.points().into_iter().map(grid).collect(),
        ]
    }
}

/// Round each corner outwards. Y goes to the grid line away from the runway;
/// X follows the left side's slope from the corner to that Y, then rounds away.
///
/// Fails with the first corner whose X cannot be solved.
fn round_corners(
    corners: &RunwayCorners<LandscapePoint>,
    resolution: i64,
) -> Result<RunwayCorners<GridPoint>, RunwayCorner> {
    // Unrounded left and right sides are parallel
    let side_slope = slope(corners.top_left, corners.bottom_left);

    corners.try_map(|corner, p| {
        let (up_y, up_x) = match corner {
            RunwayCorner::TopLeft => (true, true),
            RunwayCorner::TopRight => (true, false),
            RunwayCorner::BottomRight => (false, false),
            RunwayCorner::BottomLeft => (false, true),
        };
        let y = if up_y { round_up(p.y, resolution) } else { round_down(p.y, resolution) };
        let x = (y as f64 - p.y) / side_slope + p.x;
        if !x.is_finite() {
            return Err(corner);
        }
        let x = if up_x { round_up(x, resolution) } else { round_down(x, resolution) };
        Ok(GridPoint::new(x, y))
    })
}

/// Walk TL -> BL -> BR -> TR -> TL one grid step at a time, solving the other
/// coordinate from the rounded side and rounding it outwards.
///
/// Returns `None` if a side's interpolation is undefined.
fn trace_boundary(corners: &RunwayCorners<GridPoint>, resolution: i64) -> Option<Vec<GridPoint>> {
    let RunwayCorners {
        top_left: tl,
        top_right: tr,
        bottom_right: br,
        bottom_left: bl,
    } = *corners;

    let left_slope = slope(tl.to_landscape(), bl.to_landscape());
    let bottom_slope = slope(bl.to_landscape(), br.to_landscape());
    let right_slope = slope(br.to_landscape(), tr.to_landscape());
    let top_slope = slope(tr.to_landscape(), tl.to_landscape());

    let solve = |value: f64| value.is_finite().then_some(value);

    let mut points = vec![tl];

    let mut y = tl.y;
    while y > bl.y {
        y -= resolution;
        let x = solve((y - tl.y) as f64 / left_slope + tl.x as f64)?;
        points.push(GridPoint::new(round_up(x, resolution), y));
    }
    points.push(bl);

    let mut x = bl.x;
    while x > br.x {
        x -= resolution;
        let y = solve((x - bl.x) as f64 * bottom_slope + bl.y as f64)?;
        points.push(GridPoint::new(x, round_down(y, resolution)));
    }
    points.push(br);

    let mut y = br.y;
    while y < tr.y {
        y += resolution;
        let x = solve((y - br.y) as f64 / right_slope + br.x as f64)?;
        points.push(GridPoint::new(round_down(x, resolution), y));
    }
    points.push(tr);

    let mut x = tr.x;
    while x < tl.x {
        x += resolution;
        let y = solve((x - tr.x) as f64 * top_slope + tr.y as f64)?;
        points.push(GridPoint::new(x, round_up(y, resolution)));
    }

    points.dedup();
    Some(points)
}

/// Grid points inside or on the boundary polygon, scanning the bounding box
/// from its max corner down, excluding the min row and column.
fn interior_points(boundary: &[GridPoint], resolution: i64) -> Vec<GridPoint> {
    let (Some(x_min), Some(x_max)) = (
        boundary.iter().map(|p| p.x).min(),
        boundary.iter().map(|p| p.x).max(),
    ) else {
        return Vec::new();
    };
    let (Some(y_min), Some(y_max)) = (
        boundary.iter().map(|p| p.y).min(),
        boundary.iter().map(|p| p.y).max(),
    ) else {
        return Vec::new();
    };

    let mut inner = Vec::new();
    let mut i = x_max;
    while i > x_min {
        let mut j = y_max;
        while j > y_min {
            let point = GridPoint::new(i, j);
            if polygon_contains(boundary, point) {
                inner.push(point);
            }
            j -= resolution;
        }
        i -= resolution;
    }
    inner
}

/// Outcome of flattening one runway.
#[derive(Debug)]
pub struct RunwayResult {
    pub runway: String,
    pub result: BuildResult<usize>,
}

/// Flatten many runways in parallel into one store.
///
/// Each runway fails independently; a failed runway writes nothing. Patches
/// are not persisted here, call [`HeightGridStore::persist`] afterwards.
pub fn flatten_runways(
    footprints: &[RunwayFootprint],
    transform: &dyn CoordinateTransform,
    store: &HeightGridStore,
    fill_interior: bool,
    sink: &dyn ProgressSink,
) -> Vec<RunwayResult> {
    let layout = *store.layout();
    footprints
        .par_iter()
        .map(|footprint| {
            let started = Instant::now();
            let result = TerrainFlattener::new(footprint, transform, layout, fill_interior)
                .and_then(|flattener| flattener.flatten(store));

            match &result {
                Ok(cells) => {
                    log::debug!("{} flattened in {:.2}s", footprint.name, started.elapsed().as_secs_f64());
                    sink.emit(ProgressEvent::RunwayFlattened {
                        runway: footprint.name.clone(),
                        cells: *cells,
                    })
                }
                Err(e) => sink.emit(ProgressEvent::RunwayFailed {
                    runway: footprint.name.clone(),
                    reason: e.to_string(),
                }),
            }
            RunwayResult {
                runway: footprint.name.clone(),
                result,
            }
        })
        .collect()
}
