//! Height-map patch files (`h{patch}.tr3`) and a shared store for editing them.
//!
//! A patch file is a square grid of little-endian `i16` samples, stored
//! column-major: sample (x, y) lives at index `x * samples_per_side + y`.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::geometry::GridPoint;
use crate::config::HeightGridLayout;
use crate::error::{BuildResult, BuilderError};
use crate::tile::PatchCoord;

/// A sample position resolved to its patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub patch: PatchCoord,
    pub x_offset: usize,
    pub y_offset: usize,
}

impl HeightGridLayout {
    /// Patch and intra-patch sample offset for a landscape grid point.
    pub fn locate(&self, point: GridPoint) -> BuildResult<GridCell> {
        if point.x < 0 || point.y < 0 {
            return Err(BuilderError::OutsideLandscape {
                x: point.x,
                y: point.y,
            });
        }
        Ok(GridCell {
            patch: PatchCoord::new(
                (point.x / self.patch_size) as usize,
                (point.y / self.patch_size) as usize,
            ),
            x_offset: ((point.x % self.patch_size) / self.resolution) as usize,
            y_offset: ((point.y % self.patch_size) / self.resolution) as usize,
        })
    }
}

pub fn patch_file_name(coord: PatchCoord) -> String {
    format!("h{coord}.tr3")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeightGridPatch {
    pub coord: PatchCoord,
    samples_per_side: usize,
    data: Vec<i16>,
    dirty: bool,
}

impl HeightGridPatch {
    pub fn new_flat(coord: PatchCoord, layout: &HeightGridLayout, elevation: i16) -> Self {
        let n = layout.samples_per_side();
        Self {
            coord,
            samples_per_side: n,
            data: vec![elevation; n * n],
            dirty: false,
        }
    }

    pub fn from_bytes(coord: PatchCoord, bytes: &[u8], layout: &HeightGridLayout, path: &Path) -> BuildResult<Self> {
        if bytes.len() != layout.patch_bytes() {
            return Err(BuilderError::CorruptHeightmap {
                path: path.to_path_buf(),
                reason: format!("expected {} bytes, found {}", layout.patch_bytes(), bytes.len()),
            });
        }
        Ok(Self {
            coord,
            samples_per_side: layout.samples_per_side(),
            data: bytes
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
            dirty: false,
        })
    }

    pub fn load(coord: PatchCoord, dir: &Path, layout: &HeightGridLayout) -> BuildResult<Self> {
        let path = dir.join(patch_file_name(coord));
        if !path.exists() {
            return Err(BuilderError::FileNotFound { path });
        }
        let bytes = fs::read(&path)?;
        Self::from_bytes(coord, &bytes, layout, &path)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn save(&self, dir: &Path) -> BuildResult<PathBuf> {
        let path = dir.join(patch_file_name(self.coord));
        fs::write(&path, self.to_bytes())?;
        Ok(path)
    }

    pub fn get(&self, x_offset: usize, y_offset: usize) -> i16 {
        self.data[x_offset * self.samples_per_side + y_offset]
    }

    pub fn set(&mut self, x_offset: usize, y_offset: usize, elevation: i16) {
        self.data[x_offset * self.samples_per_side + y_offset] = elevation;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Lazily loaded height-map patches shared between concurrent flattening jobs.
///
/// Each patch sits behind its own mutex so writes to one patch are serialized
/// while different patches are edited in parallel.
pub struct HeightGridStore {
    source_dir: PathBuf,
    output_dir: PathBuf,
    layout: HeightGridLayout,
    patches: Mutex<HashMap<PatchCoord, Arc<Mutex<HeightGridPatch>>>>,
}

impl HeightGridStore {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, layout: HeightGridLayout) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            layout,
            patches: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &HeightGridLayout {
        &self.layout
    }

    /// Fetch a patch, loading it from the source directory the first time.
    pub fn patch(&self, coord: PatchCoord) -> BuildResult<Arc<Mutex<HeightGridPatch>>> {
        let mut patches = lock(&self.patches);
        if let Some(patch) = patches.get(&coord) {
            return Ok(patch.clone());
        }
        let loaded = Arc::new(Mutex::new(HeightGridPatch::load(coord, &self.source_dir, &self.layout)?));
        patches.insert(coord, loaded.clone());
        Ok(loaded)
    }

    /// Set every cell to `elevation`.
    ///
    /// All patches involved are loaded before the first write, so a missing or
    /// corrupt patch leaves every patch untouched.
    pub fn write_cells(&self, cells: &BTreeSet<GridCell>, elevation: i16) -> BuildResult<usize> {
        let coords: BTreeSet<PatchCoord> = cells.iter().map(|c| c.patch).collect();
        let handles = coords
            .into_iter()
            .map(|coord| Ok((coord, self.patch(coord)?)))
            .collect::<BuildResult<HashMap<_, _>>>()?;

        for (coord, handle) in &handles {
            let mut patch = lock(handle);
            for cell in cells.iter().filter(|c| c.patch == *coord) {
                patch.set(cell.x_offset, cell.y_offset, elevation);
            }
        }
        Ok(cells.len())
    }

    pub fn sample(&self, point: GridPoint) -> BuildResult<i16> {
        let cell = self.layout.locate(point)?;
        let handle = self.patch(cell.patch)?;
        let patch = lock(&handle);
        Ok(patch.get(cell.x_offset, cell.y_offset))
    }

    /// Write every modified patch to the output directory.
    pub fn persist(&self) -> BuildResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;
        let patches = lock(&self.patches);
        let mut written = Vec::new();
        for handle in patches.values() {
            let mut patch = lock(handle);
            if patch.is_dirty() {
                written.push(patch.save(&self.output_dir)?);
                patch.dirty = false;
            }
        }
        written.sort();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_layout() -> HeightGridLayout {
        HeightGridLayout {
            resolution: 30,
            patch_size: 120,
        }
    }

    #[test]
    fn test_locate() {
        let layout = HeightGridLayout::default();
        let cell = layout.locate(GridPoint::new(5760 + 90, 30)).unwrap();
        assert_eq!(cell.patch.name(), "0100");
        assert_eq!((cell.x_offset, cell.y_offset), (3, 1));

        assert!(matches!(
            layout.locate(GridPoint::new(-30, 0)),
            Err(BuilderError::OutsideLandscape { .. })
        ));
    }

    #[test]
    fn test_patch_byte_layout() {
        let layout = small_layout();
        let mut patch = HeightGridPatch::new_flat(PatchCoord::new(0, 0), &layout, 0);
        patch.set(1, 2, -2);
        let bytes = patch.to_bytes();
        assert_eq!(bytes.len(), 5 * 5 * 2);
        let offset = (1 * 5 + 2) * 2;
        assert_eq!(&bytes[offset..offset + 2], &(-2i16).to_le_bytes());
    }

    #[test]
    fn test_corrupt_patch_rejected() {
        let layout = small_layout();
        let result = HeightGridPatch::from_bytes(PatchCoord::new(0, 0), &[0; 7], &layout, Path::new("h0000.tr3"));
        assert!(matches!(result, Err(BuilderError::CorruptHeightmap { .. })));
    }

    #[test]
    fn test_missing_patch_prevents_all_writes() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let layout = small_layout();
        HeightGridPatch::new_flat(PatchCoord::new(0, 0), &layout, 5)
            .save(src.path())
            .unwrap();

        let store = HeightGridStore::new(src.path(), out.path(), layout);
        let cells: BTreeSet<_> = [GridPoint::new(30, 30), GridPoint::new(150, 30)]
            .into_iter()
            .map(|p| layout.locate(p).unwrap())
            .collect();

        assert!(matches!(store.write_cells(&cells, 100), Err(BuilderError::FileNotFound { .. })));
        assert_eq!(store.sample(GridPoint::new(30, 30)).unwrap(), 5);
        assert!(store.persist().unwrap().is_empty());
    }

    #[test]
    fn test_persist_writes_only_dirty_patches() {
        let src = tempdir().unwrap();
        let out = tempdir().unwrap();
        let layout = small_layout();
        for coord in [PatchCoord::new(0, 0), PatchCoord::new(1, 0)] {
            HeightGridPatch::new_flat(coord, &layout, 0).save(src.path()).unwrap();
        }

        let store = HeightGridStore::new(src.path(), out.path(), layout);
        store.sample(GridPoint::new(150, 0)).unwrap();
        let cells = BTreeSet::from([layout.locate(GridPoint::new(60, 90)).unwrap()]);
        store.write_cells(&cells, 321).unwrap();

        let written = store.persist().unwrap();
        assert_eq!(written, vec![out.path().join("h0000.tr3")]);

        let reloaded = HeightGridPatch::load(PatchCoord::new(0, 0), out.path(), &layout).unwrap();
        assert_eq!(reloaded.get(2, 3), 321);
        assert_eq!(reloaded.get(3, 2), 0);
    }
}
