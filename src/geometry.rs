/// Dataset geometry module.
///
/// Derives the resolution pyramid for a dataset: per-level cube shape,
/// scaled image size, and the near-isotropic slicing parameters.  A
/// geometry is pure data, built once from the dataset row and shared
/// read-only across workers for the process lifetime.
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Raw dataset parameters, as stored in the metadata database.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub name: String,
    pub ximagesize: u64,
    pub yimagesize: u64,
    pub startslice: u64,
    pub endslice: u64,
    pub zoomlevels: u8,
    pub zscale: f64,
    pub startwindow: u64,
    pub endwindow: u64,
}

/// A declarative cube-shape override for one (dataset, level) pair.
///
/// Some historical ingests used a cube shape the zscale rule would not
/// pick.  Those exceptions live in configuration rather than in code.
#[derive(Debug, Clone, Deserialize)]
pub struct CubeDimOverride {
    pub dataset: String,
    pub level: u8,
    pub cube_dim: [u64; 3],
}

/// Derived parameters for a single resolution level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGeometry {
    /// z voxel spacing relative to xy at this level.
    pub zscale: f64,
    /// Cube shape in voxels, xyz order.
    pub cube_dim: [u64; 3],
    /// Scaled image size in pixels, xy order.  Pixel-accurate; never
    /// rounded up to a cube boundary.
    pub image_size: [u64; 2],
    /// Slice range after isotropic down-sampling.  Identity when the
    /// level is not near-isotropic.
    pub iso_slice_range: [u64; 2],
    /// Integer z scale-down factor approximating isotropy.  1 when the
    /// level is not near-isotropic.
    pub near_iso_scale_down: u64,
}

#[derive(Debug, Clone)]
pub struct DatasetGeometry {
    name: String,
    slice_range: [u64; 2],
    window_range: [u64; 2],
    levels: Vec<LevelGeometry>,
}

impl DatasetGeometry {
    /// Build the resolution pyramid.  Level 0 is full resolution; each
    /// level halves xy.  Levels are strictly monotonically coarser.
    pub fn build(spec: &DatasetSpec, overrides: &[CubeDimOverride]) -> DatasetGeometry {
        let slice_range = [spec.startslice, spec.endslice];
        let mut levels = Vec::with_capacity(spec.zoomlevels as usize + 1);

        for i in 0..=spec.zoomlevels {
            let scale = 1u64 << i;
            let zscale = spec.zscale / scale as f64;

            // Thin cubes while z is coarser than xy, isometric cubes once
            // the pyramid catches up.
            let mut cube_dim = if zscale > 0.5 {
                [128, 128, 16]
            } else {
                [64, 64, 64]
            };
            if let Some(ov) = overrides
                .iter()
                .find(|ov| ov.dataset == spec.name && ov.level == i)
            {
                cube_dim = ov.cube_dim;
            }

            let image_size = [
                (spec.ximagesize - 1) / scale + 1,
                (spec.yimagesize - 1) / scale + 1,
            ];

            let (iso_slice_range, near_iso_scale_down) = if zscale < 1.0 {
                let nslices = spec.endslice - spec.startslice + 1;
                let iso = [
                    spec.startslice,
                    spec.startslice + (nslices as f64 * zscale).floor() as u64,
                ];
                // Pick the integer scale-down closest to isotropic by
                // relative error, favoring the ceiling at the exact tie.
                let scalepixels = 1.0 / zscale;
                let ceil = scalepixels.ceil();
                let floor = scalepixels.floor();
                let down = if (ceil - scalepixels) / scalepixels
                    <= (scalepixels - floor) / scalepixels
                {
                    ceil as u64
                } else {
                    floor as u64
                };
                (iso, down)
            } else {
                (slice_range, 1)
            };

            levels.push(LevelGeometry {
                zscale,
                cube_dim,
                image_size,
                iso_slice_range,
                near_iso_scale_down,
            });
        }

        DatasetGeometry {
            name: spec.name.clone(),
            slice_range,
            window_range: [spec.startwindow, spec.endwindow],
            levels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global slice range, inclusive on both ends.
    pub fn slice_range(&self) -> [u64; 2] {
        self.slice_range
    }

    pub fn window_range(&self) -> [u64; 2] {
        self.window_range
    }

    pub fn num_levels(&self) -> u8 {
        self.levels.len() as u8
    }

    pub fn level(&self, resolution: u8) -> Option<&LevelGeometry> {
        self.levels.get(resolution as usize)
    }

    pub fn cube_dim(&self, resolution: u8) -> Option<[u64; 3]> {
        self.level(resolution).map(|l| l.cube_dim)
    }

    /// Return true if the specified range of values is inside the image
    /// at this resolution.  x and y run from zero; z runs over the global
    /// slice range.  Fails closed: an unknown resolution is out of range,
    /// never an error.
    pub fn check_cube(
        &self,
        resolution: u8,
        xstart: u64,
        xend: u64,
        ystart: u64,
        yend: u64,
        zstart: u64,
        zend: u64,
    ) -> bool {
        let level = match self.level(resolution) {
            Some(level) => level,
            None => return false,
        };
        xstart < xend
            && xend <= level.image_size[0]
            && ystart < yend
            && yend <= level.image_size[1]
            && zstart >= self.slice_range[0]
            && zstart < zend
            && zend <= self.slice_range[1] + 1
    }

    /// The image size and slice range at a resolution, for bounds
    /// reporting.
    pub fn image_size(&self, resolution: u8) -> Option<([u64; 2], [u64; 2])> {
        self.level(resolution)
            .map(|l| (l.image_size, self.slice_range))
    }
}

/// Process-lifetime cache of geometries keyed by dataset name.
///
/// Geometries are never invalidated in place.  A metadata change requires
/// a process restart.
pub struct GeometryCache {
    overrides: Vec<CubeDimOverride>,
    cache: RwLock<HashMap<String, Arc<DatasetGeometry>>>,
}

impl GeometryCache {
    pub fn new(overrides: Vec<CubeDimOverride>) -> GeometryCache {
        GeometryCache {
            overrides,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<DatasetGeometry>> {
        self.cache.read().get(name).cloned()
    }

    /// Return the cached geometry for the dataset, building it on first
    /// use.
    pub fn get_or_build(&self, spec: &DatasetSpec) -> Arc<DatasetGeometry> {
        if let Some(geometry) = self.get(&spec.name) {
            return geometry;
        }
        let mut cache = self.cache.write();
        cache
            .entry(spec.name.clone())
            .or_insert_with(|| Arc::new(DatasetGeometry::build(spec, &self.overrides)))
            .clone()
    }
}
