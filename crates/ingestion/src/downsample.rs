//! Voxel-grid point-cloud reduction.

use std::collections::HashMap;

use crate::error::{IngestionError, Result};

/// Voxel-grid downsampler
///
/// Bins points into cubic cells of edge length `voxel_size` and replaces each
/// occupied cell's contents with their centroid. Single pass, O(N) time,
/// O(occupied cells) memory; deliberately a flat grid rather than an octree -
/// reproducibility matters more here than an optimal reduction ratio.
///
/// Output order is unspecified (it follows the cell map's iteration order).
#[derive(Debug, Clone)]
pub struct VoxelDownsampler {
    voxel_size: f32,
}

impl VoxelDownsampler {
    /// Create a downsampler with the given cell edge length in meters.
    ///
    /// A non-positive or non-finite `voxel_size` is a configuration error.
    pub fn new(voxel_size: f64) -> Result<Self> {
        if !voxel_size.is_finite() || voxel_size <= 0.0 {
            return Err(IngestionError::InvalidVoxelSize(voxel_size));
        }
        Ok(Self {
            voxel_size: voxel_size as f32,
        })
    }

    /// Configured cell edge length (meters).
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size as f64
    }

    /// Reduce a point set to one centroid per occupied cell.
    pub fn downsample(&self, points: &[[f32; 3]]) -> Vec<[f32; 3]> {
        if points.is_empty() {
            return Vec::new();
        }

        // Sum + count per cell; accumulate in f64 so large clusters keep precision.
        let mut cells: HashMap<[i32; 3], ([f64; 3], u32)> = HashMap::new();

        for p in points {
            let key = [
                (p[0] / self.voxel_size).floor() as i32,
                (p[1] / self.voxel_size).floor() as i32,
                (p[2] / self.voxel_size).floor() as i32,
            ];
            let entry = cells.entry(key).or_insert(([0.0; 3], 0));
            entry.0[0] += p[0] as f64;
            entry.0[1] += p[1] as f64;
            entry.0[2] += p[2] as f64;
            entry.1 += 1;
        }

        cells
            .into_values()
            .map(|(sum, count)| {
                let n = count as f64;
                [
                    (sum[0] / n) as f32,
                    (sum[1] / n) as f32,
                    (sum[2] / n) as f32,
                ]
            })
            .collect()
    }
}
