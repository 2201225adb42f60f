use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::earthengine::LonLatBounds;
use crate::io::vector::gis_srs;

/// North-up pixel grid in a projected CRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelGrid {
    pub crs: String,
    /// Left edge
    pub origin_x: f64,
    /// Top edge
    pub origin_y: f64,
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
}

/// One download window of a scene
#[derive(Debug, Clone, PartialEq)]
pub struct Subtile {
    pub label: String,
    pub grid: PixelGrid,
}

impl PixelGrid {
    /// Smallest grid aligned to multiples of `pixel_size` covering the bounds
    pub fn covering(
        crs: &str,
        (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
        pixel_size: f64,
    ) -> Self {
        let x0 = (min_x / pixel_size).floor() * pixel_size;
        let y0 = (min_y / pixel_size).floor() * pixel_size;
        let x1 = (max_x / pixel_size).ceil() * pixel_size;
        let y1 = (max_y / pixel_size).ceil() * pixel_size;
        Self {
            crs: crs.to_string(),
            origin_x: x0,
            origin_y: y1,
            pixel_size,
            width: ((x1 - x0) / pixel_size).round() as usize,
            height: ((y1 - y0) / pixel_size).round() as usize,
        }
    }

    /// Grid covering a lon/lat footprint once transformed to `crs`
    pub fn from_footprint(footprint: &LonLatBounds, crs: &str, pixel_size: f64) -> Result<Self> {
        let wgs84 = gis_srs("EPSG:4326")?;
        let target = gis_srs(crs)?;
        let ct = gdal::spatial_ref::CoordTransform::new(&wgs84, &target)?;
        let b = ct.transform_bounds(
            &[footprint.west, footprint.south, footprint.east, footprint.north],
            21,
        )?;
        Ok(Self::covering(crs, (b[0], b[1], b[2], b[3]), pixel_size))
    }

    pub fn geotransform(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_size,
            0.0,
            self.origin_y,
            0.0,
            -self.pixel_size,
        ]
    }

    /// Sub-grid starting at pixel `(col, row)`
    pub fn window(&self, col: usize, row: usize, width: usize, height: usize) -> Self {
        Self {
            crs: self.crs.clone(),
            origin_x: self.origin_x + col as f64 * self.pixel_size,
            origin_y: self.origin_y - row as f64 * self.pixel_size,
            pixel_size: self.pixel_size,
            width,
            height,
        }
    }

    /// The same grid grown by `halo` pixels on every side
    pub fn expanded(&self, halo: usize) -> Self {
        let margin = halo as f64 * self.pixel_size;
        Self {
            crs: self.crs.clone(),
            origin_x: self.origin_x - margin,
            origin_y: self.origin_y + margin,
            pixel_size: self.pixel_size,
            width: self.width + 2 * halo,
            height: self.height + 2 * halo,
        }
    }

    /// Split into `n × n` windows labelled `part_{i*n+j+1}`, `i` running west to
    /// east and `j` south to north. The last column and the northern row take
    /// the remainders; empty windows are skipped.
    pub fn split(&self, n: usize) -> Vec<Subtile> {
        let n = n.max(1);
        let step_w = self.width / n;
        let step_h = self.height / n;
        let mut parts = Vec::with_capacity(n * n);
        for i in 0..n {
            let col = i * step_w;
            let w = if i == n - 1 { self.width - col } else { step_w };
            for j in 0..n {
                // rows are counted from the top, parts from the bottom
                let bottom = self.height - j * step_h;
                let top = if j == n - 1 { 0 } else { bottom - step_h };
                let h = bottom - top;
                if w == 0 || h == 0 {
                    continue;
                }
                parts.push(Subtile {
                    label: format!("part_{}", i * n + j + 1),
                    grid: self.window(col, top, w, h),
                });
            }
        }
        parts
    }
}
