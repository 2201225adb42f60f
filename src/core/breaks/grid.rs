use ndarray::Array2;

use crate::core::dates::{date_from_millis, yyyymmdd};
use crate::io::parquet::BreakRecord;

/// North-up grid whose pixel centres hold the break records
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    /// `(min_x, min_y, max_x, max_y)` of the pixel corners
    pub bounds: (f64, f64, f64, f64),
}

impl RasterGrid {
    /// Grid extending half a pixel beyond the outermost record centres
    pub fn from_records(records: &[BreakRecord], resolution: f64) -> Option<Self> {
        let first = records.first()?;
        let (mut min_x, mut min_y) = (first.x_coord, first.y_coord);
        let (mut max_x, mut max_y) = (min_x, min_y);
        for r in records {
            min_x = min_x.min(r.x_coord);
            min_y = min_y.min(r.y_coord);
            max_x = max_x.max(r.x_coord);
            max_y = max_y.max(r.y_coord);
        }
        let half = resolution / 2.0;
        let bounds = (min_x - half, min_y - half, max_x + half, max_y + half);
        Some(Self {
            width: ((bounds.2 - bounds.0) / resolution).ceil() as usize,
            height: ((bounds.3 - bounds.1) / resolution).ceil() as usize,
            resolution,
            bounds,
        })
    }

    pub fn geotransform(&self) -> [f64; 6] {
        [
            self.bounds.0,
            self.resolution,
            0.0,
            self.bounds.3,
            0.0,
            -self.resolution,
        ]
    }

    /// `(col, row)` of a pixel centre, rounding half to even
    pub fn index_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.bounds.0) / self.resolution - 0.5).round_ties_even();
        let row = ((self.bounds.3 - y) / self.resolution - 0.5).round_ties_even();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Burn `YYYYMMDD` break dates into an `Int32` array; later records win
    pub fn rasterize(&self, records: &[BreakRecord], nodata: i32) -> Array2<i32> {
        let mut out = Array2::<i32>::from_elem((self.height, self.width), nodata);
        for r in records {
            let Some((col, row)) = self.index_of(r.x_coord, r.y_coord) else {
                continue;
            };
            if let Some(date) = r.t_break.and_then(date_from_millis) {
                out[[row, col]] = yyyymmdd(date);
            }
        }
        out
    }
}
