//! Polar unwarp mapping from panorama pixels back to the donut image
//!
//! Every destination pixel is mapped to a fractional source coordinate once,
//! up front. The resulting lookup table is reused for every frame that shares
//! the same parameters.

use rayon::prelude::*;
use std::f64::consts::TAU;
use std::time::Instant;
use tracing::debug;

use crate::config::WarpParameters;
use crate::error::{Result, UnwarpError};

/// Per-pixel source coordinates for a panorama of fixed size
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMap {
    width: u32,
    height: u32,
    /// Row-major source x per destination pixel
    map_x: Vec<f32>,
    /// Row-major source y per destination pixel
    map_y: Vec<f32>,
}

impl CoordinateMap {
    /// Wrap externally computed coordinate arrays
    pub fn from_parts(width: u32, height: u32, map_x: Vec<f32>, map_y: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        for len in [map_x.len(), map_y.len()] {
            if len != expected {
                return Err(UnwarpError::BufferSize {
                    expected,
                    actual: len,
                });
            }
        }
        Ok(Self {
            width,
            height,
            map_x,
            map_y,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn map_x(&self) -> &[f32] {
        &self.map_x
    }

    pub fn map_y(&self) -> &[f32] {
        &self.map_y
    }

    /// Source coordinate sampled by destination pixel `(x, y)`
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> (f32, f32) {
        let i = y as usize * self.width as usize + x as usize;
        (self.map_x[i], self.map_y[i])
    }

    /// Source coordinates of one destination row
    #[inline]
    pub fn row(&self, y: u32) -> (&[f32], &[f32]) {
        let w = self.width as usize;
        let start = y as usize * w;
        (&self.map_x[start..start + w], &self.map_y[start..start + w])
    }

    /// Fill the table; callers validate the inputs first
    fn compute(width: u32, height: u32, params: &WarpParameters) -> Self {
        let w = width as usize;
        let h = height as usize;
        let span = params.outer_radius - params.inner_radius;

        // Radius depends only on the row, the angle only on the column
        let radii: Vec<f64> = (0..h)
            .map(|y| {
                let t = y as f64 / height as f64;
                params.radial_curve.eval(t) * span + params.inner_radius
            })
            .collect();
        let directions: Vec<(f64, f64)> = (0..w)
            .map(|x| {
                let angle = -(x as f64 / width as f64) * TAU + params.rotation_offset;
                (angle.cos(), angle.sin())
            })
            .collect();

        let mut map_x = vec![0f32; w * h];
        let mut map_y = vec![0f32; w * h];

        if w > 0 {
            map_x
                .par_chunks_mut(w)
                .zip(map_y.par_chunks_mut(w))
                .zip(radii.par_iter())
                .for_each(|((row_x, row_y), &radius)| {
                    for ((out_x, out_y), &(cos, sin)) in
                        row_x.iter_mut().zip(row_y.iter_mut()).zip(&directions)
                    {
                        *out_x = (params.center_x + radius * cos) as f32;
                        *out_y = (params.center_y + radius * sin) as f32;
                    }
                });
        }

        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }
}

/// Build the lookup table for a `dest_width x dest_height` panorama
///
/// `dest_height` is taken as given; use [`WarpParameters::dest_height`] to
/// derive it from the aspect ratio. The radial curve is not clamped, so a
/// curve leaving `[0, 1]` samples inside the inner circle or past the outer
/// one.
pub fn build_map(
    dest_width: u32,
    dest_height: u32,
    params: &WarpParameters,
) -> Result<CoordinateMap> {
    if dest_width == 0 || dest_height == 0 {
        return Err(UnwarpError::InvalidDimensions {
            width: dest_width,
            height: dest_height,
        });
    }
    params.validate_radii()?;

    let (lo, hi) = params.radial_curve.range_over_unit();
    if lo < 0.0 || hi > 1.0 {
        debug!(
            "Radial curve spans {:.4}..{:.4}, sampling outside the annulus",
            lo, hi
        );
    }

    let start = Instant::now();
    let map = CoordinateMap::compute(dest_width, dest_height, params);
    debug!(
        "Built {}x{} coordinate map in {} us",
        dest_width,
        dest_height,
        start.elapsed().as_micros()
    );
    Ok(map)
}

/// Build the lookup table with the height derived from the aspect ratio
pub fn build_map_for(params: &WarpParameters) -> Result<CoordinateMap> {
    let (width, height) = params.validate()?;
    build_map(width, height, params)
}
