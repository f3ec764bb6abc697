//! Remapping of a source raster through a coordinate map
//!
//! Samples falling outside the source contribute the fill value (zero) on
//! every channel. Bicubic sampling pads with zeros rather than clamping to
//! the edge, so the annulus fades to black where it meets the frame border.

use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

use crate::config::InterpolationMode;
use crate::error::{Result, UnwarpError};
use crate::raster::Raster;
use crate::transform::CoordinateMap;

/// Sample value written for coordinates outside the source
pub const FILL_VALUE: u8 = 0;

/// Keys cubic convolution parameter, matching the usual INTER_CUBIC kernel
const CUBIC_A: f32 = -0.75;

/// Resample `source` through `map` into a newly allocated raster
///
/// The output has the map's dimensions and the source's channel count.
/// Rows are produced in parallel; each output sample is computed by exactly
/// one task, so results do not depend on scheduling.
pub fn resample(
    source: &Raster,
    map: &CoordinateMap,
    mode: InterpolationMode,
) -> Result<Raster> {
    if source.is_empty() {
        return Err(UnwarpError::EmptySource {
            width: source.width(),
            height: source.height(),
            channels: source.channels(),
        });
    }

    let start = Instant::now();
    let mut dest = Raster::zeroed(map.width(), map.height(), source.channels());
    let stride = dest.stride();

    if stride > 0 {
        dest.data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let (row_x, row_y) = map.row(y as u32);
                match mode {
                    InterpolationMode::Nearest => remap_row_nearest(source, row_x, row_y, row),
                    InterpolationMode::Smooth => remap_row_cubic(source, row_x, row_y, row),
                }
            });
    }

    debug!(
        "Resampled {}x{} ({}) in {} us",
        map.width(),
        map.height(),
        mode.as_str(),
        start.elapsed().as_micros()
    );
    Ok(dest)
}

fn remap_row_nearest(source: &Raster, row_x: &[f32], row_y: &[f32], out: &mut [u8]) {
    let channels = source.channels();
    for ((&x, &y), px) in row_x.iter().zip(row_y).zip(out.chunks_exact_mut(channels)) {
        match nearest_index(x, source.width()).zip(nearest_index(y, source.height())) {
            Some((sx, sy)) => px.copy_from_slice(source.pixel(sx, sy)),
            None => px.fill(FILL_VALUE),
        }
    }
}

/// Rounded pixel index, or `None` outside `[0, len)`
///
/// Halves go to the even index, so -0.5 lands on pixel 0.
#[inline]
fn nearest_index(v: f32, len: u32) -> Option<u32> {
    let r = v.round_ties_even();
    // NaN fails both comparisons
    if r >= 0.0 && r < len as f32 {
        Some(r as u32)
    } else {
        None
    }
}

fn remap_row_cubic(source: &Raster, row_x: &[f32], row_y: &[f32], out: &mut [u8]) {
    let channels = source.channels();
    let mut acc = vec![0f32; channels];
    for ((&x, &y), px) in row_x.iter().zip(row_y).zip(out.chunks_exact_mut(channels)) {
        sample_cubic(source, x, y, &mut acc);
        for (dst, &v) in px.iter_mut().zip(&acc) {
            *dst = saturate_u8(v);
        }
    }
}

/// Bicubic sample at `(x, y)` into `acc`, one value per channel
fn sample_cubic(source: &Raster, x: f32, y: f32, acc: &mut [f32]) {
    acc.fill(FILL_VALUE as f32);

    let w = source.width() as f32;
    let h = source.height() as f32;
    // Whole 4x4 neighborhood outside, or not a number
    if !(x > -2.0 && x < w + 1.0 && y > -2.0 && y < h + 1.0) {
        return;
    }

    let fx = x.floor();
    let fy = y.floor();
    let wx = cubic_weights(x - fx);
    let wy = cubic_weights(y - fy);
    let x0 = fx as i64 - 1;
    let y0 = fy as i64 - 1;

    let channels = source.channels();
    for (j, &weight_y) in wy.iter().enumerate() {
        let sy = y0 + j as i64;
        if sy < 0 || sy >= source.height() as i64 {
            continue;
        }
        for (i, &weight_x) in wx.iter().enumerate() {
            let sx = x0 + i as i64;
            if sx < 0 || sx >= source.width() as i64 {
                continue;
            }
            let weight = weight_x * weight_y;
            let px = source.pixel(sx as u32, sy as u32);
            for c in 0..channels {
                acc[c] += weight * px[c] as f32;
            }
        }
    }
}

/// Weights for the taps at offsets -1, 0, 1, 2 from `floor(x)`
#[inline]
fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let u = 1.0 - t;
    let w2 = ((a + 2.0) * u - (a + 3.0)) * u * u + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}

#[inline]
fn saturate_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
