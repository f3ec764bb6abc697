//! Annotated preview of the donut image
//!
//! Marks the annulus center and both radii so the parameters can be checked
//! against the source at a glance.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::config::WarpParameters;
use crate::error::Result;
use crate::raster::Raster;

const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OUTER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const INNER_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

const CENTER_DOT_RADIUS: i32 = 4;
const CROSSHAIR_HALF: f32 = 12.0;
const RING_THICKNESS: i32 = 2;

/// Copy of `source` with the center, inner circle and outer circle drawn on it
pub fn draw_overlay(source: &Raster, params: &WarpParameters) -> Result<RgbImage> {
    let mut img = source.to_rgb_image()?;

    // A center beyond `reach` or a radius beyond twice that cannot put a
    // mark on the image
    let reach = 2.0 * (img.width() as f64 + img.height() as f64);
    let (Some(cx), Some(cy)) = (
        to_canvas(params.center_x, reach),
        to_canvas(params.center_y, reach),
    ) else {
        return Ok(img);
    };

    draw_filled_circle_mut(&mut img, (cx, cy), CENTER_DOT_RADIUS, CENTER_COLOR);
    if let Some(r_out) = to_canvas(params.outer_radius, 2.0 * reach) {
        draw_ring(&mut img, (cx, cy), r_out, OUTER_COLOR);
    }
    if let Some(r_in) = to_canvas(params.inner_radius, 2.0 * reach) {
        draw_ring(&mut img, (cx, cy), r_in, INNER_COLOR);
    }

    let (fx, fy) = (cx as f32, cy as f32);
    draw_line_segment_mut(
        &mut img,
        (fx - CROSSHAIR_HALF, fy),
        (fx + CROSSHAIR_HALF, fy),
        CENTER_COLOR,
    );
    draw_line_segment_mut(
        &mut img,
        (fx, fy - CROSSHAIR_HALF),
        (fx, fy + CROSSHAIR_HALF),
        CENTER_COLOR,
    );

    Ok(img)
}

/// Rounded drawing coordinate, or `None` when `|v|` exceeds `limit`
fn to_canvas(v: f64, limit: f64) -> Option<i32> {
    (v.abs() <= limit).then(|| v.round() as i32)
}

/// Circle outline `RING_THICKNESS` pixels wide, growing inward
fn draw_ring(img: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    for k in 0..RING_THICKNESS {
        let r = radius - k;
        if r > 0 {
            draw_hollow_circle_mut(img, center, r, color);
        }
    }
}
