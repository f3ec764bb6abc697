//! Mapping between a letterboxed preview and source pixel coordinates
//!
//! Previews scale the source uniformly to fit a box and center it. Clicking
//! on the preview picks a new annulus center through the inverse mapping.

use crate::config::WarpParameters;

/// Uniform scale and centering offset of a source image inside a preview box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    source_width: u32,
    source_height: u32,
}

impl DisplayFit {
    /// Fit a `source_width x source_height` image into `box_width x box_height`
    pub fn new(source_width: u32, source_height: u32, box_width: u32, box_height: u32) -> Self {
        let sw = source_width.max(1) as f64;
        let sh = source_height.max(1) as f64;
        let scale = (box_width as f64 / sw).min(box_height as f64 / sh);
        Self {
            scale,
            offset_x: (box_width as f64 - sw * scale) / 2.0,
            offset_y: (box_height as f64 - sh * scale) / 2.0,
            source_width,
            source_height,
        }
    }

    /// Preview position of a source pixel
    pub fn to_display(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }

    /// Source pixel under a preview position, clamped to the image
    pub fn to_source(&self, x: f64, y: f64) -> (f64, f64) {
        let sx = (x - self.offset_x) / self.scale;
        let sy = (y - self.offset_y) / self.scale;
        let max_x = self.source_width.saturating_sub(1) as f64;
        let max_y = self.source_height.saturating_sub(1) as f64;
        (sx.clamp(0.0, max_x), sy.clamp(0.0, max_y))
    }

    /// Move the annulus center to the source pixel under a preview click
    ///
    /// The center is rounded to hundredths of a pixel.
    pub fn recenter(&self, params: &mut WarpParameters, x: f64, y: f64) {
        let (sx, sy) = self.to_source(x, y);
        params.center_x = (sx * 100.0).round() / 100.0;
        params.center_y = (sy * 100.0).round() / 100.0;
        tracing::debug!(
            "Center moved to ({:.2}, {:.2}) from preview ({:.1}, {:.1})",
            params.center_x,
            params.center_y,
            x,
            y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_letterboxes_wide_image() {
        let fit = DisplayFit::new(1200, 600, 600, 600);
        assert_eq!(fit.scale, 0.5);
        assert_eq!(fit.offset_x, 0.0);
        assert_eq!(fit.offset_y, 150.0);
    }

    #[test]
    fn test_round_trip() {
        let fit = DisplayFit::new(2592, 1944, 600, 600);
        let (dx, dy) = fit.to_display(1314.5, 997.25);
        let (sx, sy) = fit.to_source(dx, dy);
        assert!((sx - 1314.5).abs() < 1e-9);
        assert!((sy - 997.25).abs() < 1e-9);
    }

    #[test]
    fn test_clicks_outside_image_clamp() {
        let fit = DisplayFit::new(1200, 600, 600, 600);
        assert_eq!(fit.to_source(10.0, 5.0), (20.0, 0.0));
        assert_eq!(fit.to_source(700.0, 599.0), (1199.0, 599.0));
    }

    #[test]
    fn test_recenter_rounds_to_hundredths() {
        let fit = DisplayFit::new(900, 900, 600, 600);
        let mut params = WarpParameters::for_source(900, 900);
        fit.recenter(&mut params, 100.0, 200.0);
        assert_eq!(params.center_x, 150.0);
        assert_eq!(params.center_y, 300.0);

        fit.recenter(&mut params, 100.001, 200.0);
        assert_eq!(params.center_x, 150.0);
        fit.recenter(&mut params, 100.02, 200.0);
        assert_eq!(params.center_x, 150.03);
    }
}
