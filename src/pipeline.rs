//! Frame processing with a cached coordinate map
//!
//! The map only depends on the parameters, so it is built once and reused
//! for every frame until the parameters change.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{InterpolationMode, WarpParameters};
use crate::error::Result;
use crate::raster::Raster;
use crate::resample::resample;
use crate::transform::{build_map, CoordinateMap};

/// Validated parameters together with their coordinate map
#[derive(Debug, Clone)]
pub struct Unwarper {
    params: WarpParameters,
    mode: InterpolationMode,
    map: Arc<CoordinateMap>,
}

impl Unwarper {
    pub fn new(params: WarpParameters, mode: InterpolationMode) -> Result<Self> {
        let (width, height) = params.validate()?;
        let map = build_map(width, height, &params)?;
        info!(
            "Panorama {}x{}, center ({:.2}, {:.2}), radii {:.2}..{:.2}, rotation {:.2} deg, {}",
            width,
            height,
            params.center_x,
            params.center_y,
            params.inner_radius,
            params.outer_radius,
            params.rotation_degrees(),
            mode.as_str()
        );
        Ok(Self {
            params,
            mode,
            map: Arc::new(map),
        })
    }

    pub fn params(&self) -> &WarpParameters {
        &self.params
    }

    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// Shared handle to the current map
    pub fn map(&self) -> Arc<CoordinateMap> {
        self.map.clone()
    }

    /// Output size as (width, height)
    pub fn output_size(&self) -> (u32, u32) {
        (self.map.width(), self.map.height())
    }

    /// Replace the parameters, rebuilding the map only if they changed
    ///
    /// Returns whether a rebuild happened. On error the previous state is kept.
    pub fn set_params(&mut self, params: WarpParameters) -> Result<bool> {
        if params == self.params {
            return Ok(false);
        }
        let (width, height) = params.validate()?;
        self.map = Arc::new(build_map(width, height, &params)?);
        self.params = params;
        debug!("Rebuilt coordinate map for {}x{}", width, height);
        Ok(true)
    }

    /// Switching the sampling method never touches the map
    pub fn set_mode(&mut self, mode: InterpolationMode) {
        self.mode = mode;
    }

    pub fn unwarp(&self, frame: &Raster) -> Result<Raster> {
        resample(frame, &self.map, self.mode)
    }

    /// Unwarp many frames in parallel; results keep the input order
    pub fn unwarp_batch(&self, frames: &[Raster]) -> Vec<Result<Raster>> {
        frames.par_iter().map(|frame| self.unwarp(frame)).collect()
    }

    /// Decode, unwarp and encode one file
    pub fn unwarp_file(&self, input: &Path, output: &Path) -> Result<()> {
        let start = Instant::now();
        let frame = Raster::open(input)?;
        check_frame_covers_annulus(&self.params, &frame);
        let pano = self.unwarp(&frame)?;
        pano.save(output)?;
        info!(
            "{:?} -> {:?} ({}x{}) in {} ms",
            input,
            output,
            pano.width(),
            pano.height(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Unwarp files into `output_dir` in parallel
    ///
    /// Returns one result per input, in input order.
    pub fn unwarp_files(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        extension: &str,
    ) -> Vec<Result<PathBuf>> {
        let start = Instant::now();
        let results: Vec<Result<PathBuf>> = inputs
            .par_iter()
            .map(|input| {
                let output = output_path(input, output_dir, extension);
                self.unwarp_file(input, &output)?;
                Ok(output)
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        let elapsed = start.elapsed().as_secs_f64();
        if failed > 0 {
            warn!(
                "Processed {} files in {:.2}s, {} failed",
                inputs.len(),
                elapsed,
                failed
            );
        } else {
            info!(
                "Processed {} files in {:.2}s ({:.1} files/s)",
                inputs.len(),
                elapsed,
                inputs.len() as f64 / elapsed.max(f64::EPSILON)
            );
        }
        results
    }
}

/// Output file for `input` inside `output_dir`
pub fn output_path(input: &Path, output_dir: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    output_dir.join(format!("{}_pano.{}", stem, extension))
}

/// Warn when the outer circle leaves the frame; those samples become fill
fn check_frame_covers_annulus(params: &WarpParameters, frame: &Raster) {
    let r = params.outer_radius;
    let inside = params.center_x - r >= 0.0
        && params.center_y - r >= 0.0
        && params.center_x + r <= frame.width() as f64
        && params.center_y + r <= frame.height() as f64;
    if !inside {
        warn!(
            "Outer circle (r = {:.1}) extends past the {}x{} frame; those samples are filled black",
            r,
            frame.width(),
            frame.height()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RadialCurve, DEFAULT_ASPECT_RATIO};
    use crate::error::UnwarpError;

    /// Black 400x400 RGB frame with white pixels where `keep(x, y)` holds
    fn frame_with(keep: impl Fn(f64, f64) -> bool) -> Raster {
        let mut frame = Raster::zeroed(400, 400, 3);
        for y in 0..400 {
            for x in 0..400 {
                if keep(x as f64, y as f64) {
                    frame.pixel_mut(x, y).fill(255);
                }
            }
        }
        frame
    }

    fn scenario_params() -> WarpParameters {
        WarpParameters {
            center_x: 200.0,
            center_y: 200.0,
            inner_radius: 50.0,
            outer_radius: 150.0,
            rotation_offset: 0.0,
            dest_width: 360,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            radial_curve: RadialCurve::linear(),
        }
    }

    fn white_pixels(raster: &Raster) -> Vec<(u32, u32)> {
        let mut found = Vec::new();
        for y in 0..raster.height() {
            for x in 0..raster.width() {
                if raster.pixel(x, y).iter().any(|&v| v != 0) {
                    found.push((x, y));
                }
            }
        }
        found
    }

    #[test]
    fn test_ring_becomes_horizontal_band() {
        let params = WarpParameters {
            inner_radius: 10.0,
            outer_radius: 110.0,
            dest_width: 720,
            radial_curve: RadialCurve::default(),
            ..scenario_params()
        };
        let ring = frame_with(|x, y| ((x - 200.0).hypot(y - 200.0) - 60.0).abs() <= 1.5);

        let unwarper = Unwarper::new(params, InterpolationMode::Nearest).unwrap();
        let pano = unwarper.unwarp(&ring).unwrap();
        assert_eq!((pano.width(), pano.height()), (720, 110));

        // Solve A t^2 + B t + C = 0.5 for the row of the ring
        let c = params.radial_curve;
        let disc = c.b * c.b - 4.0 * c.a * (c.c - 0.5);
        let t = (-c.b + disc.sqrt()) / (2.0 * c.a);
        let band_row = (t * pano.height() as f64).round() as u32;
        assert_eq!(band_row, 60);

        let lit = |y: u32| (0..pano.width()).filter(|&x| pano.pixel(x, y)[0] == 255).count();
        assert_eq!(lit(band_row), 720);
        for y in (0..50).chain(71..pano.height()) {
            assert_eq!(lit(y), 0, "row {} should be dark", y);
        }
    }

    #[test]
    fn test_single_pixel_lands_on_outer_edge_column_zero() {
        let params = scenario_params();
        let unwarper = Unwarper::new(params, InterpolationMode::Nearest).unwrap();
        let (w, h) = unwarper.output_size();
        assert_eq!((w, h), (360, 55));

        // The last row samples t = (h - 1) / h, one row short of the outer radius
        let (mx, my) = unwarper.map().get(0, h - 1);
        let row_step = (params.outer_radius - params.inner_radius) / h as f64;
        assert!((mx as f64 - 350.0).abs() <= row_step + 0.5);
        assert!((my as f64 - 200.0).abs() < 1e-4);

        // A white pixel at the sampled outer-edge location appears exactly once
        let (sx, sy) = (mx.round_ties_even() as u32, my.round_ties_even() as u32);
        let frame = frame_with(|x, y| x as u32 == sx && y as u32 == sy);
        let pano = unwarper.unwarp(&frame).unwrap();
        assert_eq!(white_pixels(&pano), vec![(0, h - 1)]);
    }

    #[test]
    fn test_outside_frame_is_black_in_both_modes() {
        // Annulus entirely to the left of the frame
        let params = WarpParameters {
            center_x: -500.0,
            ..scenario_params()
        };
        let frame = frame_with(|_, _| true);
        for mode in [InterpolationMode::Nearest, InterpolationMode::Smooth] {
            let unwarper = Unwarper::new(params, mode).unwrap();
            let pano = unwarper.unwarp(&frame).unwrap();
            assert!(pano.data().iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_set_params_rebuilds_only_on_change() {
        let mut unwarper = Unwarper::new(scenario_params(), InterpolationMode::Nearest).unwrap();
        let before = unwarper.map();
        assert!(!unwarper.set_params(scenario_params()).unwrap());
        assert!(Arc::ptr_eq(&before, &unwarper.map()));

        unwarper.set_mode(InterpolationMode::Smooth);
        assert!(Arc::ptr_eq(&before, &unwarper.map()));

        let wider = WarpParameters {
            dest_width: 720,
            ..scenario_params()
        };
        assert!(unwarper.set_params(wider).unwrap());
        assert_eq!(unwarper.output_size(), (720, 110));
        assert!(!Arc::ptr_eq(&before, &unwarper.map()));
    }

    #[test]
    fn test_set_params_keeps_state_on_error() {
        let mut unwarper = Unwarper::new(scenario_params(), InterpolationMode::Nearest).unwrap();
        let bad = WarpParameters {
            inner_radius: 200.0,
            ..scenario_params()
        };
        assert!(matches!(
            unwarper.set_params(bad),
            Err(UnwarpError::InvalidRadii { .. })
        ));
        assert_eq!(unwarper.params(), &scenario_params());
        assert_eq!(unwarper.output_size(), (360, 55));
    }

    #[test]
    fn test_new_rejects_invalid_dimensions() {
        let params = WarpParameters {
            dest_width: 0,
            ..scenario_params()
        };
        assert!(matches!(
            Unwarper::new(params, InterpolationMode::Nearest),
            Err(UnwarpError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_batch_matches_single_frames() {
        let unwarper = Unwarper::new(scenario_params(), InterpolationMode::Smooth).unwrap();
        let frames: Vec<Raster> = (0..4)
            .map(|k| frame_with(move |x, y| (x as u32 + y as u32 + k) % 7 == 0))
            .collect();
        let batch = unwarper.unwarp_batch(&frames);
        assert_eq!(batch.len(), frames.len());
        for (frame, result) in frames.iter().zip(batch) {
            assert_eq!(result.unwrap(), unwarper.unwarp(frame).unwrap());
        }
    }

    #[test]
    fn test_batch_reports_empty_frame() {
        let unwarper = Unwarper::new(scenario_params(), InterpolationMode::Nearest).unwrap();
        let frames = vec![frame_with(|_, _| false), Raster::zeroed(0, 0, 3)];
        let results = unwarper.unwarp_batch(&frames);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(UnwarpError::EmptySource { .. })));
    }

    #[test]
    fn test_output_path() {
        let out = output_path(Path::new("/in/donut_01.jpg"), Path::new("/out"), "png");
        assert_eq!(out, PathBuf::from("/out/donut_01_pano.png"));
    }

    #[test]
    fn test_unwarp_files() {
        let dir = std::env::temp_dir().join(format!("donut-unwarp-files-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("ring.png");
        frame_with(|x, y| ((x - 200.0).hypot(y - 200.0) - 100.0).abs() <= 2.0)
            .save(&input)
            .unwrap();

        let unwarper = Unwarper::new(scenario_params(), InterpolationMode::Nearest).unwrap();
        let results = unwarper.unwarp_files(&[input, dir.join("missing.png")], &dir, "png");
        let written = results[0].as_ref().unwrap();
        let pano = Raster::open(written).unwrap();
        assert_eq!((pano.width(), pano.height()), (360, 55));
        assert!(results[1].is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
