//! donut-unwarp - command line front end
//!
//! Loads donut images, derives the warp parameters from a saved record, the
//! command line and per-image defaults, then writes the unwarped panoramas.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use donut_unwarp::display::DisplayFit;
use donut_unwarp::overlay::draw_overlay;
use donut_unwarp::{
    InterpolationMode, ParameterRecord, RadialCurve, Raster, Unwarper, WarpParameters,
};

/// donut-unwarp - unwarp donut panoramic images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Donut images to unwarp
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (single input only)
    #[arg(short, long, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Output directory; files are named <stem>_pano.<ext>
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Output extension used with --output-dir
    #[arg(long, default_value = "jpg")]
    ext: String,

    /// Parameter record to start from (.json or .toml)
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Annulus center X in source pixels
    #[arg(long)]
    center_x: Option<f64>,

    /// Annulus center Y in source pixels
    #[arg(long)]
    center_y: Option<f64>,

    /// Inner radius in source pixels
    #[arg(long)]
    inner_radius: Option<f64>,

    /// Outer radius in source pixels
    #[arg(long)]
    outer_radius: Option<f64>,

    /// Panorama width in pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Rotation of the panorama start, degrees
    #[arg(short, long, allow_hyphen_values = true)]
    rotate_deg: Option<f64>,

    /// Panorama aspect ratio (width / height)
    #[arg(long)]
    aspect: Option<f64>,

    /// Radial warp curve coefficients A,B,C
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    curve: Option<Vec<f64>>,

    /// Interpolation: nearest or smooth
    #[arg(short, long)]
    interp: Option<InterpolationMode>,

    /// Recenter from a click at X,Y on a letterboxed preview
    #[arg(long, value_delimiter = ',')]
    click: Option<Vec<f64>>,

    /// Preview box size used with --click, WIDTHxHEIGHT
    #[arg(long, default_value = "600x600")]
    preview_box: String,

    /// Write the effective parameters to this file
    #[arg(long)]
    save_params: Option<PathBuf>,

    /// Write the first input annotated with center and radii
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("donut-unwarp v{}", env!("CARGO_PKG_VERSION"));

    // The first input sets the defaults and is used for the overlay
    let first = &args.inputs[0];
    let first_frame = Raster::open(first)
        .with_context(|| format!("Failed to open {:?}", first))?;
    info!(
        "Source {:?}: {}x{}, {} channel(s)",
        first,
        first_frame.width(),
        first_frame.height(),
        first_frame.channels()
    );

    let (params, mode) = resolve_parameters(&args, &first_frame)?;

    if let Some(path) = &args.save_params {
        ParameterRecord::from_parameters(&params, mode)
            .with_source(first, first_frame.width(), first_frame.height())
            .save(path)?;
    }

    if let Some(path) = &args.overlay {
        draw_overlay(&first_frame, &params)?
            .save(path)
            .with_context(|| format!("Failed to write overlay {:?}", path))?;
        info!("Wrote overlay {:?}", path);
    }

    let unwarper = Unwarper::new(params, mode).context("Invalid warp parameters")?;

    match (&args.output, &args.output_dir) {
        (Some(output), _) => {
            if args.inputs.len() > 1 {
                bail!("--output takes a single input; use --output-dir for several");
            }
            let pano = unwarper.unwarp(&first_frame)?;
            pano.save(output)
                .with_context(|| format!("Failed to write {:?}", output))?;
            info!("Wrote {:?} ({}x{})", output, pano.width(), pano.height());
        }
        (None, Some(dir)) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory {:?}", dir))?;
            let results = unwarper.unwarp_files(&args.inputs, dir, &args.ext);
            let mut failed = 0;
            for (input, result) in args.inputs.iter().zip(results) {
                if let Err(e) = result {
                    tracing::error!("{:?}: {}", input, e);
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{} of {} inputs failed", failed, args.inputs.len());
            }
        }
        (None, None) => {
            if args.save_params.is_none() && args.overlay.is_none() {
                bail!("Nothing to do: pass --output, --output-dir, --save-params or --overlay");
            }
        }
    }

    Ok(())
}

/// Defaults for the frame, then the saved record, then command line overrides
fn resolve_parameters(
    args: &Args,
    frame: &Raster,
) -> Result<(WarpParameters, InterpolationMode)> {
    let (mut params, mut mode) = match &args.params {
        Some(path) => {
            let record = ParameterRecord::load(path)?;
            if let (Some(w), Some(h)) = (record.source_width, record.source_height) {
                if (w, h) != (frame.width(), frame.height()) {
                    tracing::warn!(
                        "Parameters were tuned on a {}x{} image, input is {}x{}",
                        w,
                        h,
                        frame.width(),
                        frame.height()
                    );
                }
            }
            (record.parameters(), record.interpolation_mode)
        }
        None => (
            WarpParameters::for_source(frame.width(), frame.height()),
            InterpolationMode::default(),
        ),
    };

    if let Some(v) = args.center_x {
        params.center_x = v;
    }
    if let Some(v) = args.center_y {
        params.center_y = v;
    }
    if let Some(v) = args.inner_radius {
        params.inner_radius = v;
    }
    if let Some(v) = args.outer_radius {
        params.outer_radius = v;
    }
    if let Some(v) = args.width {
        params.dest_width = v;
    }
    if let Some(v) = args.rotate_deg {
        params.set_rotation_degrees(v);
    }
    if let Some(v) = args.aspect {
        params.aspect_ratio = v;
    }
    if let Some(coeffs) = &args.curve {
        let [a, b, c] = coeffs[..] else {
            bail!("--curve takes three values A,B,C, got {}", coeffs.len());
        };
        params.radial_curve = RadialCurve::new(a, b, c);
    }
    if let Some(m) = args.interp {
        mode = m;
    }

    if let Some(click) = &args.click {
        let [x, y] = click[..] else {
            bail!("--click takes two values X,Y, got {}", click.len());
        };
        let (box_w, box_h) = parse_box(&args.preview_box)?;
        let fit = DisplayFit::new(frame.width(), frame.height(), box_w, box_h);
        fit.recenter(&mut params, x, y);
        info!(
            "Center set from preview click: ({:.2}, {:.2})",
            params.center_x, params.center_y
        );
    }

    Ok((params, mode))
}

/// Parse WIDTHxHEIGHT
fn parse_box(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT, got {:?}", s))?;
    let w = w.trim().parse().with_context(|| format!("Bad width in {:?}", s))?;
    let h = h.trim().parse().with_context(|| format!("Bad height in {:?}", s))?;
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_box() {
        assert_eq!(parse_box("600x400").unwrap(), (600, 400));
        assert_eq!(parse_box("640X480").unwrap(), (640, 480));
        assert!(parse_box("600").is_err());
        assert!(parse_box("ax4").is_err());
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::parse_from([
            "donut-unwarp",
            "in.jpg",
            "--center-x",
            "12.5",
            "--width",
            "720",
            "--rotate-deg",
            "-90",
            "--curve",
            "0,1,-0.1",
            "--interp",
            "cubic",
        ]);
        let frame = Raster::zeroed(400, 300, 3);
        let (params, mode) = resolve_parameters(&args, &frame).unwrap();
        assert_eq!(params.center_x, 12.5);
        assert_eq!(params.center_y, 150.0);
        assert_eq!(params.dest_width, 720);
        assert!((params.rotation_offset + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(params.radial_curve, RadialCurve::new(0.0, 1.0, -0.1));
        assert_eq!(mode, InterpolationMode::Smooth);
    }

    #[test]
    fn test_curve_needs_three_values() {
        let args = Args::parse_from(["donut-unwarp", "in.jpg", "--curve", "0,1"]);
        let frame = Raster::zeroed(400, 300, 3);
        assert!(resolve_parameters(&args, &frame).is_err());
    }

    #[test]
    fn test_click_recenters() {
        let args = Args::parse_from([
            "donut-unwarp",
            "in.jpg",
            "--click",
            "300,150",
            "--preview-box",
            "600x300",
        ]);
        let frame = Raster::zeroed(1200, 600, 3);
        let (params, _) = resolve_parameters(&args, &frame).unwrap();
        assert_eq!(params.center_x, 600.0);
        assert_eq!(params.center_y, 300.0);
    }
}
