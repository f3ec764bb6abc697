//! Warp parameters and the persisted parameter record

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::UnwarpError;

/// Panorama aspect ratio of the legacy camera (360 degrees by 55 degrees)
pub const DEFAULT_ASPECT_RATIO: f64 = 360.0 / 55.0;

/// Default panorama width for a freshly loaded source
pub const DEFAULT_DEST_WIDTH: u32 = 1200;

/// Quadratic radial warp curve `f(t) = A*t^2 + B*t + C`
///
/// `t` is the normalized destination row in `[0, 1]`, the result is the
/// fraction between inner and outer radius. Values outside `[0, 1]` are
/// allowed and sample outside the annulus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RadialCurve {
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
}

impl Default for RadialCurve {
    /// Empirical fit for the legacy donut lens
    fn default() -> Self {
        Self {
            a: 0.1850,
            b: 0.8184,
            c: -0.0028,
        }
    }
}

impl RadialCurve {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Straight blend from inner (t = 0) to outer (t = 1) radius
    pub fn linear() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }

    #[inline]
    pub fn eval(&self, t: f64) -> f64 {
        self.a * t * t + self.b * t + self.c
    }

    /// Minimum and maximum of the curve over `t` in `[0, 1]`
    pub fn range_over_unit(&self) -> (f64, f64) {
        let mut lo = self.eval(0.0).min(self.eval(1.0));
        let mut hi = self.eval(0.0).max(self.eval(1.0));
        if self.a != 0.0 {
            let vertex = -self.b / (2.0 * self.a);
            if (0.0..=1.0).contains(&vertex) {
                let v = self.eval(vertex);
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        (lo, hi)
    }
}

/// Sampling method used by the resampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    #[default]
    Nearest,
    /// Bicubic over the 4x4 neighborhood
    #[serde(alias = "cubic")]
    Smooth,
}

impl InterpolationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationMode::Nearest => "nearest",
            InterpolationMode::Smooth => "smooth",
        }
    }
}

impl std::str::FromStr for InterpolationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(InterpolationMode::Nearest),
            "smooth" | "cubic" => Ok(InterpolationMode::Smooth),
            other => Err(format!("unknown interpolation mode '{}'", other)),
        }
    }
}

/// Geometry of the annulus and the panorama it unwraps into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpParameters {
    /// Annulus center in source pixels
    pub center_x: f64,
    pub center_y: f64,
    /// Radius sampled at curve value 0
    pub inner_radius: f64,
    /// Radius sampled at curve value 1
    pub outer_radius: f64,
    /// Added to the sweep angle, radians
    pub rotation_offset: f64,
    pub dest_width: u32,
    pub aspect_ratio: f64,
    pub radial_curve: RadialCurve,
}

impl WarpParameters {
    /// Starting parameters for a source image of the given size
    ///
    /// Full-sensor frames from the legacy camera get its measured optical
    /// center; anything smaller is assumed to be centered.
    pub fn for_source(width: u32, height: u32) -> Self {
        let half_h = height as f64 / 2.0;
        Self {
            center_x: if width > 1400 { 1314.5 } else { width as f64 / 2.0 },
            center_y: if height > 1000 { 997.25 } else { half_h },
            inner_radius: half_h * 0.16,
            outer_radius: half_h * 0.72,
            rotation_offset: 0.0,
            dest_width: DEFAULT_DEST_WIDTH,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            radial_curve: RadialCurve::default(),
        }
    }

    /// Panorama height derived from width and aspect ratio
    ///
    /// Exact halves round to the even row count.
    pub fn dest_height(&self) -> Result<u32, UnwarpError> {
        let height = (self.dest_width as f64 / self.aspect_ratio).round_ties_even();
        if self.dest_width == 0 || !height.is_finite() || height < 1.0 {
            return Err(UnwarpError::InvalidDimensions {
                width: self.dest_width,
                height: if height.is_finite() && height > 0.0 { height as u32 } else { 0 },
            });
        }
        Ok(height as u32)
    }

    pub fn validate_radii(&self) -> Result<(), UnwarpError> {
        let (inner, outer) = (self.inner_radius, self.outer_radius);
        if !inner.is_finite() || !outer.is_finite() || inner < 0.0 || inner >= outer {
            return Err(UnwarpError::InvalidRadii { inner, outer });
        }
        Ok(())
    }

    /// Check every boundary rule and return the panorama size
    pub fn validate(&self) -> Result<(u32, u32), UnwarpError> {
        self.validate_radii()?;
        Ok((self.dest_width, self.dest_height()?))
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_offset.to_degrees()
    }

    pub fn set_rotation_degrees(&mut self, degrees: f64) {
        self.rotation_offset = degrees.to_radians();
    }
}

/// Flat parameter record exchanged with callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterRecord {
    pub center_x: f64,
    pub center_y: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub dest_width: u32,
    #[serde(default)]
    pub rotation_offset_radians: f64,
    #[serde(default)]
    pub interpolation_mode: InterpolationMode,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,

    /// Source image the record was tuned on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_height: Option<u32>,

    // Kept last so TOML emits it as a trailing table
    #[serde(default)]
    pub radial_curve: RadialCurve,
}

fn default_aspect_ratio() -> f64 {
    DEFAULT_ASPECT_RATIO
}

/// Record layout written by the older unwarper tool
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    cx: f64,
    cy: f64,
    #[serde(rename = "minR")]
    min_r: f64,
    #[serde(rename = "maxR")]
    max_r: f64,
    width: u32,
    #[serde(default)]
    shift_deg: f64,
    #[serde(default)]
    interp: InterpolationMode,
    #[serde(rename = "yWarp", default)]
    y_warp: RadialCurve,
    #[serde(default = "default_aspect_ratio")]
    aspect: f64,
    #[serde(default)]
    image_path: Option<PathBuf>,
    #[serde(default)]
    w: Option<u32>,
    #[serde(default)]
    h: Option<u32>,
}

impl From<LegacyRecord> for ParameterRecord {
    fn from(legacy: LegacyRecord) -> Self {
        Self {
            center_x: legacy.cx,
            center_y: legacy.cy,
            inner_radius: legacy.min_r,
            outer_radius: legacy.max_r,
            dest_width: legacy.width,
            rotation_offset_radians: legacy.shift_deg.to_radians(),
            interpolation_mode: legacy.interp,
            aspect_ratio: legacy.aspect,
            image_path: legacy.image_path,
            source_width: legacy.w,
            source_height: legacy.h,
            radial_curve: legacy.y_warp,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Current(ParameterRecord),
    Legacy(LegacyRecord),
}

impl From<StoredRecord> for ParameterRecord {
    fn from(stored: StoredRecord) -> Self {
        match stored {
            StoredRecord::Current(record) => record,
            StoredRecord::Legacy(legacy) => {
                tracing::debug!("Converting legacy parameter record");
                legacy.into()
            }
        }
    }
}

/// Serialization format, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Toml,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => RecordFormat::Toml,
            _ => RecordFormat::Json,
        }
    }
}

impl ParameterRecord {
    pub fn from_parameters(params: &WarpParameters, mode: InterpolationMode) -> Self {
        Self {
            center_x: params.center_x,
            center_y: params.center_y,
            inner_radius: params.inner_radius,
            outer_radius: params.outer_radius,
            dest_width: params.dest_width,
            rotation_offset_radians: params.rotation_offset,
            interpolation_mode: mode,
            aspect_ratio: params.aspect_ratio,
            image_path: None,
            source_width: None,
            source_height: None,
            radial_curve: params.radial_curve,
        }
    }

    /// Attach the source image the parameters belong to
    pub fn with_source(mut self, path: &Path, width: u32, height: u32) -> Self {
        self.image_path = Some(path.to_path_buf());
        self.source_width = Some(width);
        self.source_height = Some(height);
        self
    }

    pub fn parameters(&self) -> WarpParameters {
        WarpParameters {
            center_x: self.center_x,
            center_y: self.center_y,
            inner_radius: self.inner_radius,
            outer_radius: self.outer_radius,
            rotation_offset: self.rotation_offset_radians,
            dest_width: self.dest_width,
            aspect_ratio: self.aspect_ratio,
            radial_curve: self.radial_curve,
        }
    }

    /// Parse a record in the given format, accepting the legacy layout too
    pub fn parse(content: &str, format: RecordFormat) -> Result<Self> {
        let stored: StoredRecord = match format {
            RecordFormat::Json => {
                serde_json::from_str(content).context("Failed to parse JSON parameter record")?
            }
            RecordFormat::Toml => {
                toml::from_str(content).context("Failed to parse TOML parameter record")?
            }
        };
        Ok(stored.into())
    }

    pub fn to_text(&self, format: RecordFormat) -> Result<String> {
        match format {
            RecordFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize parameter record")
            }
            RecordFormat::Toml => {
                toml::to_string_pretty(self).context("Failed to serialize parameter record")
            }
        }
    }

    /// Load a record from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {:?}", path))?;
        let record = Self::parse(&content, RecordFormat::from_path(path))
            .with_context(|| format!("Failed to load parameters from {:?}", path))?;
        tracing::info!("Loaded parameters from {:?}", path);
        Ok(record)
    }

    /// Save the record to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_text(RecordFormat::from_path(path))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write parameters to {:?}", path))?;

        tracing::info!("Saved parameters to {:?}", path);
        Ok(())
    }
}
