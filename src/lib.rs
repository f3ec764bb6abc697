//! donut-unwarp - turn donut (annular) panoramic captures into flat panoramas
//!
//! The core is two pure steps: [`build_map`] computes, for every panorama
//! pixel, the fractional source coordinate on the annulus, and [`resample`]
//! pulls pixels from a source raster through that map. Build the map once
//! and resample as many frames as needed; [`Unwarper`] does the caching.

pub mod config;
pub mod display;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod raster;
pub mod resample;
pub mod transform;

pub use config::{
    InterpolationMode, ParameterRecord, RadialCurve, RecordFormat, WarpParameters,
    DEFAULT_ASPECT_RATIO,
};
pub use error::UnwarpError;
pub use pipeline::Unwarper;
pub use raster::Raster;
pub use resample::{resample, FILL_VALUE};
pub use transform::{build_map, build_map_for, CoordinateMap};
