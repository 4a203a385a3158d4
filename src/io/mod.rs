//! Legacy file formats: run configuration and GDF record streams.

pub mod config;
pub mod gdf;
pub mod trackfile;

pub use config::{Config, ConfigError};
pub use gdf::{DetectionReader, GdfError, GdfWriter, StereoReader};
pub use trackfile::{ReadTrack, TrackWriter, TrackfileReader};
