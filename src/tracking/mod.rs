//! Multi-frame tracking: trajectories from per-frame 3D position sets.

pub mod track;
pub mod tracker;

pub use track::{Track, TrackPoint};
pub use tracker::{TrackMode, Tracker, TrackerConfig, MINTRACK};
