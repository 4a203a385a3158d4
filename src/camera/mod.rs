//! Camera model and calibrated rig.

pub mod model;
pub mod rig;

pub use model::Camera;
pub use rig::{CameraRig, RigError};
