//! Pinhole camera model with the legacy Tsai-style parameter set.
//!
//! Coordinate conventions differ between the image and the world:
//! - pixel coordinates have their origin at the image corner, Y down;
//! - sensor-plane coordinates are centered millimetres, Y up;
//! - world coordinates are millimetres, related to the camera frame by
//!   `p_cam = R * p_world + T`.
//!
//! The radial (`kr`) and cylindrical (`kx`) distortion coefficients are part
//! of the calibration file format and are stored, but this revision applies
//! them as identity: undistortion is the centering/flip/scale alone and
//! re-distortion is its exact inverse.

use nalgebra::{Matrix3, Vector2, Vector3};

use crate::types::{CameraMark, Detection, SensorPoint};

/// A fixed, calibrated camera. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Camera {
    npixw: i32,
    npixh: i32,
    wpix: f64,
    hpix: f64,
    f_eff: f64,
    #[allow(dead_code)]
    kr: f64,
    #[allow(dead_code)]
    kx: f64,
    r: Matrix3<f64>,
    t: Vector3<f64>,
    rinv: Matrix3<f64>,
    tinv: Vector3<f64>,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        npixw: i32,
        npixh: i32,
        wpix: f64,
        hpix: f64,
        f_eff: f64,
        kr: f64,
        kx: f64,
        r: Matrix3<f64>,
        t: Vector3<f64>,
        rinv: Matrix3<f64>,
        tinv: Vector3<f64>,
    ) -> Self {
        Self {
            npixw,
            npixh,
            wpix,
            hpix,
            f_eff,
            kr,
            kx,
            r,
            t,
            rinv,
            tinv,
        }
    }

    /// The projective center, in world coordinates.
    pub fn center(&self) -> Vector3<f64> {
        self.tinv
    }

    // Image centering uses the integer pixel half-counts of the original
    // calibration convention.
    fn half_w(&self) -> f64 {
        (self.npixw / 2) as f64
    }

    fn half_h(&self) -> f64 {
        (self.npixh / 2) as f64
    }

    /// Pixel coordinates to centered sensor-plane millimetres. The Y axis is
    /// flipped: image coordinates are left-handed.
    pub fn undistort(&self, p: &Detection) -> SensorPoint {
        SensorPoint {
            x: (p.x - self.half_w()) * self.wpix,
            y: (-p.y + self.half_h()) * self.hpix,
            ori: p.ori,
        }
    }

    /// Centered sensor-plane millimetres back to pixel coordinates; the
    /// exact inverse of [`Camera::undistort`].
    pub fn distort(&self, p: &SensorPoint) -> CameraMark {
        CameraMark {
            x: p.x / self.wpix + self.half_w(),
            y: -(p.y / self.hpix - self.half_h()),
            ori: p.ori,
        }
    }

    /// Project a sensor-plane point out to a world-frame point lying on the
    /// line of sight through the detection.
    ///
    /// The point is treated as sitting on the sensor plane at focal
    /// distance; scaling by `T.z / f_eff` places the projection at depth
    /// `T.z` in the camera frame before mapping into the world.
    pub fn image_to_world(&self, p: &SensorPoint) -> Vector3<f64> {
        let scale = self.t.z / self.f_eff;
        let proj = Vector3::new(p.x * scale, p.y * scale, self.t.z);
        self.rinv * (proj - self.t)
    }

    /// Project a world point onto the sensor plane (undistorted
    /// millimetres).
    pub fn world_to_image(&self, p: &Vector3<f64>) -> Vector2<f64> {
        let proj = self.r * p + self.t;
        let scale = self.f_eff / proj.z;
        Vector2::new(proj.x * scale, proj.y * scale)
    }
}
