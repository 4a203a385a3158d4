//! Shared test fixtures: a synthetic four-camera rig on the coordinate
//! axes, all aimed at the origin from 1000 mm away.
#![allow(dead_code)]

use nalgebra::{Matrix3, Vector3};

use rust_ptv::camera::{Camera, CameraRig};
use rust_ptv::types::{Detection, SensorPoint};

pub const NPIX: i32 = 1024;
pub const PITCH: f64 = 0.01;
pub const F_EFF: f64 = 50.0;

/// Camera positions and up-hints for the standard four-camera rig.
pub fn camera_axes() -> Vec<(Vector3<f64>, Vector3<f64>)> {
    vec![
        (Vector3::new(0.0, 0.0, 1000.0), Vector3::new(0.0, 1.0, 0.0)),
        (Vector3::new(1000.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)),
        (Vector3::new(0.0, 1000.0, 0.0), Vector3::new(0.0, 0.0, 1.0)),
        (Vector3::new(-1000.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)),
    ]
}

/// Rotation/translation pairs (world -> camera and back) for a camera at
/// `eye` aimed at the origin.
pub fn look_at_origin(
    eye: Vector3<f64>,
    up: Vector3<f64>,
) -> (Matrix3<f64>, Vector3<f64>, Matrix3<f64>, Vector3<f64>) {
    let z = (-eye).normalize();
    let x = up.cross(&z).normalize();
    let y = z.cross(&x);
    let r = Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);
    let t = -r * eye;
    (r, t, r.transpose(), eye)
}

pub fn axis_camera(eye: Vector3<f64>, up: Vector3<f64>) -> Camera {
    let (r, t, rinv, tinv) = look_at_origin(eye, up);
    Camera::new(NPIX, NPIX, PITCH, PITCH, F_EFF, 0.0, 0.0, r, t, rinv, tinv)
}

pub fn four_camera_rig(mindist_2d: f64, mindist_3d: f64) -> CameraRig {
    let cams = camera_axes()
        .into_iter()
        .map(|(eye, up)| axis_camera(eye, up))
        .collect();
    CameraRig::new(cams, mindist_2d, mindist_3d)
}

/// The calibration file describing [`four_camera_rig`], in the legacy text
/// format.
pub fn calibration_text(mindist_2d: f64, mindist_3d: f64) -> String {
    let mut s = String::from("# synthetic axis rig\n4\n");
    for (eye, up) in camera_axes() {
        let (r, t, rinv, tinv) = look_at_origin(eye, up);
        s.push_str(&format!("{NPIX} {NPIX} {PITCH} {PITCH} {F_EFF} 0.0 0.0\n"));
        for row in r.row_iter() {
            s.push_str(&format!("{} {} {}\n", row[0], row[1], row[2]));
        }
        s.push_str(&format!("{} {} {}\n", t.x, t.y, t.z));
        for row in rinv.row_iter() {
            s.push_str(&format!("{} {} {}\n", row[0], row[1], row[2]));
        }
        s.push_str(&format!("{} {} {}\n", tinv.x, tinv.y, tinv.z));
    }
    s.push_str(&format!("{mindist_2d} {mindist_3d}\n"));
    s
}

/// Project a world point into a camera and return the pixel-space
/// detection an ideal particle finder would report.
pub fn pixel_of(cam: &Camera, w: &Vector3<f64>, ori: f64) -> Detection {
    let img = cam.world_to_image(w);
    let mark = cam.distort(&SensorPoint {
        x: img.x,
        y: img.y,
        ori,
    });
    Detection::new(mark.x, mark.y, mark.ori)
}
