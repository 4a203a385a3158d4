//! Epipolar candidate graph: per-camera pair-lists.
//!
//! For each detection on each camera, the line of sight through the
//! detection is projected onto every other camera's sensor plane. Detections
//! within `mindist_2D` of that projected line become candidate partners.
//! The result is an arena keyed by (anchor camera, anchor where-index,
//! other camera) holding where-indices on the other camera; handles, not
//! positions, flow through the consistency search.

use nalgebra::Vector2;

use crate::camera::CameraRig;
use crate::types::SensorPoint;

/// Pair-lists for one synchronized multi-camera frame.
///
/// `lists[i][a][k]` holds the where-indices of detections on camera `k`
/// compatible with detection `a` on camera `i`. The diagonal `k == i` stays
/// empty. Symmetry is not assumed at build time; the consistency matcher
/// checks both directions.
pub struct PairLists {
    ncams: usize,
    lists: Vec<Vec<Vec<Vec<usize>>>>,
}

impl PairLists {
    pub fn build(rig: &CameraRig, frames: &[Vec<SensorPoint>]) -> Self {
        let ncams = rig.ncams();

        // Image of each camera's projective center on every other camera;
        // shared by all detections of the anchor camera.
        let mut centers = vec![vec![Vector2::zeros(); ncams]; ncams];
        for i in 0..ncams {
            for k in 0..ncams {
                if i != k {
                    centers[i][k] = rig.camera(k).world_to_image(&rig.camera(i).center());
                }
            }
        }

        let mut lists = Vec::with_capacity(ncams);
        for i in 0..ncams {
            let mut per_det = Vec::with_capacity(frames[i].len());
            for p_a in &frames[i] {
                let world = rig.camera(i).image_to_world(p_a);
                let mut per_cam = vec![Vec::new(); ncams];
                for (k, slot) in per_cam.iter_mut().enumerate() {
                    if k == i {
                        continue;
                    }
                    let center = centers[i][k];
                    let particle = rig.camera(k).world_to_image(&world);
                    let lineofsight = (particle - center).normalize();
                    // right-hand perpendicular to the projected line of sight
                    let perpdir = Vector2::new(lineofsight.y, -lineofsight.x);
                    for (b, p_b) in frames[k].iter().enumerate() {
                        let offset = Vector2::new(p_b.x, p_b.y) - center;
                        if offset.dot(&perpdir).abs() < rig.mindist_2d {
                            slot.push(b);
                        }
                    }
                }
                per_det.push(per_cam);
            }
            lists.push(per_det);
        }

        Self { ncams, lists }
    }

    pub fn ncams(&self) -> usize {
        self.ncams
    }

    /// Candidate partners of detection `det` on camera `cam` toward camera
    /// `other`.
    pub fn partners(&self, cam: usize, det: usize, other: usize) -> &[usize] {
        &self.lists[cam][det][other]
    }

    /// Mean pair-list size over all (detection, other-camera) slots.
    pub fn mean_len(&self) -> f64 {
        let mut total = 0usize;
        let mut nlists = 0usize;
        for (i, per_det) in self.lists.iter().enumerate() {
            for per_cam in per_det {
                for (k, list) in per_cam.iter().enumerate() {
                    if k != i {
                        total += list.len();
                        nlists += 1;
                    }
                }
            }
        }
        if nlists == 0 {
            0.0
        } else {
            total as f64 / nlists as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use nalgebra::{Matrix3, Vector3};

    fn look_at_origin(eye: Vector3<f64>, up: Vector3<f64>) -> Camera {
        let z = (-eye).normalize();
        let x = up.cross(&z).normalize();
        let y = z.cross(&x);
        let r = Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);
        let t = -r * eye;
        Camera::new(1024, 1024, 0.01, 0.01, 50.0, 0.0, 0.0, r, t, r.transpose(), eye)
    }

    fn two_axis_rig() -> CameraRig {
        let cams = vec![
            look_at_origin(Vector3::new(0.0, 0.0, 1000.0), Vector3::new(0.0, 1.0, 0.0)),
            look_at_origin(Vector3::new(1000.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)),
            look_at_origin(Vector3::new(0.0, 1000.0, 0.0), Vector3::new(0.0, 0.0, 1.0)),
        ];
        CameraRig::new(cams, 0.1, 0.5)
    }

    #[test]
    fn test_consistent_detections_pair_up() {
        let rig = two_axis_rig();
        // All three cameras see a particle at the world origin: the image
        // center of each.
        let frames: Vec<Vec<SensorPoint>> = (0..3)
            .map(|_| {
                vec![SensorPoint {
                    x: 0.0,
                    y: 0.0,
                    ori: 0.0,
                }]
            })
            .collect();
        let pairs = PairLists::build(&rig, &frames);
        for i in 0..3 {
            for k in 0..3 {
                if i != k {
                    assert_eq!(pairs.partners(i, 0, k), &[0]);
                }
            }
        }
        assert!(pairs.mean_len() > 0.99);
    }

    #[test]
    fn test_off_line_detection_rejected() {
        let rig = two_axis_rig();
        // Camera 1 sees the particle well off the epipolar line of camera
        // 0's center detection.
        let frames = vec![
            vec![SensorPoint {
                x: 0.0,
                y: 0.0,
                ori: 0.0,
            }],
            vec![SensorPoint {
                x: 0.0,
                y: 3.0,
                ori: 0.0,
            }],
            vec![SensorPoint {
                x: 0.0,
                y: 0.0,
                ori: 0.0,
            }],
        ];
        let pairs = PairLists::build(&rig, &frames);
        assert!(pairs.partners(0, 0, 1).is_empty());
    }
}
