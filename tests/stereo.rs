//! Stereo-matching scenarios on a synthetic four-camera rig.

mod common;

use common::*;
use nalgebra::Vector3;

use rust_ptv::io::gdf::stereo_record;
use rust_ptv::matching::{PairLists, StereoMatcher};
use rust_ptv::types::Frame2d;

fn detection_frames(particles: &[Vector3<f64>]) -> Vec<Frame2d> {
    let rig = four_camera_rig(0.1, 1.0);
    (0..4)
        .map(|cam| {
            Frame2d::new(
                particles
                    .iter()
                    .map(|w| pixel_of(rig.camera(cam), w, 0.0))
                    .collect(),
            )
        })
        .collect()
}

#[test]
fn test_trivial_triangulation() {
    let rig = four_camera_rig(0.1, 1.0);
    let matcher = StereoMatcher::new(rig);
    let frames = detection_frames(&[Vector3::zeros()]);

    let matched = matcher.match_frame(&frames).unwrap();
    assert_eq!(matched.len(), 1);
    let p = &matched.points[0];
    assert!(p.pos.norm() < 1e-3);
    assert!(p.residual < 1e-9);
    assert!(p.marks.iter().all(|m| m.is_some()));
}

#[test]
fn test_pairlist_symmetry_for_matched_tuple() {
    let rig = four_camera_rig(0.1, 1.0);
    let frames = detection_frames(&[Vector3::zeros()]);
    let corr: Vec<Vec<_>> = frames
        .iter()
        .enumerate()
        .map(|(i, f)| f.iter().map(|d| rig.camera(i).undistort(d)).collect())
        .collect();

    let pairs = PairLists::build(&rig, &corr);
    for i in 0..4 {
        for k in 0..4 {
            if i != k {
                assert!(pairs.partners(i, 0, k).contains(&0));
            }
        }
    }
}

#[test]
fn test_epipolar_rejection() {
    // Only cameras 0 and 1 see anything, and camera 1's detection sits well
    // off the epipolar line of camera 0's detection.
    let rig = four_camera_rig(0.1, 1.0);
    let all = detection_frames(&[Vector3::zeros()]);
    let mut off = pixel_of(rig.camera(1), &Vector3::zeros(), 0.0);
    off.y += 300.0; // 3 mm on the sensor, thirty times the tolerance
    let frames = vec![
        all[0].clone(),
        Frame2d::new(vec![off]),
        Frame2d::empty(),
        Frame2d::empty(),
    ];

    let matcher = StereoMatcher::new(rig);
    let matched = matcher.match_frame(&frames).unwrap();
    assert!(matched.is_empty());
}

#[test]
fn test_three_of_four_fallback() {
    // Camera 2 misses the particle: the full matcher finds nothing, the
    // degraded matcher recovers the point and tags the missing camera.
    let rig = four_camera_rig(0.1, 1.0);
    let mut frames = detection_frames(&[Vector3::zeros()]);
    frames[2] = Frame2d::empty();

    let matcher = StereoMatcher::new(rig);
    let matched = matcher.match_frame(&frames).unwrap();
    assert_eq!(matched.len(), 1);
    let p = &matched.points[0];
    assert!(p.pos.norm() < 1e-3);
    assert_eq!(p.missing_camera(), Some(2));

    // The legacy record encodes the missing camera in its own slots.
    let rec = stereo_record(7, p);
    assert_eq!(rec.len(), 17);
    assert_eq!(rec[0], 7.0);
    assert_eq!(&rec[11..14], &[2.0, 2.0, 2.0]);
}

#[test]
fn test_deduplication_keeps_smaller_residual() {
    // Two particles on the same line of sight of camera 0, so both
    // 4-tuples share camera 0's single detection. Particle b's detection on
    // camera 1 is nudged by a pixel, giving its tuple the larger residual:
    // the exact tuple keeps the shared detection and b is recovered by the
    // degraded matcher without camera 0.
    let rig = four_camera_rig(0.1, 1.0);
    let a = Vector3::new(3.0, 5.0, 7.0);
    let dir = a - rig.camera(0).center();
    let b = a + 0.04 * dir;

    let mut frames = Vec::new();
    frames.push(Frame2d::new(vec![pixel_of(rig.camera(0), &a, 0.0)]));
    for cam in 1..4 {
        let mut d_b = pixel_of(rig.camera(cam), &b, 0.0);
        if cam == 1 {
            d_b.x += 1.0;
        }
        frames.push(Frame2d::new(vec![pixel_of(rig.camera(cam), &a, 0.0), d_b]));
    }

    let matcher = StereoMatcher::new(rig);
    let matched = matcher.match_frame(&frames).unwrap();
    assert_eq!(matched.len(), 2);

    let full = &matched.points[0];
    assert!(full.marks.iter().all(|m| m.is_some()));
    assert!((full.pos - a).norm() < 1e-3);

    let degraded = &matched.points[1];
    assert_eq!(degraded.missing_camera(), Some(0));
    assert!((degraded.pos - b).norm() < 1.0);

    assert!(full.residual < degraded.residual);

    // camera 0's detection is used exactly once
    let users = matched
        .points
        .iter()
        .filter(|p| p.marks[0].is_some())
        .count();
    assert_eq!(users, 1);
}

#[test]
fn test_residual_bound_holds() {
    let rig = four_camera_rig(0.1, 1.0);
    let tol = rig.mindist_3d * rig.mindist_3d;
    let matcher = StereoMatcher::new(rig);
    let frames = detection_frames(&[
        Vector3::new(3.0, 5.0, 7.0),
        Vector3::new(-12.0, 4.0, 9.0),
        Vector3::new(0.5, -8.0, -20.0),
    ]);

    let matched = matcher.match_frame(&frames).unwrap();
    assert_eq!(matched.len(), 3);
    for p in &matched.points {
        assert!(p.residual < tol);
    }
}

#[test]
fn test_empty_frames_match_to_nothing() {
    let rig = four_camera_rig(0.1, 1.0);
    let matcher = StereoMatcher::new(rig);
    let frames = vec![Frame2d::empty(); 4];
    let matched = matcher.match_frame(&frames).unwrap();
    assert!(matched.is_empty());
}

#[test]
fn test_camera_frame_count_mismatch_is_fatal() {
    let rig = four_camera_rig(0.1, 1.0);
    let matcher = StereoMatcher::new(rig);
    let frames = vec![Frame2d::empty(); 3];
    assert!(matcher.match_frame(&frames).is_err());
}

#[test]
fn test_detections_stay_disjoint_across_tuples() {
    // A denser frame: no detection index may appear on two emitted points.
    let rig = four_camera_rig(0.1, 1.0);
    let matcher = StereoMatcher::new(rig);
    let particles: Vec<Vector3<f64>> = (0..6)
        .map(|i| {
            Vector3::new(
                7.0 * (i as f64) - 17.0,
                5.0 * (((i * i) % 11) as f64) - 20.0,
                9.0 * ((i % 3) as f64) - 10.0,
            )
        })
        .collect();
    let frames = detection_frames(&particles);

    let matched = matcher.match_frame(&frames).unwrap();
    assert!(!matched.is_empty());

    for cam in 0..4 {
        let mut seen = std::collections::HashSet::new();
        for p in &matched.points {
            if let Some(m) = &p.marks[cam] {
                // marks are re-distorted pixels; bit-identical per detection
                let key = (m.x.to_bits(), m.y.to_bits());
                assert!(seen.insert(key), "detection reused on camera {cam}");
            }
        }
    }
}
