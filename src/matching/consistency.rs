//! Consistency search over the epipolar candidate graph.
//!
//! A tuple of detections, one per participating camera, is accepted as a
//! single-particle hypothesis when every pair of members appears on each
//! other's pair-lists (the two-sided membership test) and the least-squares
//! intersection of the corresponding lines of sight is tight enough.
//!
//! Two variants: the full matcher requires all N cameras; the degraded
//! matcher repeats the search once per skipped camera with N-1 members,
//! restricted to detections not already consumed by a full match.

use std::collections::HashSet;

use nalgebra::Vector3;

use crate::camera::CameraRig;
use crate::geometry::{intersect_rays, Ray, RayIntersection};
use crate::types::SensorPoint;

use super::pairlist::PairLists;

/// An accepted single-particle hypothesis: one where-index per camera
/// (`None` for the camera skipped by the degraded matcher) plus the
/// triangulated position and its residual.
#[derive(Debug, Clone)]
pub struct TupleCandidate {
    pub indices: Vec<Option<usize>>,
    pub pos: Vector3<f64>,
    pub residual: f64,
}

/// Intersect the lines of sight of the tuple's participating cameras.
pub fn triangulate_tuple(
    rig: &CameraRig,
    frames: &[Vec<SensorPoint>],
    indices: &[Option<usize>],
) -> RayIntersection {
    let rays: Vec<Ray> = indices
        .iter()
        .enumerate()
        .filter_map(|(i, idx)| {
            idx.map(|a| {
                let cam = rig.camera(i);
                Ray::through(cam.center(), cam.image_to_world(&frames[i][a]))
            })
        })
        .collect();
    intersect_rays(&rays)
}

/// Find all N-wise consistent tuples, triangulated and filtered by the rig's
/// 3D tolerance. Camera 0 anchors the search; candidates are returned in
/// anchor insertion order, scan order within one anchor.
pub fn find_full_tuples(
    rig: &CameraRig,
    frames: &[Vec<SensorPoint>],
    pairs: &PairLists,
) -> Vec<TupleCandidate> {
    let ncams = rig.ncams();
    let tol = rig.mindist_3d * rig.mindist_3d;
    let mut found = Vec::new();

    for p0 in 0..frames[0].len() {
        // quick reject: the anchor must have candidates on every camera
        if (1..ncams).any(|k| pairs.partners(0, p0, k).is_empty()) {
            continue;
        }

        // Branching search: partial tuples grow append-only; an accepted
        // extension is pushed as a new tuple so the original can still
        // branch with other candidates.
        let mut partials: Vec<Vec<usize>> = vec![vec![p0]];
        for i in 1..ncams {
            let snapshot = partials.len();
            for k in 0..snapshot {
                if partials[k].len() < i {
                    // fell behind in an earlier round; cannot be completed
                    continue;
                }
                for q in 0..frames[i].len() {
                    if (i + 1..ncams).any(|j| pairs.partners(i, q, j).is_empty()) {
                        continue;
                    }
                    let consistent = (0..i).all(|j| {
                        let t_j = partials[k][j];
                        pairs.partners(i, q, j).contains(&t_j)
                            && pairs.partners(j, t_j, i).contains(&q)
                    });
                    if consistent {
                        let mut ext = partials[k].clone();
                        ext.push(q);
                        partials.push(ext);
                    }
                }
            }
        }

        for tuple in partials.iter().filter(|t| t.len() == ncams) {
            let indices: Vec<Option<usize>> = tuple.iter().map(|&d| Some(d)).collect();
            let hit = triangulate_tuple(rig, frames, &indices);
            if hit.residual < tol {
                found.push(TupleCandidate {
                    indices,
                    pos: hit.point,
                    residual: hit.residual,
                });
            }
        }
    }

    found
}

/// One degraded pass: find (N-1)-wise consistent tuples with camera `mcam`
/// skipped entirely.
///
/// The search is seeded from the lowest-index remaining camera; every tuple
/// that skips `mcam` necessarily contains that camera, so further seeds
/// could only regenerate the same tuples. Seeds and candidates whose
/// where-index appears in `consumed` (detections already claimed by a full
/// match on that camera) are excluded.
pub fn find_degraded_tuples(
    rig: &CameraRig,
    frames: &[Vec<SensorPoint>],
    pairs: &PairLists,
    mcam: usize,
    consumed: &[HashSet<usize>],
) -> Vec<TupleCandidate> {
    let ncams = rig.ncams();
    let tol = rig.mindist_3d * rig.mindist_3d;
    let icam = (0..ncams).find(|&c| c != mcam).expect("rig has >= 3 cameras");
    let mut found = Vec::new();

    for seed in 0..frames[icam].len() {
        if consumed[icam].contains(&seed) {
            continue;
        }
        if (0..ncams)
            .filter(|&i| i != mcam && i != icam)
            .any(|i| pairs.partners(icam, seed, i).is_empty())
        {
            continue;
        }

        // Partial tuples carry (camera, where-index) pairs since the member
        // cameras are no longer contiguous.
        let mut partials: Vec<Vec<(usize, usize)>> = vec![vec![(icam, seed)]];
        let mut round = 0;
        for i in (0..ncams).filter(|&i| i != mcam && i != icam) {
            round += 1;
            let snapshot = partials.len();
            for k in 0..snapshot {
                if partials[k].len() < round {
                    continue;
                }
                for q in 0..frames[i].len() {
                    if consumed[i].contains(&q) {
                        continue;
                    }
                    if (0..ncams)
                        .filter(|&j| j != i && j != mcam)
                        .any(|j| pairs.partners(i, q, j).is_empty())
                    {
                        continue;
                    }
                    let consistent = partials[k].iter().all(|&(jc, jd)| {
                        pairs.partners(i, q, jc).contains(&jd)
                            && pairs.partners(jc, jd, i).contains(&q)
                    });
                    if consistent {
                        let mut ext = partials[k].clone();
                        ext.push((i, q));
                        partials.push(ext);
                    }
                }
            }
        }

        for tuple in partials.iter().filter(|t| t.len() == ncams - 1) {
            let mut indices: Vec<Option<usize>> = vec![None; ncams];
            for &(cam, det) in tuple {
                indices[cam] = Some(det);
            }
            let hit = triangulate_tuple(rig, frames, &indices);
            if hit.residual < tol {
                found.push(TupleCandidate {
                    indices,
                    pos: hit.point,
                    residual: hit.residual,
                });
            }
        }
    }

    found
}
