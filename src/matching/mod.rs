//! Per-frame stereo-matching.
//!
//! One `StereoMatcher::match_frame` call takes the synchronized detections
//! of all cameras and produces the consensus world points for that frame:
//! undistort, build pair-lists, run the full N-camera consistency search,
//! then the degraded N-1 search once per skippable camera, de-duplicate,
//! triangulate. All scratch state (pair-lists, partial tuples, conflict
//! marks) is owned by the call and dropped on every exit path.

pub mod consistency;
pub mod dedup;
pub mod pairlist;

pub use consistency::TupleCandidate;
pub use dedup::ConflictPredicate;
pub use pairlist::PairLists;

use std::collections::HashSet;

use anyhow::{bail, Result};
use tracing::debug;

use crate::camera::CameraRig;
use crate::types::{Frame2d, Frame3d, SensorPoint, WorldPoint};

use consistency::{find_degraded_tuples, find_full_tuples};
use dedup::{greedy_prune, shares_detection};

/// Tunables that are not part of the calibration file.
#[derive(Debug, Clone, Default)]
pub struct MatcherConfig {
    /// Conflict test applied between degraded candidates and other matches.
    pub predicate: ConflictPredicate,
}

/// Stereo matcher bound to a calibrated rig.
pub struct StereoMatcher {
    rig: CameraRig,
    config: MatcherConfig,
}

impl StereoMatcher {
    pub fn new(rig: CameraRig) -> Self {
        Self::with_config(rig, MatcherConfig::default())
    }

    pub fn with_config(rig: CameraRig, config: MatcherConfig) -> Self {
        Self { rig, config }
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Match one synchronized frame. `frames` must hold one `Frame2d` per
    /// camera of the rig, in camera order.
    pub fn match_frame(&self, frames: &[Frame2d]) -> Result<Frame3d> {
        let ncams = self.rig.ncams();
        if frames.len() != ncams {
            bail!(
                "number of cameras ({}) and number of frames ({}) do not match",
                ncams,
                frames.len()
            );
        }

        // Move every detection into centered sensor-plane millimetres.
        let corr: Vec<Vec<SensorPoint>> = frames
            .iter()
            .enumerate()
            .map(|(i, f)| f.iter().map(|d| self.rig.camera(i).undistort(d)).collect())
            .collect();

        let pairs = PairLists::build(&self.rig, &corr);
        debug!(mean_pairlist_size = pairs.mean_len(), "pair lists built");

        // Full N-camera matches, then one-per-detection pruning.
        let full = find_full_tuples(&self.rig, &corr, &pairs);
        let residuals: Vec<f64> = full.iter().map(|c| c.residual).collect();
        let removed = greedy_prune(
            &residuals,
            |i, j| shares_detection(&full[i], &full[j]),
            false,
        );
        let full_kept: Vec<TupleCandidate> = full
            .into_iter()
            .zip(&removed)
            .filter(|(_, &r)| !r)
            .map(|(c, _)| c)
            .collect();

        // Detections claimed by a surviving full match are off-limits for
        // the degraded passes.
        let mut consumed: Vec<HashSet<usize>> = vec![HashSet::new(); ncams];
        for cand in &full_kept {
            for (cam, idx) in cand.indices.iter().enumerate() {
                if let Some(idx) = idx {
                    consumed[cam].insert(*idx);
                }
            }
        }

        // Degraded matches, one pass per skipped camera.
        let mut degraded: Vec<TupleCandidate> = Vec::new();
        for mcam in 0..ncams {
            debug!(mcam, "degraded consistency pass");
            let cands = find_degraded_tuples(&self.rig, &corr, &pairs, mcam, &consumed);
            let residuals: Vec<f64> = cands.iter().map(|c| c.residual).collect();
            let removed = greedy_prune(
                &residuals,
                |i, j| shares_detection(&cands[i], &cands[j]),
                false,
            );
            let mut kept: Vec<TupleCandidate> = cands
                .into_iter()
                .zip(&removed)
                .filter(|(_, &r)| !r)
                .map(|(c, _)| c)
                .collect();
            // anything still colliding with a full match is dropped outright
            kept.retain(|c| {
                !full_kept
                    .iter()
                    .any(|f| self.config.predicate.conflicts(&corr, c, f))
            });
            degraded.extend(kept);
        }

        // Candidates from different skipped-camera passes can still reuse a
        // detection; keep the smaller residual.
        let residuals: Vec<f64> = degraded.iter().map(|c| c.residual).collect();
        let removed = greedy_prune(
            &residuals,
            |i, j| {
                self.config
                    .predicate
                    .conflicts(&corr, &degraded[i], &degraded[j])
            },
            true,
        );
        let degraded_kept = degraded
            .iter()
            .zip(&removed)
            .filter(|(_, &r)| !r)
            .map(|(c, _)| c.clone());

        let points: Vec<WorldPoint> = full_kept
            .iter()
            .cloned()
            .chain(degraded_kept)
            .map(|c| self.to_world_point(&corr, c))
            .collect();

        debug!(matched = points.len(), "frame matched");
        Ok(Frame3d::new(points))
    }

    fn to_world_point(&self, corr: &[Vec<SensorPoint>], cand: TupleCandidate) -> WorldPoint {
        let marks = cand
            .indices
            .iter()
            .enumerate()
            .map(|(cam, idx)| idx.map(|a| self.rig.camera(cam).distort(&corr[cam][a])))
            .collect();
        WorldPoint {
            pos: cand.pos,
            residual: cand.residual,
            marks,
        }
    }
}
