//! De-duplication of matched tuples.
//!
//! Within one stereo match no 2D detection may contribute to more than one
//! emitted world point. Conflicting tuples are pruned greedily in insertion
//! order, keeping the smaller residual; scan order breaks ties, making the
//! result deterministic.

use crate::types::SensorPoint;

use super::consistency::TupleCandidate;

/// Conflict test used when comparing degraded candidates against other
/// matches.
///
/// The historical behavior compares X and Y equality independently across
/// cameras (`flagX || flagY`), which can over-eliminate when two real
/// particles share one axis value. It is kept as the default for
/// compatibility; `SharedDetection` requires an actual shared detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPredicate {
    #[default]
    EitherAxis,
    SharedDetection,
}

impl ConflictPredicate {
    /// Do `a` and `b` conflict on any camera both of them saw?
    pub fn conflicts(
        &self,
        frames: &[Vec<SensorPoint>],
        a: &TupleCandidate,
        b: &TupleCandidate,
    ) -> bool {
        match self {
            ConflictPredicate::EitherAxis => {
                let mut flag_x = false;
                let mut flag_y = false;
                for (cam, (ai, bi)) in a.indices.iter().zip(&b.indices).enumerate() {
                    if let (Some(ai), Some(bi)) = (ai, bi) {
                        let pa = &frames[cam][*ai];
                        let pb = &frames[cam][*bi];
                        flag_x |= pa.x == pb.x;
                        flag_y |= pa.y == pb.y;
                    }
                }
                flag_x || flag_y
            }
            ConflictPredicate::SharedDetection => shares_detection(a, b),
        }
    }
}

/// True when the tuples reuse the same detection on any camera.
pub fn shares_detection(a: &TupleCandidate, b: &TupleCandidate) -> bool {
    a.indices
        .iter()
        .zip(&b.indices)
        .any(|(ai, bi)| matches!((ai, bi), (Some(x), Some(y)) if x == y))
}

/// Greedy conflict pruning. Scans pairs in order; for each conflicting pair
/// the member with the larger residual is removed, with the running minimum
/// carried forward so a later, better tuple can still displace the current
/// survivor. Returns the removal mask.
///
/// `skip_removed` controls whether already-removed tuples still participate
/// as comparison partners (the two historical passes differ on this).
pub fn greedy_prune<F>(residuals: &[f64], conflicts: F, skip_removed: bool) -> Vec<bool>
where
    F: Fn(usize, usize) -> bool,
{
    let n = residuals.len();
    let mut removed = vec![false; n];
    for i in 0..n {
        if removed[i] {
            continue;
        }
        let mut min = residuals[i];
        for j in i + 1..n {
            if skip_removed && removed[j] {
                continue;
            }
            if !conflicts(i, j) {
                continue;
            }
            if min < residuals[j] {
                removed[j] = true;
            } else {
                min = residuals[j];
                removed[i] = true;
                break;
            }
        }
    }
    removed
}
