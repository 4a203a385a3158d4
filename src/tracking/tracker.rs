//! Multi-frame tracker: links per-frame world points into trajectories.
//!
//! Each frame step predicts every active track's next position from its
//! velocity (and, with three or more points, acceleration), finds the best
//! continuation among the next frame's points, resolves contested points by
//! cost, starts new tracks from unclaimed points, and pads unmatched tracks
//! with extrapolated positions until their occlusion budget runs out.
//!
//! The FRAME4 cost looks one frame further: each in-range candidate is
//! re-projected and scored by its distance to the nearest point two frames
//! ahead. This is a depth-2 search, unrolled into two scans.

use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::{debug, info};

use crate::types::Frame3d;

use super::track::Track;

/// Minimum reported length for a track to be emitted.
pub const MINTRACK: usize = 10;

/// How much future information the link cost may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    /// Nearest neighbor: the estimate is the last position.
    Frame2,
    /// Kinematic estimate scored against the next frame.
    Frame3,
    /// Kinematic estimate plus a one-frame look-ahead.
    Frame4,
}

impl TrackMode {
    /// Map the configuration's `npredict` field (number of predicted
    /// frames) to a mode.
    pub fn from_npredict(npredict: u32) -> Option<Self> {
        match npredict {
            0 => Some(TrackMode::Frame2),
            1 => Some(TrackMode::Frame3),
            2 => Some(TrackMode::Frame4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub mode: TrackMode,
    /// Maximum single-frame displacement in world units.
    pub max_disp: f64,
    /// Maximum consecutive occlusions before a track is retired.
    pub memory: u32,
    /// Emitted-time scale; track times are frame / fps.
    pub fps: f64,
}

enum PadAction {
    Keep,
    Retire,
    Drop,
    Extend(Vector3<f64>),
}

/// The tracker owns the track map and the active set; there is no external
/// mutator. Tracks are emitted in retirement order, which is deterministic
/// (frame, then scan order within a frame).
pub struct Tracker {
    config: TrackerConfig,
    tracks: HashMap<u64, Track>,
    active: Vec<u64>,
    next_id: u64,
    emitted: Vec<Track>,
    too_short: usize,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            active: Vec::new(),
            next_id: 0,
            emitted: Vec::new(),
            too_short: 0,
        }
    }

    /// Link all frames and return the finished tracks.
    pub fn run(mut self, frames: &[Frame3d]) -> Vec<Track> {
        if frames.is_empty() {
            return Vec::new();
        }

        for p in &frames[0].points {
            self.spawn(p.clone(), 0);
        }

        // FRAME4 needs two future frames, so the last link step stops one
        // frame earlier.
        let end = match self.config.mode {
            TrackMode::Frame4 => frames.len().saturating_sub(2),
            _ => frames.len() - 1,
        };

        for k in 0..end {
            let framenum = k + 1;
            let fr1 = &frames[k + 1];
            if fr1.is_empty() {
                self.pad_tracks(framenum);
                continue;
            }
            let fr2 = frames.get(k + 2);

            let mut links: Vec<Option<(u64, f64)>> = vec![None; fr1.len()];
            self.make_links(fr1, fr2, &mut links);

            let mut n_new = 0usize;
            let mut n_unmatched = self.active.len();
            for (i, p) in fr1.points.iter().enumerate() {
                match links[i] {
                    None => {
                        self.spawn(p.clone(), framenum);
                        n_new += 1;
                    }
                    Some((tid, _)) => {
                        let t = self.tracks.get_mut(&tid).expect("linked track exists");
                        t.add(p.clone(), framenum);
                        t.reset_occlusion();
                        n_unmatched -= 1;
                    }
                }
            }

            self.pad_tracks(framenum);

            debug!(
                frame = framenum,
                particles = fr1.len(),
                active = self.active.len(),
                new = n_new,
                unmatched = n_unmatched,
                total = self.tracks.len(),
                "frame linked"
            );
        }

        // Flush whatever is still active.
        let active = std::mem::take(&mut self.active);
        for tid in active {
            let t = self.tracks.remove(&tid).expect("active track exists");
            self.emit(t);
        }

        info!(
            tracks = self.emitted.len(),
            points = self.emitted.iter().map(|t| t.total_len()).sum::<usize>(),
            too_short = self.too_short,
            "tracking finished"
        );
        self.emitted
    }

    fn spawn(&mut self, point: crate::types::WorldPoint, frame: usize) {
        let id = self.next_id;
        self.next_id += 1;
        self.tracks.insert(id, Track::new(point, frame));
        self.active.push(id);
    }

    fn emit(&mut self, track: Track) {
        if track.len() >= MINTRACK {
            self.emitted.push(track);
        } else {
            self.too_short += 1;
        }
    }

    /// Find each active track's best continuation in `fr1` and resolve
    /// contested points in favor of the lowest cost.
    fn make_links(&self, fr1: &Frame3d, fr2: Option<&Frame3d>, links: &mut [Option<(u64, f64)>]) {
        for &tid in &self.active {
            let t = &self.tracks[&tid];
            let now = t.last();
            let len = t.len();

            let mut velocity = Vector3::zeros();
            let estimate = if len == 1 || self.config.mode == TrackMode::Frame2 {
                now
            } else {
                velocity = now - t.penultimate();
                if len > 2 {
                    let acceleration = now - 2.0 * t.penultimate() + t.antepenultimate();
                    now + velocity + 0.5 * acceleration
                } else {
                    now + velocity
                }
            };

            let lookahead = match self.config.mode {
                TrackMode::Frame4 => fr2,
                _ => None,
            };
            let best = self.best_link(fr1, lookahead, &estimate, &velocity, &now);

            if let Some((idx, cost)) = best {
                match links[idx] {
                    None => links[idx] = Some((tid, cost)),
                    Some((_, existing)) if existing > cost => links[idx] = Some((tid, cost)),
                    _ => {}
                }
            }
        }
    }

    /// Scan `fr1` for continuations within `max_disp` of `estimate`. With a
    /// look-ahead frame, each candidate is scored by re-projecting the
    /// track through it and measuring the distance to the nearest point in
    /// that frame; otherwise the squared distance to the estimate is the
    /// cost. Ties on the minimum cost go to the last candidate in scan
    /// order.
    fn best_link(
        &self,
        fr1: &Frame3d,
        lookahead: Option<&Frame3d>,
        estimate: &Vector3<f64>,
        velocity: &Vector3<f64>,
        now: &Vector3<f64>,
    ) -> Option<(usize, f64)> {
        let max2 = self.config.max_disp * self.config.max_disp;
        let mut candidates: Vec<(usize, f64)> = Vec::new();
        let mut mincost = f64::INFINITY;

        for (idx, p) in fr1.points.iter().enumerate() {
            let mag = (estimate - p.pos).norm_squared();
            if mag > max2 {
                continue;
            }
            let cost = match lookahead {
                None => mag,
                Some(f2) => {
                    let new_velocity = p.pos - now;
                    let acceleration = new_velocity - velocity;
                    let new_estimate = p.pos + new_velocity + 0.5 * acceleration;
                    self.min_dist2_within(f2, &new_estimate)
                }
            };
            if mincost > cost {
                mincost = cost;
            }
            candidates.push((idx, cost));
        }

        let mut best = None;
        for &(idx, cost) in &candidates {
            if cost > mincost {
                continue;
            }
            best = Some((idx, cost));
        }
        best
    }

    /// Minimum squared distance from `target` to a point of `frame` within
    /// `max_disp`; infinite when nothing is in range.
    fn min_dist2_within(&self, frame: &Frame3d, target: &Vector3<f64>) -> f64 {
        let max2 = self.config.max_disp * self.config.max_disp;
        let mut min = f64::INFINITY;
        for p in &frame.points {
            let mag = (target - p.pos).norm_squared();
            if mag <= max2 && mag < min {
                min = mag;
            }
        }
        min
    }

    /// Handle the active tracks that were not extended this frame: retire
    /// them once their occlusion budget is spent, drop the ones too short to
    /// extrapolate, and pad the rest with an estimated position.
    fn pad_tracks(&mut self, framenum: usize) {
        let active = std::mem::take(&mut self.active);
        let mut still = Vec::with_capacity(active.len());

        for tid in active {
            let action = {
                let t = self.tracks.get(&tid).expect("active track exists");
                if t.last_frame() == framenum {
                    PadAction::Keep
                } else if t.occlusion_count() >= self.config.memory {
                    PadAction::Retire
                } else if t.len() <= 2 {
                    PadAction::Drop
                } else {
                    let last = t.last();
                    let velocity = last - t.penultimate();
                    let acceleration =
                        0.5 * (last - 2.0 * t.penultimate() + t.antepenultimate());
                    let mut estimate = last + velocity + 0.5 * acceleration;
                    // an extrapolation jumping farther than a particle could
                    // move falls back to the last known position
                    let max2 = self.config.max_disp * self.config.max_disp;
                    if (estimate - last).norm_squared() > max2 {
                        estimate = last;
                    }
                    PadAction::Extend(estimate)
                }
            };

            match action {
                PadAction::Keep => still.push(tid),
                PadAction::Retire => {
                    let t = self.tracks.remove(&tid).expect("active track exists");
                    self.emit(t);
                }
                PadAction::Drop => {
                    self.tracks.remove(&tid);
                    self.too_short += 1;
                }
                PadAction::Extend(estimate) => {
                    let t = self.tracks.get_mut(&tid).expect("active track exists");
                    t.add_estimate(estimate, framenum);
                    t.occluded();
                    still.push(tid);
                }
            }
        }

        self.active = still;
    }
}
