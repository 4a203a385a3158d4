//! A single particle trajectory.

use nalgebra::Vector3;

use crate::types::WorldPoint;

/// One entry of a track: a world position tagged with its frame number and
/// whether it came from a real detection or from kinematic extrapolation.
#[derive(Debug, Clone)]
pub struct TrackPoint {
    pub point: WorldPoint,
    pub frame: usize,
    pub fake: bool,
}

/// An ordered sequence of world positions with strictly increasing frame
/// numbers. Tracks are created, extended, extrapolated, or retired; never
/// spliced.
///
/// The occlusion counter (frames since the last real detection was
/// appended) and the trailing-estimate trimming are deliberately separate:
/// the counter governs retirement, the trimming governs the reported
/// length.
#[derive(Debug, Clone)]
pub struct Track {
    points: Vec<TrackPoint>,
    occluded: u32,
}

impl Track {
    pub fn new(point: WorldPoint, frame: usize) -> Self {
        Self {
            points: vec![TrackPoint {
                point,
                frame,
                fake: false,
            }],
            occluded: 0,
        }
    }

    /// Append a real detection.
    pub fn add(&mut self, point: WorldPoint, frame: usize) {
        debug_assert!(frame > self.last_frame());
        self.points.push(TrackPoint {
            point,
            frame,
            fake: false,
        });
    }

    /// Append an extrapolated position.
    pub fn add_estimate(&mut self, pos: Vector3<f64>, frame: usize) {
        debug_assert!(frame > self.last_frame());
        let ncams = self.points[0].point.marks.len();
        self.points.push(TrackPoint {
            point: WorldPoint {
                pos,
                residual: 0.0,
                marks: vec![None; ncams],
            },
            frame,
            fake: true,
        });
    }

    pub fn last(&self) -> Vector3<f64> {
        self.points[self.points.len() - 1].point.pos
    }

    pub fn penultimate(&self) -> Vector3<f64> {
        self.points[self.points.len() - 2].point.pos
    }

    pub fn antepenultimate(&self) -> Vector3<f64> {
        self.points[self.points.len() - 3].point.pos
    }

    pub fn last_frame(&self) -> usize {
        self.points[self.points.len() - 1].frame
    }

    /// Reported length: the total size minus any trailing run of
    /// extrapolated points.
    pub fn len(&self) -> usize {
        let trailing = self
            .points
            .iter()
            .rev()
            .take_while(|p| p.fake)
            .count();
        self.points.len() - trailing
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total size including trailing extrapolated points.
    pub fn total_len(&self) -> usize {
        self.points.len()
    }

    /// Number of extrapolated points within the reported length.
    pub fn num_fake(&self) -> usize {
        self.points[..self.len()].iter().filter(|p| p.fake).count()
    }

    pub fn occlusion_count(&self) -> u32 {
        self.occluded
    }

    pub fn occluded(&mut self) {
        self.occluded += 1;
    }

    pub fn reset_occlusion(&mut self) {
        self.occluded = 0;
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }
}
