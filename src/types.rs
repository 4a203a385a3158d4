//! Core data model shared by stereo-matching and tracking.

use nalgebra::Vector3;

/// A single 2D particle detection in pixel coordinates, with the origin at
/// the image corner. Orientation is an optional scalar carried through from
/// the detection stage; producers without one report 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub ori: f64,
}

impl Detection {
    pub fn new(x: f64, y: f64, ori: f64) -> Self {
        Self { x, y, ori }
    }
}

/// An undistorted detection on the sensor plane: millimetres, origin at the
/// image center, Y up (right-handed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPoint {
    pub x: f64,
    pub y: f64,
    pub ori: f64,
}

/// The detections of one camera for one synchronized frame. A detection's
/// index within the frame (its where-index) is its identity for the duration
/// of one stereo match.
#[derive(Debug, Clone, Default)]
pub struct Frame2d {
    detections: Vec<Detection>,
}

impl Frame2d {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// An empty frame, used when a camera missed a frame entirely.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Detection {
        &self.detections[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }
}

/// A source detection recorded on an emitted world point, re-distorted back
/// into pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMark {
    pub x: f64,
    pub y: f64,
    pub ori: f64,
}

/// A triangulated particle position in world coordinates (mm).
///
/// `marks` holds one entry per camera of the rig. A camera that did not see
/// the particle (degraded match) is `None`; the legacy sentinel encoding is
/// applied only at serialization time.
#[derive(Debug, Clone)]
pub struct WorldPoint {
    pub pos: Vector3<f64>,
    /// Mean squared perpendicular distance from `pos` to the contributing
    /// lines of sight.
    pub residual: f64,
    pub marks: Vec<Option<CameraMark>>,
}

impl WorldPoint {
    /// The camera skipped by the degraded matcher, if any.
    pub fn missing_camera(&self) -> Option<usize> {
        self.marks.iter().position(|m| m.is_none())
    }
}

/// The consensus world points of one synchronized multi-camera frame.
#[derive(Debug, Clone, Default)]
pub struct Frame3d {
    pub points: Vec<WorldPoint>,
}

impl Frame3d {
    pub fn new(points: Vec<WorldPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
