//! Calibrated multi-camera rig, loaded from the legacy calibration file.
//!
//! The file is plain text: `#` starts a comment running to the end of the
//! line, and a line *beginning* with `#` is dropped whole. The remaining
//! whitespace-separated tokens are, in order: `ncams`; per camera
//! `Npixw Npixh wpix hpix f_eff kr kx`, nine doubles for R (row-major),
//! three for T, nine for Rinv, three for Tinv; finally `mindist_2D` and
//! `mindist_3D` in millimetres.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use super::model::Camera;

#[derive(Debug, Error)]
pub enum RigError {
    #[error("failed to read calibration file {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("calibration file ended while reading {what}")]
    MissingToken { what: &'static str },
    #[error("invalid value {token:?} for {what}")]
    BadToken { what: &'static str, token: String },
    #[error("calibration declares {ncams} cameras; at least 3 are required")]
    TooFewCameras { ncams: usize },
}

/// A set of calibrated cameras plus the matching tolerances.
#[derive(Debug, Clone)]
pub struct CameraRig {
    cams: Vec<Camera>,
    /// Epipolar tolerance on each sensor plane (mm).
    pub mindist_2d: f64,
    /// Triangulation tolerance in world space (mm); emitted points must have
    /// residual below its square.
    pub mindist_3d: f64,
}

impl CameraRig {
    pub fn new(cams: Vec<Camera>, mindist_2d: f64, mindist_3d: f64) -> Self {
        Self {
            cams,
            mindist_2d,
            mindist_3d,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, RigError> {
        let stripped: String = text
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(|line| match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            })
            .collect::<Vec<_>>()
            .join("\t");
        let mut tokens = stripped.split_whitespace();

        let ncams = next_usize(&mut tokens, "ncams")?;
        if ncams < 3 {
            return Err(RigError::TooFewCameras { ncams });
        }

        let mut cams = Vec::with_capacity(ncams);
        for _ in 0..ncams {
            cams.push(parse_camera(&mut tokens)?);
        }

        let mindist_2d = next_f64(&mut tokens, "mindist_2D")?;
        let mindist_3d = next_f64(&mut tokens, "mindist_3D")?;

        Ok(Self {
            cams,
            mindist_2d,
            mindist_3d,
        })
    }

    pub fn ncams(&self) -> usize {
        self.cams.len()
    }

    pub fn camera(&self, idx: usize) -> &Camera {
        &self.cams[idx]
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cams
    }
}

fn parse_camera<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Result<Camera, RigError> {
    let npixw = next_i32(tokens, "Npixw")?;
    let npixh = next_i32(tokens, "Npixh")?;
    let wpix = next_f64(tokens, "wpix")?;
    let hpix = next_f64(tokens, "hpix")?;
    let f_eff = next_f64(tokens, "f_eff")?;
    let kr = next_f64(tokens, "kr")?;
    let kx = next_f64(tokens, "kx")?;
    let r = next_matrix(tokens, "R")?;
    let t = next_vector(tokens, "T")?;
    let rinv = next_matrix(tokens, "Rinv")?;
    let tinv = next_vector(tokens, "Tinv")?;
    Ok(Camera::new(
        npixw, npixh, wpix, hpix, f_eff, kr, kx, r, t, rinv, tinv,
    ))
}

fn next_token<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    what: &'static str,
) -> Result<&'a str, RigError> {
    tokens.next().ok_or(RigError::MissingToken { what })
}

fn next_f64<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    what: &'static str,
) -> Result<f64, RigError> {
    let token = next_token(tokens, what)?;
    token.parse().map_err(|_| RigError::BadToken {
        what,
        token: token.to_string(),
    })
}

fn next_i32<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    what: &'static str,
) -> Result<i32, RigError> {
    let token = next_token(tokens, what)?;
    token.parse().map_err(|_| RigError::BadToken {
        what,
        token: token.to_string(),
    })
}

fn next_usize<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    what: &'static str,
) -> Result<usize, RigError> {
    let token = next_token(tokens, what)?;
    token.parse().map_err(|_| RigError::BadToken {
        what,
        token: token.to_string(),
    })
}

fn next_matrix<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    what: &'static str,
) -> Result<Matrix3<f64>, RigError> {
    let mut buf = [0.0; 9];
    for v in buf.iter_mut() {
        *v = next_f64(tokens, what)?;
    }
    Ok(Matrix3::from_row_slice(&buf))
}

fn next_vector<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    what: &'static str,
) -> Result<Vector3<f64>, RigError> {
    let mut buf = [0.0; 3];
    for v in buf.iter_mut() {
        *v = next_f64(tokens, what)?;
    }
    Ok(Vector3::new(buf[0], buf[1], buf[2]))
}
