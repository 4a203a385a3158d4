//! The legacy run-configuration file.
//!
//! Plain text, one value per line, in fixed order: `ncams`; `ncams` input
//! filenames; calibration path; `fps`; `threshold`; `cluster_rad`;
//! `npredict`; `max_disp`; `memory`; first frame; last frame; stereo-match
//! output path; track output path.
//!
//! Each line's token ends at the first whitespace, so paths with spaces are
//! unrepresentable. This mirrors the historical parser and is kept for
//! compatibility.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("configuration file ended before {what}")]
    MissingLine { what: &'static str },
    #[error("invalid value {token:?} for {what}")]
    BadValue { what: &'static str, token: String },
}

/// Run configuration for one tracking job.
#[derive(Debug, Clone)]
pub struct Config {
    pub ncams: usize,
    /// One detection input per camera; the extension selects the producer.
    pub inputs: Vec<PathBuf>,
    pub calibration: PathBuf,
    pub fps: f64,
    /// Particle-finder intensity threshold. Parsed for compatibility; only
    /// the movie-decoding producer would use it.
    pub threshold: f64,
    /// Particle-finder clustering radius; compatibility, as above.
    pub cluster_rad: f64,
    /// Number of predicted frames the link cost may use (0, 1 or 2).
    pub npredict: u32,
    pub max_disp: f64,
    pub memory: u32,
    pub first: usize,
    pub last: usize,
    pub stereo_out: PathBuf,
    pub track_out: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut lines = text.lines();

        let ncams: usize = next_value(&mut lines, "ncams")?;
        let mut inputs = Vec::with_capacity(ncams);
        for _ in 0..ncams {
            inputs.push(PathBuf::from(next_token(&mut lines, "input filename")?));
        }
        let calibration = PathBuf::from(next_token(&mut lines, "calibration path")?);
        let fps = next_value(&mut lines, "fps")?;
        let threshold = next_value(&mut lines, "threshold")?;
        let cluster_rad = next_value(&mut lines, "cluster_rad")?;
        let npredict = next_value(&mut lines, "npredict")?;
        let max_disp = next_value(&mut lines, "max_disp")?;
        let memory = next_value(&mut lines, "memory")?;
        let first = next_value(&mut lines, "first frame")?;
        let last = next_value(&mut lines, "last frame")?;
        let stereo_out = PathBuf::from(next_token(&mut lines, "stereo output path")?);
        let track_out = PathBuf::from(next_token(&mut lines, "track output path")?);

        Ok(Self {
            ncams,
            inputs,
            calibration,
            fps,
            threshold,
            cluster_rad,
            npredict,
            max_disp,
            memory,
            first,
            last,
            stereo_out,
            track_out,
        })
    }
}

/// The next line's leading token (everything before the first whitespace).
fn next_token<'a, I: Iterator<Item = &'a str>>(
    lines: &mut I,
    what: &'static str,
) -> Result<&'a str, ConfigError> {
    let line = lines.next().ok_or(ConfigError::MissingLine { what })?;
    line.split_whitespace()
        .next()
        .ok_or(ConfigError::MissingLine { what })
}

fn next_value<'a, I, T>(lines: &mut I, what: &'static str) -> Result<T, ConfigError>
where
    I: Iterator<Item = &'a str>,
    T: FromStr,
{
    let token = next_token(lines, what)?;
    token.parse().map_err(|_| ConfigError::BadValue {
        what,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
4 cameras
cam0.gdf first movie
cam1.gdf
cam2.gdf
cam3.gdf
calib.txt calibration from calibTsai
450 frames per second
30 threshold
2.5 cluster radius
1 npredict
0.8 max_disp
3 memory
0 first frame
100 last frame
matched.gdf
tracks.gdf
";

    #[test]
    fn test_parse_sample() {
        let cfg = Config::parse(SAMPLE).unwrap();
        assert_eq!(cfg.ncams, 4);
        assert_eq!(cfg.inputs.len(), 4);
        assert_eq!(cfg.inputs[1], PathBuf::from("cam1.gdf"));
        assert_eq!(cfg.calibration, PathBuf::from("calib.txt"));
        assert_eq!(cfg.fps, 450.0);
        assert_eq!(cfg.npredict, 1);
        assert_eq!(cfg.memory, 3);
        assert_eq!(cfg.first, 0);
        assert_eq!(cfg.last, 100);
        assert_eq!(cfg.track_out, PathBuf::from("tracks.gdf"));
    }

    #[test]
    fn test_token_ends_at_first_whitespace() {
        let cfg = Config::parse(SAMPLE).unwrap();
        // "cam0.gdf first movie" keeps only the leading token
        assert_eq!(cfg.inputs[0], PathBuf::from("cam0.gdf"));
    }

    #[test]
    fn test_truncated_file() {
        match Config::parse("4\ncam0.gdf\n") {
            Err(ConfigError::MissingLine { .. }) => {}
            other => panic!("expected MissingLine, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_number() {
        match Config::parse(&SAMPLE.replace("450 frames per second", "fast")) {
            Err(ConfigError::BadValue { token, .. }) => assert_eq!(token, "fast"),
            other => panic!("expected BadValue, got {other:?}"),
        }
    }
}
