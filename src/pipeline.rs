//! End-to-end pipeline: detection inputs → stereo-matching → tracking.
//!
//! The pipeline is strictly sequential: detection frames are consumed in
//! index order, 3D frames are produced in index order, and tracks are
//! emitted in track-id order. Stereo-matching of one frame is pure given
//! the rig and the input frames, but track assembly must stay serialized
//! because track-id assignment is an ordered monotonic counter.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::camera::CameraRig;
use crate::io::config::Config;
use crate::io::gdf::{stereo_columns, stereo_record, DetectionReader, GdfWriter};
use crate::io::trackfile::TrackWriter;
use crate::matching::StereoMatcher;
use crate::tracking::{TrackMode, Tracker, TrackerConfig};
use crate::types::{Frame2d, Frame3d};

enum InputKind {
    Gdf,
    Cpv,
}

fn input_kind(path: &Path) -> Result<InputKind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gdf") => Ok(InputKind::Gdf),
        Some("cpv") => Ok(InputKind::Cpv),
        _ => bail!("unknown input file extension: {}", path.display()),
    }
}

/// One tracking job, configured and ready to run.
pub struct Pipeline {
    config: Config,
    matcher: StereoMatcher,
}

impl Pipeline {
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config =
            Config::load(path.as_ref()).context("failed to read the configuration file")?;
        Self::new(config)
    }

    pub fn new(config: Config) -> Result<Self> {
        if TrackMode::from_npredict(config.npredict).is_none() {
            bail!(
                "too many predicted frames requested: npredict = {}",
                config.npredict
            );
        }
        if config.last < config.first {
            bail!(
                "last frame {} precedes first frame {}",
                config.last,
                config.first
            );
        }
        let rig = CameraRig::load(&config.calibration).with_context(|| {
            format!(
                "failed to load calibration from {}",
                config.calibration.display()
            )
        })?;
        if rig.ncams() != config.ncams {
            bail!(
                "configuration declares {} cameras but the calibration file has {}",
                config.ncams,
                rig.ncams()
            );
        }
        if config.inputs.len() != config.ncams {
            bail!(
                "configuration declares {} cameras but lists {} input files",
                config.ncams,
                config.inputs.len()
            );
        }
        Ok(Self {
            config,
            matcher: StereoMatcher::new(rig),
        })
    }

    pub fn run(&self) -> Result<()> {
        let by_time = self.load_detections()?;
        let matched = self.stereo_match(&by_time)?;
        self.track(&matched)
    }

    /// Load every camera's detections for the configured frame range,
    /// transposed to time-major order.
    fn load_detections(&self) -> Result<Vec<Vec<Frame2d>>> {
        let nframes = self.config.last - self.config.first + 1;
        let mut by_time: Vec<Vec<Frame2d>> =
            vec![Vec::with_capacity(self.config.ncams); nframes];

        for (camid, input) in self.config.inputs.iter().enumerate() {
            match input_kind(input)? {
                InputKind::Cpv => bail!(
                    "movie input {} needs the external frame-decoding stage; \
                     this build consumes .gdf detection files",
                    input.display()
                ),
                InputKind::Gdf => {
                    info!(camera = camid, path = %input.display(), "reading detections");
                    let mut reader = DetectionReader::open(input)
                        .with_context(|| format!("opening {}", input.display()))?;
                    let frames = reader
                        .read_frames(self.config.first, self.config.last)
                        .with_context(|| format!("reading {}", input.display()))?;
                    for (n, f) in frames.into_iter().enumerate() {
                        by_time[n].push(f);
                    }
                }
            }
        }

        Ok(by_time)
    }

    fn stereo_match(&self, by_time: &[Vec<Frame2d>]) -> Result<Vec<Frame3d>> {
        let mut writer = GdfWriter::create(
            &self.config.stereo_out,
            stereo_columns(self.config.ncams),
        )
        .with_context(|| format!("creating {}", self.config.stereo_out.display()))?;

        let mut matched = Vec::with_capacity(by_time.len());
        for (n, frames) in by_time.iter().enumerate() {
            debug!(frame = n, "stereo-matching");
            let frame3d = self.matcher.match_frame(frames)?;
            for p in &frame3d.points {
                writer.write_record(&stereo_record(n, p))?;
            }
            matched.push(frame3d);
        }

        info!(
            frames = matched.len(),
            points = writer.rows(),
            path = %self.config.stereo_out.display(),
            "stereo-matching finished"
        );
        writer.finalize()?;
        Ok(matched)
    }

    fn track(&self, matched: &[Frame3d]) -> Result<()> {
        let mode =
            TrackMode::from_npredict(self.config.npredict).expect("validated at construction");
        let tracker = Tracker::new(TrackerConfig {
            mode,
            max_disp: self.config.max_disp,
            memory: self.config.memory,
            fps: self.config.fps,
        });
        let tracks = tracker.run(matched);

        let mut writer =
            TrackWriter::create(&self.config.track_out, self.config.ncams, self.config.fps)
                .with_context(|| format!("creating {}", self.config.track_out.display()))?;
        for (index, track) in tracks.iter().enumerate() {
            writer.write_track(index, track)?;
        }
        writer.finalize()?;

        info!(
            tracks = tracks.len(),
            path = %self.config.track_out.display(),
            "tracks written"
        );
        Ok(())
    }
}
