//! Track output files: writer and a consumer-side reader.
//!
//! Per point, `7 + 3*ncams` doubles (19 with four cameras): track index, X,
//! Y, Z, time = frame / fps, per camera (x, y, ori), residual, fake bit.
//! Rows of one track share the index column; extrapolated rows have the
//! fake bit set and zeroed camera marks.

use std::path::Path;

use crate::tracking::Track;

use super::gdf::{GdfError, GdfWriter, StereoReader};

/// Columns of the track output format.
pub fn track_columns(ncams: usize) -> i32 {
    (7 + 3 * ncams) as i32
}

/// Streaming writer for finished tracks.
pub struct TrackWriter {
    writer: GdfWriter,
    ncams: usize,
    fps: f64,
}

impl TrackWriter {
    pub fn create<P: AsRef<Path>>(path: P, ncams: usize, fps: f64) -> Result<Self, GdfError> {
        let writer = GdfWriter::create(path, track_columns(ncams))?;
        Ok(Self { writer, ncams, fps })
    }

    /// Write every point of the track, trailing estimates included; the
    /// MINTRACK filter has already been applied on the reported length.
    pub fn write_track(&mut self, index: usize, track: &Track) -> Result<(), GdfError> {
        for tp in track.points() {
            let mut rec = Vec::with_capacity(track_columns(self.ncams) as usize);
            rec.push(index as f64);
            rec.push(tp.point.pos.x);
            rec.push(tp.point.pos.y);
            rec.push(tp.point.pos.z);
            rec.push(tp.frame as f64 / self.fps);
            if tp.fake {
                rec.extend(std::iter::repeat(0.0).take(3 * self.ncams));
                rec.push(0.0); // residual
                rec.push(1.0); // fake bit
            } else {
                for (cam, mark) in tp.point.marks.iter().enumerate() {
                    match mark {
                        Some(m) => {
                            rec.push(m.x);
                            rec.push(m.y);
                            rec.push(m.ori);
                        }
                        None => {
                            let sentinel = cam as f64;
                            rec.push(sentinel);
                            rec.push(sentinel);
                            rec.push(sentinel);
                        }
                    }
                }
                rec.push(tp.point.residual);
                rec.push(0.0);
            }
            self.writer.write_record(&rec)?;
        }
        Ok(())
    }

    pub fn rows(&self) -> i32 {
        self.writer.rows()
    }

    pub fn finalize(self) -> Result<(), GdfError> {
        self.writer.finalize()
    }
}

/// One track as read back from a track file.
#[derive(Debug, Clone)]
pub struct ReadTrack {
    pub index: usize,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub t: Vec<f64>,
    pub fake: Vec<bool>,
}

impl ReadTrack {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Reads a track file back, grouping rows by the track-index column.
pub struct TrackfileReader {
    rows: std::vec::IntoIter<Vec<f64>>,
    pending: Option<Vec<f64>>,
}

impl TrackfileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdfError> {
        let mut reader = StereoReader::open(path)?;
        let rows = reader.read_rows()?;
        Ok(Self {
            rows: rows.into_iter(),
            pending: None,
        })
    }

    /// The next track in file order, or `None` at end of file.
    pub fn next_track(&mut self) -> Option<ReadTrack> {
        let first = self.pending.take().or_else(|| self.rows.next())?;
        let index = first[0] as usize;
        let mut track = ReadTrack {
            index,
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            t: Vec::new(),
            fake: Vec::new(),
        };
        let mut row = Some(first);
        while let Some(r) = row {
            if r[0] as usize != index {
                self.pending = Some(r);
                break;
            }
            track.x.push(r[1]);
            track.y.push(r[2]);
            track.z.push(r[3]);
            track.t.push(r[4]);
            track.fake.push(*r.last().expect("non-empty row") != 0.0);
            row = self.rows.next();
        }
        Some(track)
    }

    /// Remaining tracks, in file order.
    pub fn read_all(mut self) -> Vec<ReadTrack> {
        let mut tracks = Vec::new();
        while let Some(t) = self.next_track() {
            tracks.push(t);
        }
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorldPoint;
    use nalgebra::Vector3;

    fn track_along_x(n: usize) -> Track {
        let point = |x: f64| WorldPoint {
            pos: Vector3::new(x, 0.0, 0.0),
            residual: 0.01,
            marks: vec![
                Some(crate::types::CameraMark {
                    x: 512.0,
                    y: 512.0,
                    ori: 0.0,
                });
                4
            ],
        };
        let mut t = Track::new(point(0.0), 0);
        for i in 1..n {
            t.add(point(i as f64), i);
        }
        t
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.gdf");

        let mut a = track_along_x(12);
        a.add_estimate(Vector3::new(12.0, 0.0, 0.0), 12);
        let b = track_along_x(10);

        let mut w = TrackWriter::create(&path, 4, 2.0).unwrap();
        w.write_track(0, &a).unwrap();
        w.write_track(1, &b).unwrap();
        assert_eq!(w.rows(), 23);
        w.finalize().unwrap();

        let tracks = TrackfileReader::open(&path).unwrap().read_all();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].index, 0);
        assert_eq!(tracks[0].len(), 13);
        assert!(tracks[0].fake[12]);
        assert!(!tracks[0].fake[11]);
        // time column is frame / fps
        assert_eq!(tracks[0].t[4], 2.0);
        assert_eq!(tracks[1].len(), 10);
        assert_eq!(tracks[1].x[9], 9.0);
    }
}
