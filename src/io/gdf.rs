//! GDF binary record streams (little-endian).
//!
//! Header, six i32 values: magic 82991, number of dimensions (2), columns,
//! rows, type code (5 = f64), total element count. Rows and total are
//! unknown while writing and are patched in at finalize.
//!
//! Detection inputs carry 48-byte records of six f64 values: x, y,
//! brightness, orientation, particle count in the frame, frame number.
//! Consumers scan forward, grouping records that share a frame number.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::types::{Detection, Frame2d, WorldPoint};

pub const GDF_MAGIC: i32 = 82991;
pub const GDF_NDIMS: i32 = 2;
pub const GDF_TYPE_F64: i32 = 5;

#[derive(Debug, Error)]
pub enum GdfError {
    #[error("failed to open {path}")]
    Open {
        path: PathBuf,
        source: io::Error,
    },
    #[error("not a GDF file (magic {found}, expected 82991)")]
    BadMagic { found: i32 },
    #[error("unsupported GDF type code {code} (expected 5 = f64)")]
    UnsupportedType { code: i32 },
    #[error("record truncated at end of file")]
    Truncated,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct GdfHeader {
    pub ndims: i32,
    pub cols: i32,
    pub rows: i32,
    pub type_code: i32,
    pub total: i32,
}

fn read_header<R: ReadBytesExt>(reader: &mut R) -> Result<GdfHeader, GdfError> {
    let magic = reader.read_i32::<LittleEndian>()?;
    if magic != GDF_MAGIC {
        return Err(GdfError::BadMagic { found: magic });
    }
    let ndims = reader.read_i32::<LittleEndian>()?;
    let cols = reader.read_i32::<LittleEndian>()?;
    let rows = reader.read_i32::<LittleEndian>()?;
    let type_code = reader.read_i32::<LittleEndian>()?;
    let total = reader.read_i32::<LittleEndian>()?;
    Ok(GdfHeader {
        ndims,
        cols,
        rows,
        type_code,
        total,
    })
}

/// Map an end-of-file in the middle of a record to [`GdfError::Truncated`].
fn mid_record(err: io::Error) -> GdfError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        GdfError::Truncated
    } else {
        GdfError::Io(err)
    }
}

/// Reader for per-camera detection files.
#[derive(Debug)]
pub struct DetectionReader {
    reader: BufReader<File>,
    pub header: GdfHeader,
}

impl DetectionReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdfError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| GdfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader)?;
        if header.type_code != GDF_TYPE_F64 {
            return Err(GdfError::UnsupportedType {
                code: header.type_code,
            });
        }
        Ok(Self { reader, header })
    }

    /// Read every record and assemble one `Frame2d` per frame number in
    /// `first..=last`. A frame number the stream never mentions yields an
    /// empty frame, so a camera that missed a frame simply contributes no
    /// candidates.
    pub fn read_frames(&mut self, first: usize, last: usize) -> Result<Vec<Frame2d>, GdfError> {
        let nframes = last - first + 1;
        let mut grouped: Vec<Vec<Detection>> = vec![Vec::new(); nframes];

        loop {
            let x = match self.reader.read_f64::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let y = self.reader.read_f64::<LittleEndian>().map_err(mid_record)?;
            let _brightness = self.reader.read_f64::<LittleEndian>().map_err(mid_record)?;
            let ori = self.reader.read_f64::<LittleEndian>().map_err(mid_record)?;
            let _count = self.reader.read_f64::<LittleEndian>().map_err(mid_record)?;
            let frame = self.reader.read_f64::<LittleEndian>().map_err(mid_record)?;

            let frame = frame as i64;
            if frame < first as i64 || frame > last as i64 {
                continue;
            }
            grouped[(frame - first as i64) as usize].push(Detection::new(x, y, ori));
        }

        Ok(grouped.into_iter().map(Frame2d::new).collect())
    }
}

/// Record-stream writer with a deferred header.
pub struct GdfWriter {
    writer: BufWriter<File>,
    cols: i32,
    rows: i32,
}

impl GdfWriter {
    /// Create the file and write a provisional header; the row counts are
    /// patched by [`GdfWriter::finalize`].
    pub fn create<P: AsRef<Path>>(path: P, cols: i32) -> Result<Self, GdfError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| GdfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_i32::<LittleEndian>(GDF_MAGIC)?;
        writer.write_i32::<LittleEndian>(GDF_NDIMS)?;
        writer.write_i32::<LittleEndian>(cols)?;
        writer.write_i32::<LittleEndian>(0)?; // rows, unknown yet
        writer.write_i32::<LittleEndian>(GDF_TYPE_F64)?;
        writer.write_i32::<LittleEndian>(0)?; // total, unknown yet
        Ok(Self {
            writer,
            cols,
            rows: 0,
        })
    }

    pub fn write_record(&mut self, record: &[f64]) -> Result<(), GdfError> {
        debug_assert_eq!(record.len(), self.cols as usize);
        for v in record {
            self.writer.write_f64::<LittleEndian>(*v)?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    /// Patch the header with the real row and element counts.
    pub fn finalize(mut self) -> Result<(), GdfError> {
        self.writer.seek(SeekFrom::Start(12))?;
        self.writer.write_i32::<LittleEndian>(self.rows)?;
        self.writer.seek(SeekFrom::Current(4))?;
        self.writer.write_i32::<LittleEndian>(self.cols * self.rows)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Columns of the stereo-match output: frame, X, Y, Z, residual, then
/// (x, y, ori) per camera.
pub fn stereo_columns(ncams: usize) -> i32 {
    (5 + 3 * ncams) as i32
}

/// Serialize one matched world point.
///
/// A camera the point is missing from gets the legacy sentinel: x, y and
/// orientation all carry the camera's own index, so consumers detect
/// `ori == own camera index` as "missing".
pub fn stereo_record(framenumber: usize, point: &WorldPoint) -> Vec<f64> {
    let mut rec = Vec::with_capacity(5 + 3 * point.marks.len());
    rec.push(framenumber as f64);
    rec.push(point.pos.x);
    rec.push(point.pos.y);
    rec.push(point.pos.z);
    rec.push(point.residual);
    for (cam, mark) in point.marks.iter().enumerate() {
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
    rec
}

/// Reader for stereo-match files, mostly for tests and downstream tooling.
pub struct StereoReader {
    reader: BufReader<File>,
    pub header: GdfHeader,
}

impl StereoReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdfError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| GdfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader)?;
        if header.type_code != GDF_TYPE_F64 {
            return Err(GdfError::UnsupportedType {
                code: header.type_code,
            });
        }
        Ok(Self { reader, header })
    }

    /// All rows, each `header.cols` wide.
    pub fn read_rows(&mut self) -> Result<Vec<Vec<f64>>, GdfError> {
        let cols = self.header.cols as usize;
        let mut rows = Vec::new();
        loop {
            let first = match self.reader.read_f64::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let mut row = Vec::with_capacity(cols);
            row.push(first);
            for _ in 1..cols {
                row.push(self.reader.read_f64::<LittleEndian>().map_err(mid_record)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}
