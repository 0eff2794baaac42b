//! Recording sink: annotated frames appended to an MJPEG AVI file.
//!
//! Layout written:
//!
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     avih                      main header (frame count patched on finish)
//!     LIST 'strl'
//!       strh 'vids' 'MJPG'      stream header
//!       strf                    BITMAPINFOHEADER
//!   LIST 'movi'
//!     00dc <jpeg> ...           one chunk per frame
//!   idx1                        keyframe index
//! ```
//!
//! The header block has a fixed size, so it is written as a placeholder when
//! the file is created and rewritten in place by [`AviWriter::finish`].
//!
//! A chunk that fails to write leaves the writer interrupted: it takes no
//! more frames, and `finish` writes the index over the partial chunk and
//! truncates the file there.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::codec::encode_jpeg;
use crate::error::RecordingError;

/// JPEG quality used for recorded frames.
pub const RECORDING_QUALITY: u8 = 90;

/// Bytes from the start of the file to the first byte after the 'movi' fourcc.
const HEADER_LEN: u64 = 224;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

/// `recording_<YYYYMMDD_HHMMSS>.avi` for the given instant.
pub fn recording_filename(now: DateTime<Local>) -> String {
    format!("recording_{}.avi", now.format("%Y%m%d_%H%M%S"))
}

/// Size of a finished file with `movi_len` bytes of chunks and `frames`
/// index entries.
fn finished_len(movi_len: u64, frames: usize) -> u64 {
    HEADER_LEN + movi_len + 8 + 16 * frames as u64
}

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct AviWriter {
    out: BufWriter<File>,
    path: PathBuf,
    fps: u32,
    quality: u8,
    /// Fixed by the first frame; later frames are scaled to match.
    size: Option<(u32, u32)>,
    fallback_size: (u32, u32),
    index: Vec<IndexEntry>,
    /// Bytes written after the 'movi' fourcc.
    movi_len: u64,
    max_chunk: u32,
    interrupted: bool,
}

impl AviWriter {
    /// Create the file and reserve space for the header.
    ///
    /// `width`/`height` are only used if the recording ends with no frames.
    pub fn create(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Self, RecordingError> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&[0u8; HEADER_LEN as usize])?;

        Ok(Self {
            out,
            path,
            fps: fps.max(1),
            quality: RECORDING_QUALITY,
            size: None,
            fallback_size: (width, height),
            index: Vec::new(),
            movi_len: 0,
            max_chunk: 0,
            interrupted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    pub fn write_frame(&mut self, image: &RgbImage) -> Result<(), RecordingError> {
        if self.interrupted {
            return Err(RecordingError::Interrupted);
        }
        let (width, height) = *self.size.get_or_insert(image.dimensions());
        let jpeg = if image.dimensions() == (width, height) {
            encode_jpeg(image, self.quality)?
        } else {
            let scaled = imageops::resize(image, width, height, FilterType::Triangle);
            encode_jpeg(&scaled, self.quality)?
        };

        let size = u32::try_from(jpeg.len()).map_err(|_| RecordingError::TooLarge)?;
        let padded = jpeg.len() as u64 + (jpeg.len() as u64 & 1);
        // Offsets in idx1 are relative to the 'movi' fourcc.
        let offset = 4 + self.movi_len;
        if finished_len(self.movi_len + 8 + padded, self.index.len() + 1) > u32::MAX as u64 {
            return Err(RecordingError::TooLarge);
        }

        if let Err(e) = self.write_chunk(size, &jpeg) {
            self.interrupted = true;
            return Err(e.into());
        }

        self.index.push(IndexEntry {
            offset: offset as u32,
            size,
        });
        self.movi_len += 8 + padded;
        self.max_chunk = self.max_chunk.max(size);
        Ok(())
    }

    fn write_chunk(&mut self, size: u32, jpeg: &[u8]) -> std::io::Result<()> {
        self.out.write_all(b"00dc")?;
        self.out.write_all(&size.to_le_bytes())?;
        self.out.write_all(jpeg)?;
        if jpeg.len() % 2 == 1 {
            self.out.write_all(&[0])?;
        }
        Ok(())
    }

    /// Write the index, patch the header and close the file.
    pub fn finish(mut self) -> Result<PathBuf, RecordingError> {
        let file_len = finished_len(self.movi_len, self.index.len());
        let file_len = u32::try_from(file_len).map_err(|_| RecordingError::TooLarge)?;

        // Lands after the last complete chunk, dropping any partial one.
        self.out.seek(SeekFrom::Start(HEADER_LEN + self.movi_len))?;
        self.out.write_all(b"idx1")?;
        self.out
            .write_all(&((self.index.len() * 16) as u32).to_le_bytes())?;
        for entry in &self.index {
            self.out.write_all(b"00dc")?;
            self.out.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            self.out.write_all(&entry.offset.to_le_bytes())?;
            self.out.write_all(&entry.size.to_le_bytes())?;
        }

        let header = self.header(file_len);
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&header)?;
        self.out.flush()?;
        self.out.get_ref().set_len(u64::from(file_len))?;
        self.out.get_ref().sync_all()?;
        Ok(self.path)
    }

    fn header(&self, file_len: u32) -> Vec<u8> {
        let (width, height) = self.size.unwrap_or(self.fallback_size);
        let frames = self.index.len() as u32;
        let micros_per_frame = 1_000_000 / self.fps;
        let max_bytes_per_sec = self.max_chunk.saturating_mul(self.fps);

        let mut h = HeaderBuf::with_capacity(HEADER_LEN as usize);
        h.fourcc(b"RIFF").u32(file_len - 8).fourcc(b"AVI ");

        h.fourcc(b"LIST").u32(192).fourcc(b"hdrl");
        h.fourcc(b"avih").u32(56);
        h.u32(micros_per_frame)
            .u32(max_bytes_per_sec)
            .u32(0)
            .u32(AVIF_HASINDEX)
            .u32(frames)
            .u32(0)
            .u32(1)
            .u32(self.max_chunk)
            .u32(width)
            .u32(height)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(0);

        h.fourcc(b"LIST").u32(116).fourcc(b"strl");
        h.fourcc(b"strh").u32(56);
        h.fourcc(b"vids")
            .fourcc(b"MJPG")
            .u32(0)
            .u16(0)
            .u16(0)
            .u32(0)
            .u32(1)
            .u32(self.fps)
            .u32(0)
            .u32(frames)
            .u32(self.max_chunk)
            .u32(u32::MAX)
            .u32(0)
            .u16(0)
            .u16(0)
            .u16(width as u16)
            .u16(height as u16);

        h.fourcc(b"strf").u32(40);
        h.u32(40)
            .u32(width)
            .u32(height)
            .u16(1)
            .u16(24)
            .fourcc(b"MJPG")
            .u32(width * height * 3)
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(0);

        h.fourcc(b"LIST").u32((4 + self.movi_len) as u32).fourcc(b"movi");
        debug_assert_eq!(h.0.len() as u64, HEADER_LEN);
        h.0
    }
}

struct HeaderBuf(Vec<u8>);

impl HeaderBuf {
    fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    fn fourcc(&mut self, code: &[u8; 4]) -> &mut Self {
        self.0.extend_from_slice(code);
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.0.extend_from_slice(&value.to_le_bytes());
        self
    }
}
