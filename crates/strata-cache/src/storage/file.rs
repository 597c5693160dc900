//! A single per-level cache file.
//!
//! Headerless interleaved little-endian `f32` frames, `channels` values per
//! frame. Frame `n` lives at byte `n * channels * 4`, so reserved ranges can
//! be written in any order and read back randomly.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const BYTES_PER_SAMPLE: usize = 4;

pub struct CacheFile {
    path: PathBuf,
    level: usize,
    channels: usize,
    rate: f64,
    file: Mutex<Option<NamedTempFile>>,
}

impl CacheFile {
    pub(crate) fn create(dir: &Path, level: usize, channels: usize, rate: f64) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(&format!("strata-l{level}-"))
            .suffix(".f32")
            .tempfile_in(dir)?;
        let path = file.path().to_path_buf();

        Ok(Self {
            path,
            level,
            channels,
            rate,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frame rate of the data stored in this file.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }

    /// Frames physically present on disk.
    pub fn frames_on_disk(&self) -> Result<u64> {
        let guard = self.file.lock();
        let Some(file) = &*guard else {
            return Err(self.closed());
        };
        let bytes = file.as_file().metadata()?.len();
        Ok(bytes / (self.channels * BYTES_PER_SAMPLE) as u64)
    }

    /// Write `len` frames taken from `data[channel][0..len]` at frame `offset`.
    pub fn write_frames(&self, offset: u64, data: &[Vec<f32>], len: usize) -> Result<()> {
        if data.len() < self.channels || data.iter().any(|c| c.len() < len) {
            return Err(Error::BufferTooSmall {
                channels: self.channels,
                frames: len,
            });
        }
        if len == 0 {
            return Ok(());
        }

        let mut bytes = Vec::with_capacity(len * self.channels * BYTES_PER_SAMPLE);
        for frame in 0..len {
            for channel in &data[..self.channels] {
                bytes.extend_from_slice(&channel[frame].to_le_bytes());
            }
        }

        let mut guard = self.file.lock();
        let Some(file) = &mut *guard else {
            return Err(self.closed());
        };
        let file = file.as_file_mut();
        file.seek(SeekFrom::Start(self.byte_offset(offset)))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Read `len` frames at frame `offset` into `out[channel][out_offset..]`.
    ///
    /// Frames past the end of the file read as silence.
    pub fn read_frames(
        &self,
        offset: u64,
        out: &mut [Vec<f32>],
        out_offset: usize,
        len: usize,
    ) -> Result<()> {
        if out.len() < self.channels || out.iter().any(|c| c.len() < out_offset + len) {
            return Err(Error::BufferTooSmall {
                channels: self.channels,
                frames: out_offset + len,
            });
        }
        if len == 0 {
            return Ok(());
        }

        let mut bytes = vec![0u8; len * self.channels * BYTES_PER_SAMPLE];
        {
            let mut guard = self.file.lock();
            let Some(file) = &mut *guard else {
                return Err(self.closed());
            };
            let file = file.as_file_mut();
            file.seek(SeekFrom::Start(self.byte_offset(offset)))?;
            read_available(file, &mut bytes)?;
        }

        for (frame, chunk) in bytes
            .chunks_exact(self.channels * BYTES_PER_SAMPLE)
            .enumerate()
        {
            for (channel, sample) in chunk.chunks_exact(BYTES_PER_SAMPLE).enumerate() {
                let value = f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
                out[channel][out_offset + frame] = value;
            }
        }
        Ok(())
    }

    /// Close and remove the file. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let Some(file) = self.file.lock().take() else {
            return Ok(());
        };
        file.close()?;
        Ok(())
    }

    fn byte_offset(&self, frame: u64) -> u64 {
        frame * (self.channels * BYTES_PER_SAMPLE) as u64
    }

    fn closed(&self) -> Error {
        Error::FileClosed(self.path.display().to_string())
    }
}

impl std::fmt::Debug for CacheFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFile")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("channels", &self.channels)
            .field("rate", &self.rate)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Fill `buf` from `reader`, leaving zeros where the file ends early.
fn read_available(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
