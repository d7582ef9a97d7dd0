//! Frame sources for the capture task.
//!
//! The live sensor driver is an external collaborator; what ships here is
//! a recorded-clip playback source and a synthetic generator, both behind
//! the same tagged variant so the pipeline never cares which one feeds it.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{bail, Context, Result};
use bytes::Bytes;

use volucast_depth::{Calibration, Intrinsics};

/// Packed color pixels as the color codec expects them; opaque to the
/// rest of the pipeline.
#[derive(Debug, Clone)]
pub struct ColorImage {
    pub width: usize,
    pub height: usize,
    pub data: Bytes,
}

/// One inertial sample captured alongside a frame.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

/// One captured sensor frame.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    pub color: ColorImage,
    pub depth: Vec<i16>,
    pub imu: Option<ImuSample>,
}

/// Where frames come from.
pub enum CaptureSource {
    /// Replays a recorded clip file.
    Playback(PlaybackSource),
    /// Generates a moving test scene.
    Synthetic(SyntheticSource),
}

impl CaptureSource {
    pub fn calibration(&self) -> Calibration {
        match self {
            CaptureSource::Playback(source) => source.calibration,
            CaptureSource::Synthetic(source) => source.calibration,
        }
    }

    /// The next frame, or `None` when the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<SensorFrame>> {
        match self {
            CaptureSource::Playback(source) => source.next_frame(),
            CaptureSource::Synthetic(source) => Ok(Some(source.next_frame())),
        }
    }
}

/// Magic prefix of recorded clip files.
const CLIP_MAGIC: &[u8; 4] = b"VCLP";

fn read_u16(reader: &mut impl Read) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32(reader: &mut impl Read) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Replays clips recorded from a live sensor.
///
/// File layout (little-endian): `"VCLP"`, width: u16, height: u16,
/// fx/fy/cx/cy/color_camera_x: f32, then per frame a u32-prefixed color
/// payload and a u32-prefixed depth payload (`2 * width * height` bytes
/// of i16 samples), until end of file.
pub struct PlaybackSource {
    reader: BufReader<File>,
    calibration: Calibration,
    frames_start: u64,
    looped: bool,
}

impl PlaybackSource {
    pub fn open(path: &Path, looped: bool) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open clip {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).context("clip header")?;
        if &magic != CLIP_MAGIC {
            bail!("{} is not a recorded clip", path.display());
        }

        let width = read_u16(&mut reader)? as usize;
        let height = read_u16(&mut reader)? as usize;
        let fx = read_f32(&mut reader)?;
        let fy = read_f32(&mut reader)?;
        let cx = read_f32(&mut reader)?;
        let cy = read_f32(&mut reader)?;
        let color_camera_x = read_f32(&mut reader)?;
        let frames_start = reader.stream_position()?;

        Ok(Self {
            reader,
            calibration: Calibration {
                width,
                height,
                depth_intrinsics: Intrinsics { fx, fy, cx, cy },
                color_camera_x,
            },
            frames_start,
            looped,
        })
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn next_frame(&mut self) -> Result<Option<SensorFrame>> {
        let color_size = match read_u32(&mut self.reader) {
            Ok(size) => size as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                if !self.looped {
                    return Ok(None);
                }
                self.reader.seek(SeekFrom::Start(self.frames_start))?;
                read_u32(&mut self.reader).context("clip is empty")? as usize
            }
            Err(e) => return Err(e.into()),
        };

        let mut color = vec![0u8; color_size];
        self.reader.read_exact(&mut color).context("clip color payload")?;

        let depth_size = read_u32(&mut self.reader)? as usize;
        let num_pixels = self.calibration.width * self.calibration.height;
        if depth_size != num_pixels * 2 {
            bail!(
                "clip depth payload is {depth_size} bytes, expected {}",
                num_pixels * 2
            );
        }
        let mut depth_bytes = vec![0u8; depth_size];
        self.reader
            .read_exact(&mut depth_bytes)
            .context("clip depth payload")?;
        let depth = depth_bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();

        Ok(Some(SensorFrame {
            color: ColorImage {
                width: self.calibration.width,
                height: self.calibration.height,
                data: Bytes::from(color),
            },
            depth,
            imu: None,
        }))
    }
}

/// Deterministic test scene: a flat back wall with a block sweeping
/// across it, plus a slow color gradient.
pub struct SyntheticSource {
    calibration: Calibration,
    tick: u64,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            calibration: Calibration {
                width,
                height,
                depth_intrinsics: Intrinsics {
                    fx: 500.0,
                    fy: 500.0,
                    cx: width as f32 / 2.0,
                    cy: height as f32 / 2.0,
                },
                color_camera_x: 50.0,
            },
            tick: 0,
        }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn next_frame(&mut self) -> SensorFrame {
        let width = self.calibration.width;
        let height = self.calibration.height;
        let block_left = (self.tick as usize * 3) % width;
        let block_right = (block_left + width / 8).min(width);

        let mut depth = vec![2000i16; width * height];
        for j in height / 4..height * 3 / 4 {
            for i in block_left..block_right {
                depth[i + j * width] = 900;
            }
        }

        let mut color = vec![0u8; width * height * 3];
        for j in 0..height {
            for i in 0..width {
                let at = (i + j * width) * 3;
                color[at] = ((i + self.tick as usize) % 256) as u8;
                color[at + 1] = (j % 256) as u8;
                color[at + 2] = ((self.tick / 4) % 256) as u8;
            }
        }

        self.tick += 1;
        SensorFrame {
            color: ColorImage {
                width,
                height,
                data: Bytes::from(color),
            },
            depth,
            imu: Some(ImuSample {
                accel: [0.0, -9.81, 0.0],
                gyro: [0.0; 3],
            }),
        }
    }
}
