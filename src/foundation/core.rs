use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{StereoError, StereoResult};

/// Zero-based position of a frame inside a video or frame sequence.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Rational frame rate as reported by ffprobe (`r_frame_rate`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator.
    pub num: u32,
    /// Denominator, always > 0.
    pub den: u32,
}

impl Fps {
    /// Build a frame rate, rejecting zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> StereoResult<Self> {
        if den == 0 {
            return Err(StereoError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(StereoError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// `num/den` form accepted by ffmpeg's `-framerate`/`-r`.
    pub fn to_ffmpeg_rate(self) -> String {
        format!("{}/{}", self.num, self.den)
    }
}

fn check_plane(width: u32, height: u32, len: usize, what: &str) -> StereoResult<()> {
    if width == 0 || height == 0 {
        return Err(StereoError::validation(format!(
            "{what} width/height must be non-zero (got {width}x{height})"
        )));
    }
    let expected = (width as usize) * (height as usize);
    if len != expected {
        return Err(StereoError::validation(format!(
            "{what} data length {len} does not match {width}x{height}"
        )));
    }
    Ok(())
}

/// Per-pixel depth samples in `[0, 255]`, row-major. Higher means closer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthMap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height` samples, row-major.
    pub data: Vec<u8>,
}

impl DepthMap {
    /// Wrap an existing row-major buffer.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> StereoResult<Self> {
        check_plane(width, height, data.len(), "depth map")?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A depth map where every sample is `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> StereoResult<Self> {
        Self::new(width, height, vec![value; (width as usize) * (height as usize)])
    }

    /// Re-check the size invariant, for values assembled through the public fields.
    pub fn validate(&self) -> StereoResult<()> {
        check_plane(self.width, self.height, self.data.len(), "depth map")
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Samples of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let w = self.width as usize;
        let start = (y as usize) * w;
        &self.data[start..start + w]
    }

    /// Copy with every sample remapped to `255 - v`.
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| 255 - v).collect(),
        }
    }
}

/// Random seed strip copied into the leftmost columns of every output row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedPattern {
    /// Pattern width (`P`).
    pub width: u32,
    /// Pattern height, equal to the depth map height.
    pub height: u32,
    /// `width * height` intensities, row-major.
    pub data: Vec<u8>,
}

impl SeedPattern {
    /// Wrap an existing row-major buffer.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> StereoResult<Self> {
        check_plane(width, height, data.len(), "seed pattern")?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Re-check the size invariant, for values assembled through the public fields.
    pub fn validate(&self) -> StereoResult<()> {
        check_plane(self.width, self.height, self.data.len(), "seed pattern")
    }

    /// Intensity at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Intensities of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let w = self.width as usize;
        let start = (y as usize) * w;
        &self.data[start..start + w]
    }
}

/// Single-channel autostereogram, same size as the depth map it was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height` intensities, row-major.
    pub data: Vec<u8>,
}

impl OutputImage {
    pub(crate) fn from_rows(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize));
        Self {
            width,
            height,
            data,
        }
    }

    /// Intensity at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Intensities of row `y`.
    pub fn row(&self, y: u32) -> &[u8] {
        let w = self.width as usize;
        let start = (y as usize) * w;
        &self.data[start..start + w]
    }

    /// Re-check the size invariant, for values assembled through the public fields.
    pub fn validate(&self) -> StereoResult<()> {
        check_plane(self.width, self.height, self.data.len(), "output image")
    }

    /// Convert into an `image` grayscale buffer.
    pub fn to_gray_image(&self) -> StereoResult<image::GrayImage> {
        image::GrayImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            StereoError::validation("output buffer does not match its width/height")
        })
    }

    /// Write as an 8-bit grayscale PNG, creating the parent directory if needed.
    pub fn save_png(&self, path: &Path) -> StereoResult<()> {
        self.validate()?;
        ensure_parent_dir(path)?;
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ColorType::L8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> StereoResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
