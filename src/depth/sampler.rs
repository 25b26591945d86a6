use std::path::Path;

use crate::foundation::{
    core::DepthMap,
    error::{StereoError, StereoResult},
};

/// Which channel of the decoded source becomes the depth sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthChannel {
    /// Convert to RGB8 and take the red channel. For grayscale sources this is the gray value.
    #[default]
    FirstOfRgb,
    /// Convert to 8-bit luma.
    Luma,
}

impl DepthMap {
    /// Extract a depth map from an already decoded image.
    ///
    /// With `invert`, every RGB sample is remapped to `255 - v` before the channel is taken.
    pub fn from_dynamic_image(
        img: &image::DynamicImage,
        invert: bool,
        channel: DepthChannel,
    ) -> StereoResult<Self> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(StereoError::invalid_image(format!(
                "depth source has zero size ({width}x{height})"
            )));
        }

        let mut rgb = img.to_rgb8();
        if invert {
            for v in rgb.iter_mut() {
                *v = 255 - *v;
            }
        }

        let data = match channel {
            DepthChannel::FirstOfRgb => rgb.pixels().map(|px| px.0[0]).collect(),
            DepthChannel::Luma => image::DynamicImage::ImageRgb8(rgb).into_luma8().into_raw(),
        };
        Self::new(width, height, data)
    }

    /// Use an 8-bit grayscale buffer as-is.
    pub fn from_gray(img: &image::GrayImage) -> StereoResult<Self> {
        Self::new(img.width(), img.height(), img.as_raw().clone())
    }
}

/// Decode encoded image bytes (PNG, JPEG, ...) into a depth map.
pub fn decode_depth_map(
    bytes: &[u8],
    invert: bool,
    channel: DepthChannel,
) -> StereoResult<DepthMap> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| StereoError::invalid_image(format!("decode depth map: {e}")))?;
    DepthMap::from_dynamic_image(&img, invert, channel)
}

/// Read and decode a depth map from disk. Output dimensions equal the source dimensions.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_depth_map(path: &Path, invert: bool, channel: DepthChannel) -> StereoResult<DepthMap> {
    let bytes = std::fs::read(path).map_err(|e| {
        StereoError::invalid_image(format!("read depth map '{}': {e}", path.display()))
    })?;
    let depth = decode_depth_map(&bytes, invert, channel).map_err(|e| match e {
        StereoError::InvalidImage(msg) => {
            StereoError::invalid_image(format!("'{}': {msg}", path.display()))
        }
        other => other,
    })?;
    tracing::debug!(width = depth.width, height = depth.height, "depth map loaded");
    Ok(depth)
}

#[cfg(test)]
#[path = "../../tests/unit/depth/sampler.rs"]
mod tests;
