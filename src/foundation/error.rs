/// Convenience result type used across autostereo.
pub type StereoResult<T> = Result<T, StereoError>;

/// Top-level error taxonomy used by the synthesis, batch and media APIs.
///
/// None of these are retried: each one means the input or the configuration is wrong for the
/// image (or frame) at hand, and synthesis produces no partial output when it fails.
#[derive(thiserror::Error, Debug)]
pub enum StereoError {
    /// The depth source could not be read or decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// `depth_width / pattern_div` is less than one column (or `pattern_div` is zero).
    #[error(
        "degenerate pattern: depth map width {width} with pattern_div {pattern_div} leaves no seed columns"
    )]
    DegeneratePattern {
        /// Depth map width in pixels.
        width: u32,
        /// Requested pattern divisor.
        pattern_div: u32,
    },

    /// A shifted source column fell outside the already-computed region of its row.
    #[error(
        "index out of range: pixel ({x}, {y}) resolves to source column {source_x}, allowed range is [0, {x}) of width {width}"
    )]
    IndexOutOfRange {
        /// Column being written.
        x: u32,
        /// Row being written.
        y: u32,
        /// Column the shift rule resolved to.
        source_x: i64,
        /// Output width.
        width: u32,
    },

    /// Invalid user-provided options or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failures reported by the external `ffmpeg`/`ffprobe` tools.
    #[error("media error: {0}")]
    Media(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StereoError {
    /// Build a [`StereoError::InvalidImage`] value.
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Build a [`StereoError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StereoError::Media`] value.
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
