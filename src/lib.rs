//! autostereo turns grayscale depth maps into single-image autostereograms ("Magic Eye"
//! pictures), and can do the same for every frame of a video.
//!
//! # Pipeline overview
//!
//! 1. **Sample**: image file -> [`DepthMap`] ([`load_depth_map`])
//! 2. **Seed**: `depth_width / pattern_div` random columns -> [`SeedPattern`] ([`generate_pattern`])
//! 3. **Synthesize**: [`DepthMap`] + [`SeedPattern`] -> [`OutputImage`] ([`synthesize`])
//! 4. **Batch** (optional): a directory of frames, converted on a bounded worker pool
//!    ([`run_batch`])
//! 5. **Video** (optional): split with the system `ffmpeg`, batch, reassemble and re-attach
//!    audio ([`run_video_job`])
//!
//! Synthesis is a pure function over in-memory grids. Every output column `x >= P` copies the
//! column `x - P + depth / pattern_div` of the same row, so rows are independent and can be
//! filled in parallel. A shift that reaches the current column (or beyond) is reported as
//! [`StereoError::IndexOutOfRange`] unless [`ShiftPolicy::Clamp`] is selected.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod batch;
mod depth;
mod foundation;
mod media;
mod synth;

pub use batch::frames::{
    BatchOpts, BatchReport, FrameErrorPolicy, FrameFailure, FrameFile, collect_frames,
    convert_frame, frame_index_from_stem, output_path_for, run_batch, verify_frames,
};
pub use depth::sampler::{DepthChannel, decode_depth_map, load_depth_map};
pub use foundation::core::{
    DepthMap, Fps, FrameIndex, OutputImage, SeedPattern, ensure_parent_dir,
};
pub use foundation::error::{StereoError, StereoResult};
pub use media::ffmpeg::{
    EncodeConfig, FRAME_PATTERN, FfmpegEncoder, VideoSourceInfo, extract_audio, extract_frames,
    is_ffmpeg_on_path, is_ffprobe_on_path, probe_video,
};
pub use media::job::{VideoJobOpts, VideoJobReport, default_output_path, run_video_job};
pub use synth::pattern::{Rng64, generate_pattern};
pub use synth::stereogram::{
    ShiftPolicy, ShiftSign, SynthesisOpts, pattern_width, synthesize, synthesize_with_pattern,
};
