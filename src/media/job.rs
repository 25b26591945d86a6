use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    batch::frames::{BatchOpts, FrameFailure, run_batch},
    foundation::{
        core::OutputImage,
        error::{StereoError, StereoResult},
    },
    media::ffmpeg::{
        EncodeConfig, FfmpegEncoder, VideoSourceInfo, extract_audio, extract_frames,
        is_ffmpeg_on_path, is_ffprobe_on_path, probe_video,
    },
    synth::stereogram::SynthesisOpts,
};

/// Options for converting a whole video into a stereogram video.
#[derive(Clone, Debug)]
pub struct VideoJobOpts {
    /// Source video. Its frames are used as depth maps.
    pub input: PathBuf,
    /// Destination MP4. `None` writes `<stem>_final_output.mp4` next to the input.
    pub output: Option<PathBuf>,
    /// Parent directory for intermediate files. `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Per-frame conversion options.
    pub batch: BatchOpts,
    /// Extract frames as 8-bit gray instead of RGB.
    pub grayscale: bool,
    /// Carry the source audio track over to the output.
    pub split_audio: bool,
    /// Leave extracted frames, converted frames and audio on disk.
    pub keep_intermediate: bool,
    /// Replace an existing output file.
    pub overwrite: bool,
}

impl VideoJobOpts {
    /// Pattern divisor used for video frames unless overridden.
    pub const DEFAULT_PATTERN_DIV: u32 = 15;

    /// Defaults for converting `input`.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            work_dir: None,
            batch: BatchOpts {
                synthesis: SynthesisOpts {
                    pattern_div: Self::DEFAULT_PATTERN_DIV,
                    ..SynthesisOpts::default()
                },
                ..BatchOpts::default()
            },
            grayscale: false,
            split_audio: true,
            keep_intermediate: false,
            overwrite: true,
        }
    }

    /// Resolved output path.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }
}

/// What [`run_video_job`] produced.
#[derive(Clone, Debug)]
pub struct VideoJobReport {
    /// Written MP4.
    pub output: PathBuf,
    /// Frames extracted from the source.
    pub frames_total: usize,
    /// Frames that made it into the output.
    pub frames_encoded: u64,
    /// Frames dropped under [`crate::FrameErrorPolicy::Skip`].
    pub failed: Vec<FrameFailure>,
    /// Whether the source audio was muxed in.
    pub audio_muxed: bool,
    /// Intermediate directory, if it was kept.
    pub kept_work_dir: Option<PathBuf>,
}

/// `<dir>/<stem>_final_output.mp4` for an input `<dir>/<stem>.<ext>`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{stem}_final_output.mp4"))
}

/// Removes the job directory on drop. Disarmed when intermediates are kept.
struct WorkDirGuard(Option<PathBuf>);

impl WorkDirGuard {
    fn new(dir: &Path, keep: bool) -> Self {
        Self((!keep).then(|| dir.to_path_buf()))
    }
}

impl Drop for WorkDirGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => tracing::debug!(dir = %path.display(), "removed intermediate files"),
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "failed to remove intermediate files")
                }
            }
        }
    }
}

fn create_job_dir(root: Option<&Path>) -> StereoResult<PathBuf> {
    let root = root.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = root.join(format!("autostereo-job-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create work dir '{}'", dir.display()))?;
    Ok(dir)
}

/// Probe, split, convert every frame, reassemble and re-attach audio.
///
/// Frames are encoded in frame-index order so audio stays in sync. Intermediate files live in a
/// fresh job directory that is removed afterwards (also on failure) unless
/// `keep_intermediate` is set.
#[tracing::instrument(skip(opts), fields(input = %opts.input.display()))]
pub fn run_video_job(opts: &VideoJobOpts) -> StereoResult<VideoJobReport> {
    if !opts.input.is_file() {
        return Err(StereoError::validation(format!(
            "input video '{}' does not exist",
            opts.input.display()
        )));
    }
    opts.batch.validate()?;
    if !is_ffmpeg_on_path() || !is_ffprobe_on_path() {
        return Err(StereoError::media(
            "ffmpeg and ffprobe are required for video conversion, but were not found on PATH",
        ));
    }

    let info = probe_video(&opts.input)?;
    tracing::info!(
        width = info.width,
        height = info.height,
        fps = info.fps.as_f64(),
        has_audio = info.has_audio,
        "probed input"
    );

    run_in_work_dir(opts, &info)
}

/// Runs the conversion inside a fresh job directory that is removed on drop unless
/// `keep_intermediate` is set, whether the job succeeds or not.
fn run_in_work_dir(opts: &VideoJobOpts, info: &VideoSourceInfo) -> StereoResult<VideoJobReport> {
    let job_dir = create_job_dir(opts.work_dir.as_deref())?;
    let _guard = WorkDirGuard::new(&job_dir, opts.keep_intermediate);

    let result = convert_in_job_dir(opts, info, &job_dir);
    if opts.keep_intermediate {
        match &result {
            Ok(_) => tracing::info!(dir = %job_dir.display(), "intermediate files kept"),
            Err(e) => {
                tracing::error!(dir = %job_dir.display(), error = %e, "video job failed; intermediate files kept")
            }
        }
    }

    let mut report = result?;
    report.kept_work_dir = opts.keep_intermediate.then_some(job_dir);
    Ok(report)
}

fn convert_in_job_dir(
    opts: &VideoJobOpts,
    info: &VideoSourceInfo,
    job_dir: &Path,
) -> StereoResult<VideoJobReport> {
    let frames_in = job_dir.join("input");
    let frames_out = job_dir.join("output");

    let audio = if opts.split_audio && info.has_audio {
        let wav = job_dir.join("audio.wav");
        tracing::info!("extracting audio");
        extract_audio(&opts.input, &wav)?;
        Some(wav)
    } else {
        tracing::info!("skipping audio extraction");
        None
    };

    tracing::info!("extracting frames");
    extract_frames(&opts.input, &frames_in, opts.grayscale)?;

    let report = run_batch(&frames_in, &frames_out, &opts.batch)?;
    let frames_total = report.written.len() + report.failed.len();
    if !report.failed.is_empty() {
        tracing::warn!(
            failed = report.failed.len(),
            "some frames were dropped; output will be shorter than the source"
        );
    }

    let output = opts.output_path();
    tracing::info!(frames = report.written.len(), out = %output.display(), "assembling video");

    // Each frame is decoded once, lazily; undecodable outputs are skipped and the encoder is
    // sized from the first frame that decodes.
    let mut frames = report
        .written
        .iter()
        .filter_map(|(index, path)| match load_gray_frame(path) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!(frame = index.0, path = %path.display(), error = %e, "invalid frame file");
                None
            }
        });
    let first = frames
        .next()
        .ok_or_else(|| StereoError::validation("no valid frame files found to assemble"))?;
    let mut encoder = FfmpegEncoder::new(EncodeConfig {
        width: first.width,
        height: first.height,
        fps: info.fps,
        out_path: output.clone(),
        overwrite: opts.overwrite,
        audio: audio.clone(),
    })?;
    encoder.encode_frame(&first)?;
    for frame in frames {
        encoder.encode_frame(&frame)?;
    }
    let frames_encoded = encoder.finish()?;

    Ok(VideoJobReport {
        output,
        frames_total,
        frames_encoded,
        failed: report.failed,
        audio_muxed: audio.is_some(),
        kept_work_dir: None,
    })
}

fn load_gray_frame(path: &Path) -> StereoResult<OutputImage> {
    let img = image::open(path)
        .map_err(|e| StereoError::invalid_image(format!("'{}': {e}", path.display())))?
        .into_luma8();
    let (w, h) = img.dimensions();
    Ok(OutputImage::from_rows(w, h, img.into_raw()))
}

#[cfg(test)]
#[path = "../../tests/unit/media/job.rs"]
mod tests;
