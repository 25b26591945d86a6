use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::foundation::{
    core::{Fps, OutputImage, ensure_parent_dir},
    error::{StereoError, StereoResult},
};

/// What ffprobe reports about a source video.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSourceInfo {
    /// Probed file.
    pub source_path: PathBuf,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate of the first video stream.
    pub fps: Fps,
    /// Container duration, 0 when unknown.
    pub duration_sec: f64,
    /// Whether any audio stream is present.
    pub has_audio: bool,
}

fn tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether `ffmpeg` can be spawned.
pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

/// Whether `ffprobe` can be spawned.
pub fn is_ffprobe_on_path() -> bool {
    tool_on_path("ffprobe")
}

fn run_tool(cmd: &mut Command, what: &str) -> StereoResult<std::process::Output> {
    let out = cmd
        .output()
        .map_err(|e| StereoError::media(format!("failed to run {what}: {e}")))?;
    if !out.status.success() {
        return Err(StereoError::media(format!(
            "{what} exited with status {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(out)
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Probe dimensions, frame rate and audio presence of `source_path`.
#[tracing::instrument(skip(source_path), fields(source = %source_path.display()))]
pub fn probe_video(source_path: &Path) -> StereoResult<VideoSourceInfo> {
    let out = run_tool(
        Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(source_path),
        "ffprobe",
    )?;
    parse_probe_json(source_path, &out.stdout)
}

fn parse_probe_json(source_path: &Path, json: &[u8]) -> StereoResult<VideoSourceInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| StereoError::media(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| StereoError::media("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| StereoError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| StereoError::media("missing video height from ffprobe"))?;

    let (num, den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| StereoError::media("invalid video r_frame_rate"))?;
    let fps = Fps::new(num, den)
        .map_err(|e| StereoError::media(format!("unusable frame rate {num}/{den}: {e}")))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
        duration_sec,
        has_audio,
    })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

/// Name pattern of extracted frames inside the frames directory.
pub const FRAME_PATTERN: &str = "frame_%06d.png";

/// Decode every frame of `video` into `frames_dir` as numbered PNGs.
///
/// With `grayscale`, frames are written as 8-bit gray instead of RGB.
#[tracing::instrument(skip(video, frames_dir), fields(video = %video.display()))]
pub fn extract_frames(video: &Path, frames_dir: &Path, grayscale: bool) -> StereoResult<()> {
    std::fs::create_dir_all(frames_dir).map_err(|e| {
        StereoError::media(format!(
            "create frames dir '{}': {e}",
            frames_dir.display()
        ))
    })?;

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-y", "-i"])
        .arg(video)
        .arg("-pix_fmt")
        .arg(if grayscale { "gray" } else { "rgb24" })
        .arg(frames_dir.join(FRAME_PATTERN));
    run_tool(&mut cmd, "ffmpeg frame extraction")?;
    Ok(())
}

/// Copy the audio track of `video` into a PCM WAV file.
#[tracing::instrument(skip(video, wav_path), fields(video = %video.display()))]
pub fn extract_audio(video: &Path, wav_path: &Path) -> StereoResult<()> {
    ensure_parent_dir(wav_path)?;
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-y", "-i"])
        .arg(video)
        .args(["-vn", "-acodec", "pcm_s16le"])
        .arg(wav_path);
    run_tool(&mut cmd, "ffmpeg audio extraction")?;
    Ok(())
}

/// Settings for [`FfmpegEncoder`].
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
    /// Destination MP4.
    pub out_path: PathBuf,
    /// Replace an existing destination.
    pub overwrite: bool,
    /// Audio file muxed in as AAC. The output is cut to the shorter stream.
    pub audio: Option<PathBuf>,
}

impl EncodeConfig {
    /// Reject sizes and paths ffmpeg cannot be given.
    pub fn validate(&self) -> StereoResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StereoError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if let Some(audio) = &self.audio
            && !audio.is_file()
        {
            return Err(StereoError::validation(format!(
                "audio input '{}' does not exist",
                audio.display()
            )));
        }
        Ok(())
    }
}

/// Streams grayscale frames into a system `ffmpeg` process producing an H.264 MP4.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    frames: u64,
}

impl FfmpegEncoder {
    /// Spawn ffmpeg reading raw `gray` frames from stdin.
    pub fn new(cfg: EncodeConfig) -> StereoResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(StereoError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(StereoError::media(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "gray",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_ffmpeg_rate(),
            "-i",
            "pipe:0",
        ]);
        if let Some(audio) = &cfg.audio {
            cmd.arg("-i").arg(audio);
            cmd.args(["-map", "0:v:0", "-map", "1:a:0", "-c:a", "aac", "-shortest"]);
        } else {
            cmd.arg("-an");
        }
        // yuv420p needs even dimensions; pad odd ones by one pixel.
        cmd.args([
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            StereoError::media(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StereoError::media("failed to open ffmpeg stdin"))?;

        Ok(Self {
            cfg,
            child,
            stdin: Some(stdin),
            frames: 0,
        })
    }

    /// Append one frame. Frames must arrive in presentation order.
    pub fn encode_frame(&mut self, frame: &OutputImage) -> StereoResult<()> {
        frame.validate()?;
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(StereoError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(StereoError::media("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&frame.data).map_err(|e| {
            StereoError::media(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames += 1;
        Ok(())
    }

    /// Close stdin and wait for ffmpeg. Returns the number of frames written.
    pub fn finish(mut self) -> StereoResult<u64> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            StereoError::media(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StereoError::media(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(self.frames)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/ffmpeg.rs"]
mod tests;
