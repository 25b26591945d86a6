use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    depth::sampler::{DepthChannel, load_depth_map},
    foundation::{
        core::FrameIndex,
        error::{StereoError, StereoResult},
        threads::build_thread_pool,
    },
    synth::stereogram::{SynthesisOpts, synthesize},
};

/// What a batch does when a single frame fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameErrorPolicy {
    /// Stop and return the error of the lowest failing frame index.
    #[default]
    Abort,
    /// Record the failure in the report and keep going.
    Skip,
}

/// Options for converting a directory of depth frames.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchOpts {
    /// Per-frame synthesis options. `parallel_rows` is ignored; frames are the unit of work.
    pub synthesis: SynthesisOpts,
    /// Remap depth `v -> 255 - v` while loading each frame.
    pub invert_depth_on_load: bool,
    /// Channel used as depth.
    pub depth_channel: DepthChannel,
    /// Frame workers. `None` uses every core.
    pub threads: Option<usize>,
    /// Per-frame failure handling.
    pub on_error: FrameErrorPolicy,
    /// Input file extension, without the dot, matched case-insensitively.
    pub extension: String,
}

impl Default for BatchOpts {
    fn default() -> Self {
        Self {
            synthesis: SynthesisOpts::default(),
            invert_depth_on_load: false,
            depth_channel: DepthChannel::default(),
            threads: None,
            on_error: FrameErrorPolicy::Abort,
            extension: "png".to_string(),
        }
    }
}

impl BatchOpts {
    /// Reject option combinations that cannot be run.
    pub fn validate(&self) -> StereoResult<()> {
        self.synthesis.validate()?;
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(StereoError::validation("batch 'threads' must be >= 1 when set"));
        }
        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(StereoError::validation(format!(
                "batch extension must be a bare extension like 'png' (got '{}')",
                self.extension
            )));
        }
        Ok(())
    }

    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_json_path(path: &Path) -> StereoResult<Self> {
        let f =
            File::open(path).with_context(|| format!("open batch options '{}'", path.display()))?;
        let opts: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| StereoError::validation(format!("parse batch options JSON: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }
}

/// One input frame and its position in the sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameFile {
    /// Position in the sequence.
    pub index: FrameIndex,
    /// Source depth image.
    pub path: PathBuf,
}

/// A frame that failed under [`FrameErrorPolicy::Skip`].
#[derive(Clone, Debug)]
pub struct FrameFailure {
    /// Position in the sequence.
    pub index: FrameIndex,
    /// Source depth image.
    pub path: PathBuf,
    /// Rendered error message.
    pub error: String,
}

/// Result of [`run_batch`]. Both lists are ordered by frame index.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    /// Converted frames and their output paths.
    pub written: Vec<(FrameIndex, PathBuf)>,
    /// Frames skipped after an error.
    pub failed: Vec<FrameFailure>,
}

impl BatchReport {
    /// Written output paths in frame order.
    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.written.iter().map(|(_, p)| p.clone()).collect()
    }
}

/// Trailing decimal digits of a file stem, e.g. `frame_0042` -> 42.
pub fn frame_index_from_stem(stem: &str) -> Option<u64> {
    let digits = stem
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    stem[stem.len() - digits..].parse().ok()
}

/// List frame files in `dir` with the given extension, ordered by frame index.
///
/// When every file name ends in a distinct number, that number is the frame index. Otherwise
/// files are ordered by name and numbered from zero.
pub fn collect_frames(dir: &Path, extension: &str) -> StereoResult<Vec<FrameFile>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read frame dir '{}'", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read frame dir '{}'", dir.display()))?;
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    reject_duplicate_stems(&paths)?;

    let numbered: Option<Vec<u64>> = paths
        .iter()
        .map(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .and_then(frame_index_from_stem)
        })
        .collect();

    let mut frames: Vec<FrameFile> = match numbered {
        Some(indices) if all_distinct(&indices) => paths
            .into_iter()
            .zip(indices)
            .map(|(path, i)| FrameFile {
                index: FrameIndex(i),
                path,
            })
            .collect(),
        _ => paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| FrameFile {
                index: FrameIndex(i as u64),
                path,
            })
            .collect(),
    };
    frames.sort_by_key(|f| f.index);
    Ok(frames)
}

/// Outputs are named by stem, so `a.png` and `a.PNG` would overwrite each other.
fn reject_duplicate_stems(paths: &[PathBuf]) -> StereoResult<()> {
    let mut seen = std::collections::HashMap::new();
    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(prev) = seen.insert(stem, path) {
            return Err(StereoError::validation(format!(
                "frames '{}' and '{}' would write the same output file",
                prev.display(),
                path.display()
            )));
        }
    }
    Ok(())
}

fn all_distinct(indices: &[u64]) -> bool {
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).all(|w| w[0] != w[1])
}

/// Output path for `frame` inside `out_dir`: same stem, `.png` extension.
pub fn output_path_for(frame: &FrameFile, out_dir: &Path) -> PathBuf {
    let stem = frame
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("frame_{:06}", frame.index.0));
    out_dir.join(format!("{stem}.png"))
}

/// Load, synthesize and save a single frame.
pub fn convert_frame(frame: &FrameFile, out_dir: &Path, opts: &BatchOpts) -> StereoResult<PathBuf> {
    let depth = load_depth_map(&frame.path, opts.invert_depth_on_load, opts.depth_channel)?;
    let out = synthesize(&depth, &opts.synthesis)?;
    let out_path = output_path_for(frame, out_dir);
    out.save_png(&out_path)?;
    tracing::debug!(frame = frame.index.0, out = %out_path.display(), "frame converted");
    Ok(out_path)
}

/// Convert every frame in `in_dir` into an autostereogram in `out_dir`.
///
/// Frames run concurrently on a bounded rayon pool; the report is re-sorted by frame index.
#[tracing::instrument(skip(in_dir, out_dir, opts), fields(in_dir = %in_dir.display(), out_dir = %out_dir.display()))]
pub fn run_batch(in_dir: &Path, out_dir: &Path, opts: &BatchOpts) -> StereoResult<BatchReport> {
    opts.validate()?;

    let frames = collect_frames(in_dir, &opts.extension)?;
    if frames.is_empty() {
        return Err(StereoError::validation(format!(
            "no '.{}' frames found in '{}'",
            opts.extension,
            in_dir.display()
        )));
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir '{}'", out_dir.display()))?;

    let mut frame_opts = opts.clone();
    frame_opts.synthesis.parallel_rows = false;

    let pool = build_thread_pool(opts.threads)?;
    tracing::info!(
        frames = frames.len(),
        threads = pool.current_num_threads(),
        "converting frames"
    );

    let mut results: Vec<(FrameIndex, PathBuf, StereoResult<PathBuf>)> = pool.install(|| {
        frames
            .par_iter()
            .map(|f| (f.index, f.path.clone(), convert_frame(f, out_dir, &frame_opts)))
            .collect()
    });
    results.sort_by_key(|(index, _, _)| *index);

    let mut report = BatchReport::default();
    for (index, path, result) in results {
        match result {
            Ok(out) => report.written.push((index, out)),
            Err(e) => match opts.on_error {
                FrameErrorPolicy::Abort => return Err(e),
                FrameErrorPolicy::Skip => {
                    tracing::warn!(frame = index.0, path = %path.display(), error = %e, "skipping frame");
                    report.failed.push(FrameFailure {
                        index,
                        path,
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    tracing::info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    Ok(report)
}

/// Keep only the outputs that decode as images, in their given order.
pub fn verify_frames(paths: &[PathBuf]) -> StereoResult<Vec<PathBuf>> {
    let mut valid = Vec::with_capacity(paths.len());
    for path in paths {
        match image::open(path) {
            Ok(_) => valid.push(path.clone()),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "invalid frame file"),
        }
    }
    if valid.is_empty() {
        return Err(StereoError::validation(
            "no valid frame files found to assemble",
        ));
    }
    Ok(valid)
}

#[cfg(test)]
#[path = "../../tests/unit/batch/frames.rs"]
mod tests;
