use std::{borrow::Cow, fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    foundation::{
        core::{DepthMap, OutputImage, SeedPattern},
        error::{StereoError, StereoResult},
        threads::build_thread_pool,
    },
    synth::pattern::generate_pattern,
};

/// What to do when the shift rule points outside `[0, x)` for the column `x` being written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftPolicy {
    /// Fail with [`StereoError::IndexOutOfRange`].
    #[default]
    Strict,
    /// Clamp the source column into `[0, x - 1]`.
    Clamp,
}

/// Direction in which depth moves the source column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSign {
    /// `source_x = x - P + shift`
    #[default]
    Forward,
    /// `source_x = x - P - shift`
    Reverse,
}

/// Knobs for one synthesis pass.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SynthesisOpts {
    /// Seed strip is `depth_width / pattern_div` columns wide, and shifts are
    /// `depth / pattern_div`. Must be >= 1.
    pub pattern_div: u32,
    /// Out-of-range source column handling.
    pub shift_policy: ShiftPolicy,
    /// Shift direction.
    pub shift_sign: ShiftSign,
    /// Remap depth `v -> 255 - v` before synthesis.
    pub invert_depth: bool,
    /// Seed for the pattern generator. `None` means non-reproducible output.
    pub seed: Option<u64>,
    /// Fill rows on a rayon pool instead of sequentially.
    pub parallel_rows: bool,
    /// Worker count for `parallel_rows`. `None` uses every core.
    pub threads: Option<usize>,
}

impl Default for SynthesisOpts {
    fn default() -> Self {
        Self {
            pattern_div: Self::DEFAULT_PATTERN_DIV,
            shift_policy: ShiftPolicy::Strict,
            shift_sign: ShiftSign::Forward,
            invert_depth: false,
            seed: None,
            parallel_rows: false,
            threads: None,
        }
    }
}

impl SynthesisOpts {
    /// Pattern divisor used by the single-image generator.
    pub const DEFAULT_PATTERN_DIV: u32 = 8;

    /// Reject option combinations that cannot be run.
    ///
    /// `pattern_div` is checked against the depth width at synthesis time, where it surfaces as
    /// [`StereoError::DegeneratePattern`].
    pub fn validate(&self) -> StereoResult<()> {
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(StereoError::validation(
                "synthesis 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }

    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn from_json_path(path: &Path) -> StereoResult<Self> {
        let f = File::open(path)
            .with_context(|| format!("open synthesis options '{}'", path.display()))?;
        let opts: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| StereoError::validation(format!("parse synthesis options JSON: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }
}

/// Seed strip width `P` for a depth map of `depth_width` columns.
pub fn pattern_width(depth_width: u32, pattern_div: u32) -> StereoResult<u32> {
    let degenerate = StereoError::DegeneratePattern {
        width: depth_width,
        pattern_div,
    };
    if pattern_div == 0 {
        return Err(degenerate);
    }
    match depth_width / pattern_div {
        0 => Err(degenerate),
        p => Ok(p),
    }
}

/// Build an autostereogram from `depth` using a freshly generated seed strip.
#[tracing::instrument(
    skip(depth, opts),
    fields(width = depth.width, height = depth.height, pattern_div = opts.pattern_div)
)]
pub fn synthesize(depth: &DepthMap, opts: &SynthesisOpts) -> StereoResult<OutputImage> {
    depth.validate()?;
    let p = pattern_width(depth.width, opts.pattern_div)?;
    let pattern = generate_pattern(p, depth.height, opts.seed)?;
    synthesize_with_pattern(depth, &pattern, opts)
}

/// Build an autostereogram from `depth` using a caller-supplied seed strip.
///
/// The strip must be exactly `P x height`, where `P = depth.width / opts.pattern_div`.
/// Output columns `[0, P)` copy the strip; every later column copies an earlier column of the
/// same row, chosen by the depth-derived shift. Either the whole image is produced or an error
/// is returned.
pub fn synthesize_with_pattern(
    depth: &DepthMap,
    pattern: &SeedPattern,
    opts: &SynthesisOpts,
) -> StereoResult<OutputImage> {
    opts.validate()?;
    depth.validate()?;
    pattern.validate()?;
    let p = pattern_width(depth.width, opts.pattern_div)?;
    if pattern.width != p || pattern.height != depth.height {
        return Err(StereoError::validation(format!(
            "seed pattern is {}x{}, expected {}x{}",
            pattern.width, pattern.height, p, depth.height
        )));
    }

    let depth = if opts.invert_depth {
        Cow::Owned(depth.inverted())
    } else {
        Cow::Borrowed(depth)
    };

    let rules = RowRules {
        pattern_div: opts.pattern_div,
        policy: opts.shift_policy,
        sign: opts.shift_sign,
    };
    let w = depth.width as usize;
    let mut out = vec![0u8; w * depth.height as usize];

    if opts.parallel_rows {
        let pool = build_thread_pool(opts.threads)?;
        let results: Vec<StereoResult<()>> = pool.install(|| {
            out.par_chunks_mut(w)
                .enumerate()
                .map(|(y, row)| {
                    let y = y as u32;
                    fill_row(row, y, depth.row(y), pattern.row(y), rules)
                })
                .collect()
        });
        // First failing row wins so errors do not depend on scheduling.
        for r in results {
            r?;
        }
    } else {
        for (y, row) in out.chunks_mut(w).enumerate() {
            let y = y as u32;
            fill_row(row, y, depth.row(y), pattern.row(y), rules)?;
        }
    }

    tracing::debug!(pattern_width = p, "stereogram synthesized");
    Ok(OutputImage::from_rows(depth.width, depth.height, out))
}

#[derive(Clone, Copy, Debug)]
struct RowRules {
    pattern_div: u32,
    policy: ShiftPolicy,
    sign: ShiftSign,
}

fn fill_row(
    row: &mut [u8],
    y: u32,
    depth_row: &[u8],
    seed_row: &[u8],
    rules: RowRules,
) -> StereoResult<()> {
    let p = seed_row.len();
    row[..p].copy_from_slice(seed_row);

    for x in p..row.len() {
        let shift = i64::from(depth_row[x]) / i64::from(rules.pattern_div);
        let raw = match rules.sign {
            ShiftSign::Forward => x as i64 - p as i64 + shift,
            ShiftSign::Reverse => x as i64 - p as i64 - shift,
        };
        let source_x = resolve_source_column(x as i64, raw, rules.policy).ok_or(
            StereoError::IndexOutOfRange {
                x: x as u32,
                y,
                source_x: raw,
                width: row.len() as u32,
            },
        )?;
        row[x] = row[source_x];
    }
    Ok(())
}

fn resolve_source_column(x: i64, raw: i64, policy: ShiftPolicy) -> Option<usize> {
    if (0..x).contains(&raw) {
        return Some(raw as usize);
    }
    match policy {
        ShiftPolicy::Strict => None,
        ShiftPolicy::Clamp => Some(raw.clamp(0, x - 1) as usize),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/synth/stereogram.rs"]
mod tests;
