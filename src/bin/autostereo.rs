use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "autostereo", version, about = "Autostereogram (Magic Eye) generator")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a single depth map into a PNG autostereogram.
    Image(ImageArgs),
    /// Convert a directory of depth frames into a directory of autostereograms.
    Frames(FramesArgs),
    /// Convert a video into an autostereogram video (requires `ffmpeg` and `ffprobe` on PATH).
    Video(VideoArgs),
}

#[derive(Args, Debug)]
struct SynthArgs {
    /// Width of generated pattern (n means 1/n of the depth-map width).
    #[arg(short = 'p', long)]
    pattern_div: Option<u32>,

    /// Invert depth map (white = far).
    #[arg(short, long)]
    invert: bool,

    /// Seed for the random pattern, for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Clamp shifts that reach the current column instead of failing.
    #[arg(long)]
    clamp_shift: bool,

    /// Shift source columns further left for closer depth.
    #[arg(long)]
    reverse_shift: bool,

    /// Use luma instead of the first RGB channel as depth.
    #[arg(long)]
    luma: bool,

    /// Synthesis options JSON. Flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl SynthArgs {
    fn resolve(&self, default_pattern_div: u32) -> anyhow::Result<autostereo::SynthesisOpts> {
        let mut opts = match &self.config {
            Some(path) => autostereo::SynthesisOpts::from_json_path(path)?,
            None => autostereo::SynthesisOpts {
                pattern_div: default_pattern_div,
                ..autostereo::SynthesisOpts::default()
            },
        };
        if let Some(div) = self.pattern_div {
            opts.pattern_div = div;
        }
        if self.invert {
            opts.invert_depth = true;
        }
        if self.seed.is_some() {
            opts.seed = self.seed;
        }
        if self.clamp_shift {
            opts.shift_policy = autostereo::ShiftPolicy::Clamp;
        }
        if self.reverse_shift {
            opts.shift_sign = autostereo::ShiftSign::Reverse;
        }
        Ok(opts)
    }

    fn channel(&self) -> autostereo::DepthChannel {
        if self.luma {
            autostereo::DepthChannel::Luma
        } else {
            autostereo::DepthChannel::FirstOfRgb
        }
    }
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Path to grayscale depth map (white = close).
    depthmap: PathBuf,

    /// Path to write output image.
    #[arg(short, long, default_value = "output.png")]
    output: PathBuf,

    #[command(flatten)]
    synth: SynthArgs,

    /// Fill rows on a worker pool.
    #[arg(long)]
    parallel_rows: bool,

    /// Override worker threads (with --parallel-rows).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Args, Debug)]
struct FramesArgs {
    /// Directory of depth frames.
    #[arg(long = "in")]
    in_dir: PathBuf,

    /// Directory to write converted frames to.
    #[arg(long)]
    out: PathBuf,

    /// Input frame extension.
    #[arg(long, default_value = "png")]
    ext: String,

    #[command(flatten)]
    synth: SynthArgs,

    /// Override frame worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Report failing frames and keep going instead of aborting.
    #[arg(long)]
    skip_bad_frames: bool,
}

#[derive(Args, Debug)]
struct VideoArgs {
    /// Path to the input video file.
    input: PathBuf,

    /// Output MP4 path (default: `<input stem>_final_output.mp4` next to the input).
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    synth: SynthArgs,

    /// Convert frames to grayscale while extracting.
    #[arg(long)]
    grayscale: bool,

    /// Do not carry the source audio over.
    #[arg(long)]
    no_audio: bool,

    /// Keep extracted and converted frames.
    #[arg(long)]
    keep_intermediate: bool,

    /// Parent directory for intermediate files (default: system temp dir).
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Override frame worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Drop failing frames instead of aborting.
    #[arg(long)]
    skip_bad_frames: bool,

    /// Fail if the output file already exists.
    #[arg(long)]
    no_overwrite: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Command::Image(args) => cmd_image(args),
        Command::Frames(args) => cmd_frames(args),
        Command::Video(args) => cmd_video(args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn error_policy(skip: bool) -> autostereo::FrameErrorPolicy {
    if skip {
        autostereo::FrameErrorPolicy::Skip
    } else {
        autostereo::FrameErrorPolicy::Abort
    }
}

fn cmd_image(args: ImageArgs) -> anyhow::Result<()> {
    let mut opts = args
        .synth
        .resolve(autostereo::SynthesisOpts::DEFAULT_PATTERN_DIV)?;
    opts.parallel_rows |= args.parallel_rows;
    if args.threads.is_some() {
        opts.threads = args.threads;
    }

    let depth = autostereo::load_depth_map(&args.depthmap, false, args.synth.channel())?;
    let out = autostereo::synthesize(&depth, &opts)
        .with_context(|| format!("synthesize '{}'", args.depthmap.display()))?;
    out.save_png(&args.output)?;

    eprintln!("wrote {}", args.output.display());
    Ok(())
}

fn cmd_frames(args: FramesArgs) -> anyhow::Result<()> {
    let opts = autostereo::BatchOpts {
        synthesis: args
            .synth
            .resolve(autostereo::SynthesisOpts::DEFAULT_PATTERN_DIV)?,
        depth_channel: args.synth.channel(),
        threads: args.threads,
        on_error: error_policy(args.skip_bad_frames),
        extension: args.ext,
        ..autostereo::BatchOpts::default()
    };

    let report = autostereo::run_batch(&args.in_dir, &args.out, &opts)?;
    for failure in &report.failed {
        eprintln!(
            "skipped frame {} ({}): {}",
            failure.index.0,
            failure.path.display(),
            failure.error
        );
    }

    eprintln!(
        "wrote {} frames to {}",
        report.written.len(),
        args.out.display()
    );
    Ok(())
}

fn cmd_video(args: VideoArgs) -> anyhow::Result<()> {
    let mut opts = autostereo::VideoJobOpts::new(&args.input);
    opts.output = args.output;
    opts.work_dir = args.work_dir;
    opts.grayscale = args.grayscale;
    opts.split_audio = !args.no_audio;
    opts.keep_intermediate = args.keep_intermediate;
    opts.overwrite = !args.no_overwrite;
    opts.batch.synthesis = args
        .synth
        .resolve(autostereo::VideoJobOpts::DEFAULT_PATTERN_DIV)?;
    opts.batch.depth_channel = args.synth.channel();
    opts.batch.threads = args.threads;
    opts.batch.on_error = error_policy(args.skip_bad_frames);

    let report = autostereo::run_video_job(&opts)
        .with_context(|| format!("convert video '{}'", args.input.display()))?;

    if let Some(dir) = &report.kept_work_dir {
        eprintln!("intermediate files kept in {}", dir.display());
    }
    eprintln!(
        "wrote {} ({} of {} frames)",
        report.output.display(),
        report.frames_encoded,
        report.frames_total
    );
    Ok(())
}
