use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xssim", version, about = "Frame-by-frame SSIM of two luma video streams")]
struct Cli {
    /// Log per-frame scores (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two whole streams and print the aggregate statistics.
    Compare(CompareArgs),
    /// Compare a single frame pair and write its similarity map as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct InputArgs {
    /// Reference stream.
    first: PathBuf,

    /// Processed stream.
    second: PathBuf,

    /// Frame size as WIDTHxHEIGHT (required for raw inputs).
    #[arg(long, value_parser = parse_size)]
    size: Option<(u32, u32)>,

    /// Raw input pixel format; only the luma plane is compared.
    #[arg(long, value_enum, default_value_t = FormatChoice::Gray)]
    format: FormatChoice,

    /// Frame rate as N or N/D (raw inputs; decoded inputs use the probed rate).
    #[arg(long)]
    fps: Option<xssim::Fps>,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Decode inputs through the system `ffmpeg` instead of reading raw frames.
    #[arg(long)]
    decode: bool,

    /// Write the similarity maps as a video (requires `ffmpeg` on PATH).
    #[arg(long, conflicts_with = "vis_png_dir")]
    vis_out: Option<PathBuf>,

    /// Write the similarity maps as numbered PNGs into this directory.
    #[arg(long)]
    vis_png_dir: Option<PathBuf>,

    /// Print the statistics as JSON.
    #[arg(long)]
    json: bool,

    /// Split each frame over a rayon pool.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    index: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Gray,
    I420,
}

impl From<FormatChoice> for xssim::PixelFormat {
    fn from(v: FormatChoice) -> Self {
        match v {
            FormatChoice::Gray => xssim::PixelFormat::Gray8,
            FormatChoice::I420 => xssim::PixelFormat::I420,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Compare(args) => cmd_compare(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "xssim=debug" } else { "xssim=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w = w.parse::<u32>().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h = h.parse::<u32>().map_err(|e| format!("bad height '{h}': {e}"))?;
    if w == 0 || h == 0 {
        return Err("width and height must be > 0".to_string());
    }
    Ok((w, h))
}

fn raw_caps(input: &InputArgs) -> anyhow::Result<xssim::Caps> {
    let (width, height) = input
        .size
        .context("--size WIDTHxHEIGHT is required for raw inputs")?;
    Ok(xssim::Caps {
        width,
        height,
        fps: input.fps.unwrap_or_default(),
        format: input.format.into(),
    })
}

fn open_sources(
    input: &InputArgs,
    decode: bool,
) -> anyhow::Result<(Box<dyn xssim::FrameSource>, Box<dyn xssim::FrameSource>)> {
    if decode {
        let spawn = |path: &PathBuf| -> anyhow::Result<Box<dyn xssim::FrameSource>> {
            let opts = xssim::FfmpegSourceOpts {
                path: path.clone(),
                size: input.size,
                fps: input.fps,
            };
            let src = xssim::FfmpegSource::spawn(opts)
                .with_context(|| format!("decode '{}'", path.display()))?;
            Ok(Box::new(src))
        };
        return Ok((spawn(&input.first)?, spawn(&input.second)?));
    }

    let caps = raw_caps(input)?;
    let first = xssim::RawSource::open(&input.first, caps)
        .with_context(|| format!("open '{}'", input.first.display()))?;
    let second = xssim::RawSource::open(&input.second, caps)
        .with_context(|| format!("open '{}'", input.second.display()))?;
    Ok((Box::new(first), Box::new(second)))
}

fn cmd_compare(args: CompareArgs) -> anyhow::Result<()> {
    let (first, second) = open_sources(&args.input, args.decode)?;

    let opts = xssim::SessionOpts {
        parallel: args.parallel,
        threads: args.threads,
        default_fps: args.input.fps.unwrap_or_default(),
    };
    let mut sess = xssim::SsimSession::new(first, second, opts)?;

    let mut sink: Box<dyn xssim::VisSink> = match (&args.vis_out, &args.vis_png_dir) {
        (Some(out), _) => Box::new(xssim::FfmpegVisSink::new(
            xssim::FfmpegVisSinkOpts::new(out),
        )),
        (None, Some(dir)) => Box::new(xssim::PngSequenceSink::new(dir)),
        (None, None) => Box::new(xssim::NullSink),
    };

    let stats = sess.run(sink.as_mut())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
    }
    if let Some(out) = args.vis_out.as_ref().or(args.vis_png_dir.as_ref()) {
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    use xssim::FrameSource as _;

    let caps = raw_caps(&args.input)?;
    let mut first = xssim::RawSource::open(&args.input.first, caps)?;
    let mut second = xssim::RawSource::open(&args.input.second, caps)?;

    let mut pair = None;
    for _ in 0..=args.index {
        pair = match (first.next_frame()?, second.next_frame()?) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        };
        if pair.is_none() {
            break;
        }
    }
    let (a, b) = pair.with_context(|| format!("inputs have no frame pair {}", args.index))?;

    let mut computer = xssim::SsimComputer::new(caps.width, caps.height)?;
    let (ssim, vis) = computer.compute_frames(&a, &b)?;

    xssim::ensure_parent_dir(&args.out)?;
    xssim::write_gray_png(&args.out, &vis)?;

    println!("{ssim:.6}");
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
