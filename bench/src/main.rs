use std::time::{Duration, Instant};

use anyhow::Context as _;
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use serde_json::json;
use sha2::Digest as _;

#[derive(Clone, Debug)]
struct BenchArgs {
    width: u32,
    height: u32,
    frames: u32,
    warmup: u32,
    repeats: u32,
    noise: u32,
    parallel: bool,
    threads: Option<usize>,
}

#[derive(Clone, Debug, Default)]
struct RunMetrics {
    session_create: Duration,
    compute_total: Duration,
    digest_total: Duration,
    wall_total: Duration,
}

/// Hashes every similarity map so runs can be checked for identical output.
struct DigestSink {
    hasher: sha2::Sha256,
    elapsed: Duration,
}

impl DigestSink {
    fn new() -> Self {
        Self {
            hasher: sha2::Sha256::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn finish_hex(self) -> String {
        let digest = self.hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for b in digest {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }
}

impl xssim::VisSink for DigestSink {
    fn begin(&mut self, _caps: xssim::Caps) -> xssim::XssimResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &xssim::VisFrame) -> xssim::XssimResult<()> {
        let t = Instant::now();
        self.hasher.update(index.to_le_bytes());
        self.hasher.update(&frame.data);
        self.elapsed += t.elapsed();
        Ok(())
    }

    fn end(&mut self) -> xssim::XssimResult<()> {
        Ok(())
    }
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = parse_args()?;

    if args.width < xssim::MIN_DIMENSION || args.height < xssim::MIN_DIMENSION {
        anyhow::bail!(
            "--width/--height must be >= {min}",
            min = xssim::MIN_DIMENSION
        );
    }
    if args.frames == 0 {
        anyhow::bail!("--frames must be > 0");
    }
    if let Some(n) = args.threads
        && n == 0
    {
        anyhow::bail!("--threads must be >= 1 when set");
    }

    let (reference, processed) = build_frames(&args)?;

    if args.warmup > 0 {
        eprintln!("warmup: {} run(s)", args.warmup);
        for i in 0..args.warmup {
            let _ = run_once(&args, &reference, &processed, i, /*is_warmup=*/ true)?;
        }
    }

    eprintln!(
        "bench: {repeats} run(s) ({profile} build), {frames} frames/run at {w}x{h}, mode={mode}, threads={threads}",
        repeats = args.repeats,
        profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
        frames = args.frames,
        w = args.width,
        h = args.height,
        mode = if args.parallel {
            "parallel"
        } else {
            "sequential"
        },
        threads = args
            .threads
            .map(|n| n.to_string())
            .unwrap_or_else(|| "auto".to_string()),
    );

    let mut runs = Vec::<RunMetrics>::with_capacity(args.repeats as usize);
    let mut summary = None;
    for i in 0..args.repeats {
        let (m, stats, digest) = run_once(&args, &reference, &processed, i, false)?;
        match &summary {
            None => summary = Some((stats, digest)),
            Some((_, first)) if *first != digest => {
                anyhow::bail!("run {i:03} produced different maps ({digest} != {first})");
            }
            Some(_) => {}
        }
        runs.push(m);
    }

    report_percentiles(&runs);

    if let Some((stats, digest)) = summary {
        let out = json!({
            "width": args.width,
            "height": args.height,
            "frames": args.frames,
            "parallel": args.parallel,
            "stats": stats,
            "map_sha256": digest,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);

    let mut out = BenchArgs {
        width: 1280,
        height: 720,
        frames: 60,
        warmup: 1,
        repeats: 20,
        noise: 24,
        parallel: false,
        threads: None,
    };

    while let Some(a) = args.next() {
        match a.as_str() {
            "--width" => out.width = parse_u32(args.next(), "--width")?,
            "--height" => out.height = parse_u32(args.next(), "--height")?,
            "--frames" => out.frames = parse_u32(args.next(), "--frames")?,
            "--warmup" => out.warmup = parse_u32(args.next(), "--warmup")?,
            "--repeats" => out.repeats = parse_u32(args.next(), "--repeats")?,
            "--noise" => out.noise = parse_u32(args.next(), "--noise")?,
            "--parallel" => out.parallel = true,
            "--threads" => out.threads = Some(parse_usize(args.next(), "--threads")?),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("unknown arg '{a}' (try --help)"),
        }
    }

    Ok(out)
}

fn print_help() {
    eprintln!(
        r#"xssim-bench

Compares two synthetic luma streams repeatedly and reports p50/p90/p99 per stage.

Usage:
  cargo run -q --release
  cargo run -q --release -- --repeats 50 --frames 120
  cargo run -q --release -- --parallel --threads 4

Args:
  --width N     (default 1280)
  --height N    (default 720)
  --frames N    frame pairs per run (default 60)
  --warmup N    (default 1)
  --repeats N   (default 20)
  --noise N     max per-pixel perturbation of the second stream (default 24)
  --parallel    split each frame over a rayon pool
  --threads N   worker threads for parallel mode (default auto)
"#
    );
}

fn parse_u32(v: Option<String>, flag: &str) -> anyhow::Result<u32> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<u32>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn parse_usize(v: Option<String>, flag: &str) -> anyhow::Result<usize> {
    let v = v.ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))?;
    v.parse::<usize>()
        .with_context(|| format!("parse {flag} value '{v}'"))
}

fn build_frames(
    args: &BenchArgs,
) -> anyhow::Result<(Vec<xssim::LumaFrame>, Vec<xssim::LumaFrame>)> {
    let (w, h) = (args.width as usize, args.height as usize);
    let fps = xssim::Fps::default();
    let mut rng = StdRng::seed_from_u64(0x55_1d);
    let noise = args.noise as i32;
    let mut reference = Vec::with_capacity(args.frames as usize);
    let mut processed = Vec::with_capacity(args.frames as usize);

    for f in 0..args.frames {
        let mut a = Vec::with_capacity(w * h);
        for y in 0..h {
            for x in 0..w {
                a.push(((x * 3 + y * 2 + f as usize * 5) % 256) as u8);
            }
        }
        let b = a
            .iter()
            .map(|&v| (i32::from(v) + rng.gen_range(-noise..=noise)).clamp(0, 255) as u8)
            .collect();

        let meta = xssim::FrameMeta::for_index(u64::from(f), fps);
        reference.push(xssim::LumaFrame::packed(args.width, args.height, a, meta)?);
        processed.push(xssim::LumaFrame::packed(args.width, args.height, b, meta)?);
    }
    Ok((reference, processed))
}

fn run_once(
    args: &BenchArgs,
    reference: &[xssim::LumaFrame],
    processed: &[xssim::LumaFrame],
    run_idx: u32,
    is_warmup: bool,
) -> anyhow::Result<(RunMetrics, xssim::SsimStats, String)> {
    let first = xssim::InMemorySource::new(reference.to_vec());
    let second = xssim::InMemorySource::new(processed.to_vec());

    let wall = Instant::now();

    let t0 = Instant::now();
    let opts = xssim::SessionOpts {
        parallel: args.parallel,
        threads: args.threads,
        ..xssim::SessionOpts::default()
    };
    let mut sess = xssim::SsimSession::new(Box::new(first), Box::new(second), opts)?;
    let session_create = t0.elapsed();

    let mut sink = DigestSink::new();
    let t1 = Instant::now();
    let stats = sess.run(&mut sink)?;
    let step_total = t1.elapsed();
    anyhow::ensure!(
        sess.frames_processed() == u64::from(args.frames),
        "run {run_idx:03} compared {} of {} pairs",
        sess.frames_processed(),
        args.frames
    );

    let m = RunMetrics {
        session_create,
        compute_total: step_total.saturating_sub(sink.elapsed),
        digest_total: sink.elapsed,
        wall_total: wall.elapsed(),
    };

    if !is_warmup {
        eprintln!(
            "run {run_idx:03}: wall={wall:.3}s compute={co:.3}s digest={di:.3}s create={cr:.6}s {stats}",
            wall = m.wall_total.as_secs_f64(),
            co = m.compute_total.as_secs_f64(),
            di = m.digest_total.as_secs_f64(),
            cr = m.session_create.as_secs_f64(),
        );
    }

    Ok((m, stats, sink.finish_hex()))
}

fn report_percentiles(runs: &[RunMetrics]) {
    type Getter = fn(&RunMetrics) -> Duration;
    type Field = (&'static str, Getter);

    fn collect(runs: &[RunMetrics], f: fn(&RunMetrics) -> Duration) -> Vec<Duration> {
        let mut v = runs.iter().map(f).collect::<Vec<_>>();
        v.sort_by_key(|d| d.as_nanos());
        v
    }

    fn p(v: &[Duration], p: f64) -> Duration {
        if v.is_empty() {
            return Duration::ZERO;
        }
        let n = v.len();
        let rank = (p * (n as f64)).ceil().clamp(1.0, n as f64) as usize;
        v[rank - 1]
    }

    fn fmt_ms(d: Duration) -> String {
        format!("{:.3}ms", d.as_secs_f64() * 1000.0)
    }

    let fields: &[Field] = &[
        ("session_create", |m| m.session_create),
        ("compute_total", |m| m.compute_total),
        ("digest_total", |m| m.digest_total),
        ("wall_total", |m| m.wall_total),
    ];

    eprintln!("\npercentiles across runs (p50/p90/p99):");
    for (name, getter) in fields {
        let v = collect(runs, *getter);
        eprintln!(
            "  {name:14} p50={p50:>10}  p90={p90:>10}  p99={p99:>10}",
            name = *name,
            p50 = fmt_ms(p(&v, 0.50)),
            p90 = fmt_ms(p(&v, 0.90)),
            p99 = fmt_ms(p(&v, 0.99))
        );
    }
}
