use rayon::prelude::*;

use crate::{
    foundation::core::round_up_4,
    foundation::error::{XssimError, XssimResult},
    ssim::block::{BlockSums, ssim_4x4x2_core, ssim_end4},
    stream::frame::{LumaFrame, VisFrame},
};

/// Smallest geometry that yields at least one 8x8 window.
pub const MIN_DIMENSION: u32 = 8;

/// Result of comparing one frame pair.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameScore {
    /// Mean SSIM over all windows of the frame.
    pub ssim: f64,
    /// Number of windows averaged: `(height/4 - 1) * (width/4 - 1)`.
    pub windows: u64,
    /// Gray-level similarity map, `map_stride * height` bytes.
    pub map: Vec<u8>,
    /// Row stride of `map` (width rounded up to 4).
    pub map_stride: u32,
}

/// Windowed SSIM over two luma planes of a fixed geometry.
///
/// Samples are accumulated per 4x4 block; each 8x8 window combines a 2x2 group of blocks from
/// two adjacent block rows. Width and height are truncated to multiples of 4 for the
/// computation: the trailing `width % 4` columns and `height % 4` rows never contribute to the
/// score. They still receive a map value (the nearest computed window).
///
/// All scratch is sized once from the geometry and reused for every frame: two block-row
/// buffers for the sequential path, or a whole-frame block arena for the parallel one. Only the
/// output map is allocated per frame.
pub struct SsimComputer {
    width: u32,
    height: u32,
    rows: [Vec<BlockSums>; 2],
    cur: usize,
    window_vals: Vec<f32>,
    parallel: Option<ParallelScratch>,
}

/// Scratch for the row-parallel path.
struct ParallelScratch {
    pool: rayon::ThreadPool,
    /// `h4 * w4` block sums, one row per block row.
    arena: Vec<BlockSums>,
    /// `(h4 - 1) * (w4 - 1)` window values, one row per window row.
    vals: Vec<f32>,
    /// Per-window-row sums, added in row order.
    row_sums: Vec<f64>,
}

impl std::fmt::Debug for SsimComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsimComputer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("parallel", &self.parallel.is_some())
            .finish()
    }
}

impl SsimComputer {
    /// Create a sequential computer for `width x height` frames.
    pub fn new(width: u32, height: u32) -> XssimResult<Self> {
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(XssimError::validation(format!(
                "ssim needs at least {MIN_DIMENSION}x{MIN_DIMENSION} pixels, got {width}x{height}"
            )));
        }
        let w4 = (width / 4) as usize;
        Ok(Self {
            width,
            height,
            rows: [vec![BlockSums::default(); w4], vec![BlockSums::default(); w4]],
            cur: 0,
            window_vals: vec![0.0; w4 - 1],
            parallel: None,
        })
    }

    /// Create a computer that splits each frame by block row over a dedicated rayon pool.
    ///
    /// Scores and maps are bit-identical to the sequential path.
    pub fn with_threads(width: u32, height: u32, threads: Option<usize>) -> XssimResult<Self> {
        let mut c = Self::new(width, height)?;
        let (w4, h4) = ((width / 4) as usize, (height / 4) as usize);
        c.parallel = Some(ParallelScratch {
            pool: build_thread_pool(threads)?,
            arena: vec![BlockSums::default(); h4 * w4],
            vals: vec![0.0; (h4 - 1) * (w4 - 1)],
            row_sums: vec![0.0; h4 - 1],
        });
        Ok(c)
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of windows per frame.
    pub fn window_count(&self) -> u64 {
        u64::from(self.width / 4 - 1) * u64::from(self.height / 4 - 1)
    }

    /// Return `true` when the row-parallel path is enabled.
    pub fn is_parallel(&self) -> bool {
        self.parallel.is_some()
    }

    /// Compare two luma planes of the configured geometry.
    pub fn compute(
        &mut self,
        pix1: &[u8],
        stride1: usize,
        pix2: &[u8],
        stride2: usize,
    ) -> XssimResult<FrameScore> {
        let (w, h) = (self.width as usize, self.height as usize);
        check_plane(pix1, stride1, w, h, "first input")?;
        check_plane(pix2, stride2, w, h, "second input")?;

        let map_stride = round_up_4(self.width) as usize;
        let mut map = alloc_map(map_stride * h)?;

        let planes = Planes {
            pix1,
            stride1,
            pix2,
            stride2,
        };
        let total = match self.parallel.as_mut() {
            Some(par) => par.compute(&planes, w, &mut map, map_stride),
            None => self.compute_sequential(&planes, &mut map, map_stride),
        };

        let windows = self.window_count();
        Ok(FrameScore {
            ssim: total / windows as f64,
            windows,
            map,
            map_stride: map_stride as u32,
        })
    }

    /// Compare a frame pair and build the visualization frame.
    ///
    /// Output metadata is copied from `b`, the second input.
    pub fn compute_frames(&mut self, a: &LumaFrame, b: &LumaFrame) -> XssimResult<(f64, VisFrame)> {
        let expected = (self.width, self.height);
        for (f, ctx) in [(a, "first input"), (b, "second input")] {
            if (f.width(), f.height()) != expected {
                return Err(XssimError::dimension_mismatch(
                    expected,
                    (f.width(), f.height()),
                    ctx,
                ));
            }
        }

        let score = self.compute(a.data(), a.stride(), b.data(), b.stride())?;
        let vis = VisFrame {
            width: self.width,
            height: self.height,
            stride: score.map_stride,
            data: score.map,
            meta: b.meta(),
        };
        Ok((score.ssim, vis))
    }

    fn compute_sequential(&mut self, p: &Planes<'_>, map: &mut [u8], map_stride: usize) -> f64 {
        let (w, h4) = (self.width as usize, (self.height / 4) as usize);
        let rows = &mut self.rows;
        let vals = &mut self.window_vals;

        self.cur = 0;
        block_row(p, 0, &mut rows[0]);

        let mut total = 0.0f64;
        for (k, chunk) in map.chunks_mut(4 * map_stride).enumerate() {
            if k + 1 < h4 {
                let next = 1 - self.cur;
                block_row(p, k + 1, &mut rows[next]);
                total += ssim_end4(&rows[self.cur], &rows[next], vals);
                self.cur = next;
            }
            paint_block_row(chunk, map_stride, w, vals);
        }
        total
    }
}

struct Planes<'a> {
    pix1: &'a [u8],
    stride1: usize,
    pix2: &'a [u8],
    stride2: usize,
}

impl ParallelScratch {
    /// Fill every block row once, score every window row, then paint. Each phase is split by row
    /// over the pool.
    fn compute(&mut self, p: &Planes<'_>, w: usize, map: &mut [u8], map_stride: usize) -> f64 {
        let Self {
            pool,
            arena,
            vals,
            row_sums,
        } = self;
        let w4 = w / 4;
        let wn = w4 - 1;
        let last_row = row_sums.len() - 1;

        pool.install(|| {
            arena
                .par_chunks_mut(w4)
                .enumerate()
                .for_each(|(by, row)| block_row(p, by, row));

            let arena = &*arena;
            vals.par_chunks_mut(wn)
                .zip(row_sums.par_iter_mut())
                .enumerate()
                .for_each(|(k, (out, sum))| {
                    let upper = &arena[k * w4..(k + 1) * w4];
                    let lower = &arena[(k + 1) * w4..(k + 2) * w4];
                    *sum = ssim_end4(upper, lower, out);
                });

            let vals = &*vals;
            map.par_chunks_mut(4 * map_stride)
                .enumerate()
                .for_each(|(k, chunk)| {
                    let wy = k.min(last_row);
                    paint_block_row(chunk, map_stride, w, &vals[wy * wn..(wy + 1) * wn]);
                });
        });

        let mut total = 0.0f64;
        for s in row_sums.iter() {
            total += s;
        }
        total
    }
}

/// Fill `row` with the block sums of block row `by`.
fn block_row(p: &Planes<'_>, by: usize, row: &mut [BlockSums]) {
    let off1 = 4 * by * p.stride1;
    let off2 = 4 * by * p.stride2;
    for (x, pair) in row.chunks_mut(2).enumerate() {
        ssim_4x4x2_core(
            p.pix1,
            off1 + 8 * x,
            p.stride1,
            p.pix2,
            off2 + 8 * x,
            p.stride2,
            pair,
        );
    }
}

/// Paint up to four map rows from one window row; columns past the last window replicate it.
fn paint_block_row(chunk: &mut [u8], map_stride: usize, width: usize, vals: &[f32]) {
    let last = vals.len() - 1;
    for line in chunk.chunks_mut(map_stride) {
        for (x, px) in line[..width].iter_mut().enumerate() {
            *px = gray_level(vals[(x / 4).min(last)]);
        }
    }
}

/// Map a window SSIM to a gray level: 0 = dissimilar, 255 = identical.
pub fn gray_level(ssim: f32) -> u8 {
    (ssim.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn check_plane(pix: &[u8], stride: usize, w: usize, h: usize, ctx: &str) -> XssimResult<()> {
    if stride < w {
        return Err(XssimError::validation(format!(
            "{ctx}: stride {stride} is smaller than width {w}"
        )));
    }
    let need = stride * (h - 1) + w;
    if pix.len() < need {
        return Err(XssimError::validation(format!(
            "{ctx}: plane has {} bytes, need at least {need}",
            pix.len()
        )));
    }
    Ok(())
}

fn alloc_map(len: usize) -> XssimResult<Vec<u8>> {
    let mut map = Vec::new();
    map.try_reserve_exact(len)
        .map_err(|_| XssimError::AllocationFailure { bytes: len })?;
    map.resize(len, 0);
    Ok(map)
}

fn build_thread_pool(threads: Option<usize>) -> XssimResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(XssimError::validation("threads must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| XssimError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/ssim/compute.rs"]
mod tests;
