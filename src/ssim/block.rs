//! 4x4 block sums and the per-window SSIM formula.

/// Sums accumulated over one 4x4 block, or over a 2x2 group of blocks (one 8x8 window).
///
/// `ss` holds the sum of squares of *both* images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockSums {
    /// Sum of samples from image A.
    pub s1: u32,
    /// Sum of samples from image B.
    pub s2: u32,
    /// Sum of squared samples from A and B.
    pub ss: u32,
    /// Sum of elementwise products `a * b`.
    pub s12: u32,
}

impl BlockSums {
    fn add(self, o: Self) -> Self {
        Self {
            s1: self.s1 + o.s1,
            s2: self.s2 + o.s2,
            ss: self.ss + o.ss,
            s12: self.s12 + o.s12,
        }
    }
}

/// Stabilization constants scaled for 64-sample windows.
const SSIM_C1: i64 = (0.01 * 0.01 * 255.0 * 255.0 * 64.0 + 0.5) as i64;
const SSIM_C2: i64 = (0.03 * 0.03 * 255.0 * 255.0 * 64.0 * 63.0 + 0.5) as i64;

/// Block sums for the two horizontally adjacent 4x4 blocks starting at byte offsets `off1` in
/// `pix1` and `off2` in `pix2`.
///
/// `out[1]` is only written when `out` has a second slot, so a trailing odd block never reads
/// past the truncated row width.
pub(crate) fn ssim_4x4x2_core(
    pix1: &[u8],
    off1: usize,
    stride1: usize,
    pix2: &[u8],
    off2: usize,
    stride2: usize,
    out: &mut [BlockSums],
) {
    for (z, slot) in out.iter_mut().take(2).enumerate() {
        let mut sums = BlockSums::default();
        for y in 0..4 {
            let r1 = off1 + 4 * z + y * stride1;
            let r2 = off2 + 4 * z + y * stride2;
            for (&a, &b) in pix1[r1..r1 + 4].iter().zip(&pix2[r2..r2 + 4]) {
                let (a, b) = (u32::from(a), u32::from(b));
                sums.s1 += a;
                sums.s2 += b;
                sums.ss += a * a + b * b;
                sums.s12 += a * b;
            }
        }
        *slot = sums;
    }
}

/// SSIM of one 8x8 window given its summed statistics.
pub fn ssim_end1(w: BlockSums) -> f32 {
    let s1 = i64::from(w.s1);
    let s2 = i64::from(w.s2);
    let ss = i64::from(w.ss);
    let s12 = i64::from(w.s12);

    let vars = ss * 64 - s1 * s1 - s2 * s2;
    let covar = s12 * 64 - s1 * s2;
    (2 * s1 * s2 + SSIM_C1) as f32 * (2 * covar + SSIM_C2) as f32
        / ((s1 * s1 + s2 * s2 + SSIM_C1) as f32 * (vars + SSIM_C2) as f32)
}

/// Combine the 2x2 block neighbourhood of each window in a window row.
///
/// `upper` and `lower` are adjacent block rows; window `i` sums blocks `i` and `i + 1` of both.
/// Writes one value per window into `out` (length `upper.len() - 1`) and returns their sum.
pub(crate) fn ssim_end4(upper: &[BlockSums], lower: &[BlockSums], out: &mut [f32]) -> f64 {
    let mut total = 0.0f64;
    for (i, v) in out.iter_mut().enumerate() {
        let w = upper[i].add(upper[i + 1]).add(lower[i]).add(lower[i + 1]);
        *v = ssim_end1(w);
        total += f64::from(*v);
    }
    total
}

#[cfg(test)]
#[path = "../../tests/unit/ssim/block.rs"]
mod tests;
