//! Windowed SSIM over 8-bit luma planes.

/// 4x4 block sums and the per-window formula.
pub(crate) mod block;
/// Frame-level computation with the two-row sliding window.
pub(crate) mod compute;
