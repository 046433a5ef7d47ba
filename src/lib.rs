//! xssim compares two synchronized raw luma video streams frame by frame.
//!
//! For every frame pair it computes a structural similarity (SSIM) score and a gray-level
//! similarity map, and it keeps running mean/min/max statistics over the whole stream.
//!
//! # Pipeline overview
//!
//! 1. **Negotiate**: the first capability exchange (or the first pair) fixes width/height/rate
//!    for the session ([`Negotiator`]).
//! 2. **Pull**: [`SsimSession`] pops one [`LumaFrame`] from each [`FrameSource`].
//! 3. **Compute**: [`SsimComputer`] sums 4x4 blocks, slides 8x8 windows over two block rows,
//!    and averages per-window SSIM into the frame score.
//! 4. **Forward**: the [`VisFrame`] goes to a [`VisSink`]; the score goes into
//!    [`StatsAccumulator`]. At end-of-stream the final [`SsimStats`] are returned once.
//!
//! Dimensions that are not multiples of 4 are truncated for the computation; the trailing
//! columns/rows do not influence the score.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod encode;
mod foundation;
mod session;
mod ssim;
mod stats;
mod stream;

pub use crate::encode::ffmpeg::{
    FfmpegVisSink, FfmpegVisSinkOpts, ensure_parent_dir, is_ffmpeg_on_path,
};
pub use crate::foundation::core::{Fps, FrameMeta, PixelFormat, round_up_4};
pub use crate::foundation::error::{XssimError, XssimResult};
pub use crate::session::{SessionOpts, SessionState, SsimSession, Step};
pub use crate::ssim::block::{BlockSums, ssim_end1};
pub use crate::ssim::compute::{FrameScore, MIN_DIMENSION, SsimComputer, gray_level};
pub use crate::stats::{SsimStats, StatsAccumulator};
pub use crate::stream::caps::{Caps, InputPad, Negotiator};
pub use crate::stream::frame::{LumaFrame, VisFrame};
pub use crate::stream::sink::{InMemorySink, NullSink, PngSequenceSink, VisSink, write_gray_png};
pub use crate::stream::source::{
    FfmpegSource, FfmpegSourceOpts, FrameSource, InMemorySource, RawSource, probe_video,
};
