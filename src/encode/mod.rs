//! Video encoding of the visualization stream.

/// `ffmpeg`-based sink (video output via system `ffmpeg`).
pub(crate) mod ffmpeg;
