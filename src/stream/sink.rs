use std::path::PathBuf;

use crate::{
    foundation::error::{XssimError, XssimResult},
    stream::caps::Caps,
    stream::frame::VisFrame,
};

/// Downstream consumer of visualization frames.
///
/// Call order: `begin` once when the output caps are fixed, `push_frame` once per processed pair
/// in stream order, `end` once at end-of-sequence. `end` may arrive without `begin` when the
/// inputs were empty.
pub trait VisSink: Send {
    /// Receive the published output caps.
    fn begin(&mut self, caps: Caps) -> XssimResult<()>;
    /// Receive the visualization of pair `index` (0-based).
    fn push_frame(&mut self, index: u64, frame: &VisFrame) -> XssimResult<()>;
    /// End-of-sequence notification.
    fn end(&mut self) -> XssimResult<()>;
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl VisSink for NullSink {
    fn begin(&mut self, _caps: Caps) -> XssimResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, _index: u64, _frame: &VisFrame) -> XssimResult<()> {
        Ok(())
    }

    fn end(&mut self) -> XssimResult<()> {
        Ok(())
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    caps: Option<Caps>,
    frames: Vec<(u64, VisFrame)>,
    ended: u32,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps captured in `begin`, if any.
    pub fn caps(&self) -> Option<Caps> {
        self.caps
    }

    /// Captured frames in stream order.
    pub fn frames(&self) -> &[(u64, VisFrame)] {
        &self.frames
    }

    /// Number of end-of-sequence notifications received.
    pub fn end_count(&self) -> u32 {
        self.ended
    }
}

impl VisSink for InMemorySink {
    fn begin(&mut self, caps: Caps) -> XssimResult<()> {
        self.caps = Some(caps);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &VisFrame) -> XssimResult<()> {
        self.frames.push((index, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> XssimResult<()> {
        self.ended += 1;
        Ok(())
    }
}

/// Sink writing each visualization frame as `<dir>/<prefix><index:06>.png`.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    prefix: String,
    written: u64,
}

impl PngSequenceSink {
    /// Write into `dir` (created on `begin`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "ssim_".to_string(),
            written: 0,
        }
    }

    /// Override the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Number of PNGs written.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path used for frame `index`.
    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}{index:06}.png", self.prefix))
    }
}

impl VisSink for PngSequenceSink {
    fn begin(&mut self, _caps: Caps) -> XssimResult<()> {
        use anyhow::Context as _;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output directory '{}'", self.dir.display()))?;
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &VisFrame) -> XssimResult<()> {
        let path = self.path_for(index);
        write_gray_png(&path, frame)?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> XssimResult<()> {
        tracing::debug!(dir = %self.dir.display(), written = self.written, "png sequence done");
        Ok(())
    }
}

/// Save the visible area of `frame` as an 8-bit grayscale PNG.
pub fn write_gray_png(path: &std::path::Path, frame: &VisFrame) -> XssimResult<()> {
    let packed = frame.to_packed();
    image::save_buffer_with_format(
        path,
        &packed,
        frame.width,
        frame.height,
        image::ColorType::L8,
        image::ImageFormat::Png,
    )
    .map_err(|e| XssimError::io(format!("failed to write png '{}': {e}", path.display())))
}

#[cfg(test)]
#[path = "../../tests/unit/stream/sink.rs"]
mod tests;
