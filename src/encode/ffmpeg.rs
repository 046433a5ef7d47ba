use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::{
    foundation::core::Fps,
    foundation::error::{XssimError, XssimResult},
    stream::caps::Caps,
    stream::frame::VisFrame,
    stream::sink::VisSink,
};

/// Options for [`FfmpegVisSink`] output.
#[derive(Clone, Debug)]
pub struct FfmpegVisSinkOpts {
    /// Output video path (container chosen by extension, e.g. `.mp4`).
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
}

impl FfmpegVisSinkOpts {
    /// Create options for writing to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Sink that spawns the system `ffmpeg` and streams gray visualization frames to stdin.
pub struct FfmpegVisSink {
    opts: FfmpegVisSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    caps: Option<Caps>,
    last_idx: Option<u64>,
}

impl FfmpegVisSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegVisSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            caps: None,
            last_idx: None,
        }
    }
}

impl VisSink for FfmpegVisSink {
    fn begin(&mut self, caps: Caps) -> XssimResult<()> {
        if caps.width == 0 || caps.height == 0 {
            return Err(XssimError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }

        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(XssimError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(XssimError::evaluation(
                "ffmpeg is required for video output, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if self.opts.overwrite {
            cmd.arg("-y");
        } else {
            cmd.arg("-n");
        }

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "gray",
            "-s",
            &format!("{}x{}", caps.width, caps.height),
        ]);
        push_input_fps(&mut cmd, caps.fps);
        // yuv420p needs even dimensions; pad odd sizes by one black row/column.
        cmd.args([
            "-i",
            "pipe:0",
            "-an",
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&self.opts.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            XssimError::evaluation(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| XssimError::evaluation("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| XssimError::evaluation("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.caps = Some(caps);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, index: u64, frame: &VisFrame) -> XssimResult<()> {
        let caps = self
            .caps
            .as_ref()
            .ok_or_else(|| XssimError::evaluation("ffmpeg sink not started"))?;
        if let Some(last) = self.last_idx
            && index <= last
        {
            return Err(XssimError::evaluation(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(index);

        if frame.width != caps.width || frame.height != caps.height {
            return Err(XssimError::dimension_mismatch(
                caps.size(),
                (frame.width, frame.height),
                "ffmpeg sink frame",
            ));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(XssimError::evaluation("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&frame.to_packed()).map_err(|e| {
            XssimError::evaluation(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> XssimResult<()> {
        drop(self.stdin.take());
        // Empty inputs never started the encoder.
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| {
            XssimError::evaluation(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| XssimError::evaluation("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| XssimError::evaluation(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(XssimError::evaluation(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }

        self.caps = None;
        Ok(())
    }
}

impl Drop for FfmpegVisSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // rawvideo needs `-r` before `-i`; unknown rates fall back to ffmpeg's 25.
    if fps.num > 0 {
        cmd.args(["-r", &fps.to_string()]);
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> XssimResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
