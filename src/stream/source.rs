use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::{
    foundation::core::{Fps, FrameMeta},
    foundation::error::{XssimError, XssimResult},
    stream::caps::Caps,
    stream::frame::LumaFrame,
};

/// Ordered input of luma buffers.
///
/// `Ok(None)` marks end-of-sequence; sources are not pulled again after returning it.
pub trait FrameSource: Send {
    /// Pull the next buffer.
    fn next_frame(&mut self) -> XssimResult<Option<LumaFrame>>;

    /// Caps known before streaming, used for the capability exchange.
    fn caps(&self) -> Option<Caps> {
        None
    }
}

/// Source backed by a queue of prepared frames, for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemorySource {
    frames: VecDeque<LumaFrame>,
    caps: Option<Caps>,
    pulled: usize,
}

impl InMemorySource {
    /// Create a source yielding `frames` in order.
    pub fn new(frames: impl IntoIterator<Item = LumaFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            caps: None,
            pulled: 0,
        }
    }

    /// Advertise `caps` for the capability exchange.
    pub fn with_caps(mut self, caps: Caps) -> Self {
        self.caps = Some(caps);
        self
    }

    /// Number of `next_frame` calls so far (including the one that hit end-of-sequence).
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    /// Frames not yet pulled.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for InMemorySource {
    fn next_frame(&mut self) -> XssimResult<Option<LumaFrame>> {
        self.pulled += 1;
        Ok(self.frames.pop_front())
    }

    fn caps(&self) -> Option<Caps> {
        self.caps
    }
}

/// Source reading tightly packed raw frames (Gray8 or I420) from any reader.
///
/// For I420 only the luma plane is kept; chroma bytes are read and dropped. A trailing partial
/// frame ends the stream with a warning.
pub struct RawSource<R> {
    reader: R,
    caps: Caps,
    frame_len: usize,
    index: u64,
    done: bool,
}

impl RawSource<BufReader<File>> {
    /// Open a raw file.
    pub fn open(path: impl AsRef<Path>, caps: Caps) -> XssimResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            XssimError::io(format!("failed to open raw input '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f), caps)
    }
}

impl<R: Read + Send> RawSource<R> {
    /// Wrap a reader producing frames described by `caps`.
    pub fn from_reader(reader: R, caps: Caps) -> XssimResult<Self> {
        if caps.width == 0 || caps.height == 0 {
            return Err(XssimError::validation(
                "raw input width/height must be non-zero",
            ));
        }
        Ok(Self {
            reader,
            frame_len: caps.format.frame_len(caps.width, caps.height),
            caps,
            index: 0,
            done: false,
        })
    }

    /// Frames produced so far.
    pub fn frames_read(&self) -> u64 {
        self.index
    }
}

impl<R: Read + Send> FrameSource for RawSource<R> {
    fn next_frame(&mut self) -> XssimResult<Option<LumaFrame>> {
        if self.done {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let got = read_full(&mut self.reader, &mut buf)
            .map_err(|e| XssimError::io(format!("failed to read raw frame {}: {e}", self.index)))?;
        if got < self.frame_len {
            self.done = true;
            if got > 0 {
                tracing::warn!(
                    frame = self.index,
                    got,
                    expected = self.frame_len,
                    "dropping trailing partial frame"
                );
            }
            return Ok(None);
        }

        let luma_len = (self.caps.width as usize) * (self.caps.height as usize);
        buf.truncate(luma_len);
        let meta = FrameMeta::for_index(self.index, self.caps.fps);
        self.index += 1;
        LumaFrame::packed(self.caps.width, self.caps.height, buf, meta).map(Some)
    }

    fn caps(&self) -> Option<Caps> {
        Some(self.caps)
    }
}

fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Options for [`FfmpegSource`].
#[derive(Clone, Debug)]
pub struct FfmpegSourceOpts {
    /// Any container/codec the system `ffmpeg` can decode.
    pub path: PathBuf,
    /// Expected frame size; probed with `ffprobe` when `None`.
    pub size: Option<(u32, u32)>,
    /// Frame rate to advertise; probed with `ffprobe` when `None`.
    pub fps: Option<Fps>,
}

impl FfmpegSourceOpts {
    /// Decode `path`, probing geometry and rate.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size: None,
            fps: None,
        }
    }
}

/// Source decoding a video file through the system `ffmpeg` into gray rawvideo frames.
pub struct FfmpegSource {
    child: Option<Child>,
    raw: Option<RawSource<ChildStdout>>,
    caps: Caps,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegSource {
    /// Spawn the decoder.
    pub fn spawn(opts: FfmpegSourceOpts) -> XssimResult<Self> {
        if !crate::encode::ffmpeg::is_ffmpeg_on_path() {
            return Err(XssimError::evaluation(
                "ffmpeg is required for decoding, but was not found on PATH",
            ));
        }

        let probed = match (opts.size, opts.fps) {
            (Some(size), Some(fps)) => (size, fps),
            _ => {
                let p = probe_video(&opts.path)?;
                (opts.size.unwrap_or(p.0), opts.fps.unwrap_or(p.1))
            }
        };
        let ((width, height), fps) = probed;
        let caps = Caps::gray(width, height, fps);

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args(["-v", "error", "-i"])
            .arg(&opts.path)
            .args([
                "-an",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "gray",
                "-s",
                &format!("{width}x{height}"),
                "pipe:1",
            ]);

        let mut child = cmd.spawn().map_err(|e| {
            XssimError::evaluation(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| XssimError::evaluation("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| XssimError::evaluation("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            child: Some(child),
            raw: Some(RawSource::from_reader(stdout, caps)?),
            caps,
            stderr_drain: Some(stderr_drain),
        })
    }

    fn finish(&mut self) -> XssimResult<()> {
        self.raw = None;
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
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> XssimResult<Option<LumaFrame>> {
        let Some(raw) = self.raw.as_mut() else {
            return Ok(None);
        };
        match raw.next_frame()? {
            Some(f) => Ok(Some(f)),
            None => {
                self.finish()?;
                Ok(None)
            }
        }
    }

    fn caps(&self) -> Option<Caps> {
        Some(self.caps)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Probe `(width, height)` and frame rate of the first video stream through `ffprobe`.
pub fn probe_video(path: &Path) -> XssimResult<((u32, u32), Fps)> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| XssimError::evaluation(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(XssimError::evaluation(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| XssimError::evaluation(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| XssimError::evaluation("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| XssimError::evaluation("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| XssimError::evaluation("missing video height from ffprobe"))?;
    // "0/0" is reported for streams without a fixed rate.
    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(|r| r.parse::<Fps>().ok())
        .unwrap_or(Fps { num: 0, den: 1 });
    Ok(((width, height), fps))
}

#[cfg(test)]
#[path = "../../tests/unit/stream/source.rs"]
mod tests;
