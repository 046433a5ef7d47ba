use crate::{
    foundation::core::Fps,
    foundation::error::{XssimError, XssimResult},
    ssim::compute::SsimComputer,
    stats::{SsimStats, StatsAccumulator},
    stream::caps::{Caps, InputPad, Negotiator},
    stream::frame::LumaFrame,
    stream::sink::VisSink,
    stream::source::FrameSource,
};

/// Options for [`SsimSession`].
#[derive(Clone, Debug)]
pub struct SessionOpts {
    /// Split each frame by block row over a rayon pool. Results are identical either way.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Frame rate published when the geometry is fixed from the first pair instead of a
    /// capability exchange.
    pub default_fps: Fps,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            parallel: false,
            threads: None,
            default_fps: Fps::default(),
        }
    }
}

/// Lifecycle of a session: `Idle -> Streaming -> Drained`, or `-> Failed` on a fatal error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No pair processed yet.
    Idle,
    /// Output caps published, pairs flowing.
    Streaming,
    /// An input ran out; final statistics delivered. Terminal.
    Drained,
    /// A fatal error stopped the session. Terminal.
    Failed,
}

/// Outcome of one [`SsimSession::next`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    /// One pair was compared and its visualization forwarded.
    Continue {
        /// 0-based pair index.
        index: u64,
        /// Frame SSIM of this pair.
        ssim: f64,
    },
    /// End-of-stream; carries the final statistics. Returned exactly once.
    Done(SsimStats),
}

type ResultsListener = Box<dyn FnOnce(&SsimStats) + Send>;

/// Pulls matched frame pairs from two sources, scores them, and tracks running statistics.
///
/// Processing is sequential: one pair is fully computed and forwarded before the next is pulled.
pub struct SsimSession {
    opts: SessionOpts,
    first: Box<dyn FrameSource>,
    second: Box<dyn FrameSource>,

    negotiator: Negotiator,
    computer: Option<SsimComputer>,
    stats: StatsAccumulator,
    state: SessionState,
    processed: u64,
    listener: Option<ResultsListener>,
}

impl SsimSession {
    /// Create a session over two sources.
    ///
    /// Sources that advertise caps go through the capability exchange here, so a geometry
    /// disagreement between them fails before any frame is pulled.
    pub fn new(
        first: Box<dyn FrameSource>,
        second: Box<dyn FrameSource>,
        opts: SessionOpts,
    ) -> XssimResult<Self> {
        if let Some(n) = opts.threads
            && n == 0
        {
            return Err(XssimError::validation("threads must be >= 1 when set"));
        }

        let mut negotiator = Negotiator::new();
        for (pad, caps) in [
            (InputPad::First, first.caps()),
            (InputPad::Second, second.caps()),
        ] {
            if let Some(caps) = caps {
                negotiator.set_caps(pad, caps)?;
            }
        }

        Ok(Self {
            opts,
            first,
            second,
            negotiator,
            computer: None,
            stats: StatsAccumulator::new(),
            state: SessionState::Idle,
            processed: 0,
            listener: None,
        })
    }

    /// Register a callback receiving the final statistics at end-of-stream.
    pub fn on_results(mut self, f: impl FnOnce(&SsimStats) + Send + 'static) -> Self {
        self.listener = Some(Box::new(f));
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Running statistics, readable at any time.
    pub fn results(&self) -> SsimStats {
        self.stats.snapshot()
    }

    /// Output caps once fixed.
    pub fn output_caps(&self) -> Option<Caps> {
        self.negotiator.output_caps()
    }

    /// Pairs compared so far. Always equals `results().count`, including pairs whose
    /// visualization the sink rejected.
    pub fn frames_processed(&self) -> u64 {
        self.processed
    }

    /// Pull and process one pair.
    ///
    /// Once the session is drained or failed every call returns
    /// [`XssimError::SessionClosed`] without touching the sources.
    #[tracing::instrument(level = "debug", skip_all, fields(pair = self.processed))]
    pub fn next(&mut self, sink: &mut dyn VisSink) -> XssimResult<Step> {
        match self.state {
            SessionState::Drained => {
                return Err(XssimError::session_closed("stream already drained"));
            }
            SessionState::Failed => {
                return Err(XssimError::session_closed("session failed earlier"));
            }
            SessionState::Idle | SessionState::Streaming => {}
        }

        let res = self.step(sink);
        if res.is_err() {
            self.state = SessionState::Failed;
        }
        res
    }

    /// Drive the session to end-of-stream and return the final statistics.
    pub fn run(&mut self, sink: &mut dyn VisSink) -> XssimResult<SsimStats> {
        loop {
            if let Step::Done(stats) = self.next(sink)? {
                return Ok(stats);
            }
        }
    }

    fn step(&mut self, sink: &mut dyn VisSink) -> XssimResult<Step> {
        let a = self.first.next_frame()?;
        let b = self.second.next_frame()?;

        match (a, b) {
            (Some(a), Some(b)) => self.process(a, b, sink),
            (None, None) => self.finish(sink),
            (a, _) => {
                let exhausted = if a.is_some() {
                    InputPad::Second
                } else {
                    InputPad::First
                };
                tracing::warn!(
                    %exhausted,
                    pairs = self.processed,
                    "input ended before the other; treating as end-of-stream"
                );
                self.finish(sink)
            }
        }
    }

    fn process(&mut self, a: LumaFrame, b: LumaFrame, sink: &mut dyn VisSink) -> XssimResult<Step> {
        self.negotiator.check_pair(&a, &b, self.opts.default_fps)?;
        if self.state == SessionState::Idle {
            self.start(sink)?;
        }

        let computer = self
            .computer
            .as_mut()
            .ok_or_else(|| XssimError::evaluation("ssim computer missing while streaming"))?;
        let (ssim, vis) = computer.compute_frames(&a, &b)?;
        drop((a, b));

        let index = self.processed;
        self.stats.record(ssim);
        self.processed += 1;
        tracing::debug!(pair = index, ssim, "SSIM computed");

        sink.push_frame(index, &vis)?;
        Ok(Step::Continue { index, ssim })
    }

    fn start(&mut self, sink: &mut dyn VisSink) -> XssimResult<()> {
        let caps = self
            .negotiator
            .output_caps()
            .ok_or_else(|| XssimError::evaluation("output caps not fixed before streaming"))?;

        let computer = if self.opts.parallel {
            SsimComputer::with_threads(caps.width, caps.height, self.opts.threads)?
        } else {
            SsimComputer::new(caps.width, caps.height)?
        };
        self.computer = Some(computer);

        sink.begin(caps)?;
        self.state = SessionState::Streaming;
        Ok(())
    }

    fn finish(&mut self, sink: &mut dyn VisSink) -> XssimResult<Step> {
        self.state = SessionState::Drained;
        let stats = self.stats.snapshot();
        tracing::info!(
            avg = stats.avg,
            min = stats.min,
            max = stats.max,
            frames = stats.count,
            "end of stream"
        );

        sink.end()?;
        if let Some(listener) = self.listener.take() {
            listener(&stats);
        }
        Ok(Step::Done(stats))
    }
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
