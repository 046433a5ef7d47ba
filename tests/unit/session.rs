use super::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::foundation::core::{FrameMeta, PixelFormat};
use crate::stream::frame::VisFrame;
use crate::stream::sink::InMemorySink;
use crate::stream::source::InMemorySource;

struct CountingSource {
    inner: InMemorySource,
    pulls: Arc<AtomicUsize>,
}

impl FrameSource for CountingSource {
    fn next_frame(&mut self) -> XssimResult<Option<LumaFrame>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.inner.next_frame()
    }

    fn caps(&self) -> Option<Caps> {
        self.inner.caps()
    }
}

fn counting(frames: Vec<LumaFrame>) -> (Box<dyn FrameSource>, Arc<AtomicUsize>) {
    let pulls = Arc::new(AtomicUsize::new(0));
    let src = CountingSource {
        inner: InMemorySource::new(frames),
        pulls: Arc::clone(&pulls),
    };
    (Box::new(src), pulls)
}

fn boxed(frames: Vec<LumaFrame>) -> Box<dyn FrameSource> {
    Box::new(InMemorySource::new(frames))
}

#[test]
fn identical_streams_score_one_and_drain() {
    let frames = vec![LumaFrame::filled(16, 16, 128); 3];
    let mut sess =
        SsimSession::new(boxed(frames.clone()), boxed(frames), SessionOpts::default()).unwrap();
    let mut sink = InMemorySink::new();

    assert_eq!(sess.state(), SessionState::Idle);
    let step = sess.next(&mut sink).unwrap();
    assert!(matches!(step, Step::Continue { index: 0, .. }));
    assert_eq!(sess.state(), SessionState::Streaming);

    let stats = sess.run(&mut sink).unwrap();
    assert_eq!(stats.count, 3);
    assert!((stats.avg - 1.0).abs() < 1e-9);
    assert_eq!(sess.state(), SessionState::Drained);

    assert_eq!(sink.frames().len(), 3);
    assert_eq!(sink.end_count(), 1);
    assert_eq!(sink.caps().unwrap().format, PixelFormat::Gray8);
    assert_eq!(sink.caps().unwrap().fps, Fps::default());
}

#[test]
fn visualization_carries_second_input_meta() {
    let meta_a = FrameMeta {
        pts_ns: Some(1),
        duration_ns: Some(2),
        flags: 3,
    };
    let meta_b = FrameMeta {
        pts_ns: Some(100),
        duration_ns: Some(200),
        flags: 7,
    };
    let a = LumaFrame::filled(18, 10, 50).with_meta(meta_a);
    let b = LumaFrame::filled(18, 10, 60).with_meta(meta_b);

    let mut sess =
        SsimSession::new(boxed(vec![a]), boxed(vec![b]), SessionOpts::default()).unwrap();
    let mut sink = InMemorySink::new();
    sess.run(&mut sink).unwrap();

    let (idx, vis) = &sink.frames()[0];
    assert_eq!(*idx, 0);
    assert_eq!(vis.meta, meta_b);
    assert_eq!((vis.width, vis.height, vis.stride), (18, 10, 20));
    assert_eq!(vis.data.len(), 20 * 10);
}

#[test]
fn width_change_fails_and_stops_pulling() {
    let a = vec![
        LumaFrame::filled(16, 16, 10),
        LumaFrame::filled(24, 16, 10),
        LumaFrame::filled(16, 16, 10),
    ];
    let (first, pulls_a) = counting(a.clone());
    let (second, pulls_b) = counting(a);

    let mut sess = SsimSession::new(first, second, SessionOpts::default()).unwrap();
    let mut sink = InMemorySink::new();

    assert!(sess.next(&mut sink).is_ok());
    let err = sess.next(&mut sink).unwrap_err();
    assert!(matches!(err, XssimError::DimensionMismatch { .. }));
    assert_eq!(sess.state(), SessionState::Failed);

    let pulled = (pulls_a.load(Ordering::SeqCst), pulls_b.load(Ordering::SeqCst));
    assert!(matches!(
        sess.next(&mut sink),
        Err(XssimError::SessionClosed(_))
    ));
    assert_eq!(
        (pulls_a.load(Ordering::SeqCst), pulls_b.load(Ordering::SeqCst)),
        pulled
    );
    assert_eq!(sink.frames().len(), 1);
    assert_eq!(sink.end_count(), 0);
    assert_eq!(sess.results().count, 1);
}

#[test]
fn asymmetric_exhaustion_drains_once() {
    let (first, pulls_a) = counting(vec![LumaFrame::filled(16, 16, 0); 2]);
    let (second, pulls_b) = counting(vec![LumaFrame::filled(16, 16, 0); 1]);

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&delivered);
    let mut sess = SsimSession::new(first, second, SessionOpts::default())
        .unwrap()
        .on_results(move |s| sink_log.lock().unwrap().push(*s));
    let mut sink = InMemorySink::new();

    assert!(matches!(
        sess.next(&mut sink).unwrap(),
        Step::Continue { .. }
    ));
    let done = sess.next(&mut sink).unwrap();
    let Step::Done(stats) = done else {
        panic!("expected Done, got {done:?}");
    };
    assert_eq!(stats.count, 1);
    assert_eq!(sess.state(), SessionState::Drained);

    // No further pulls, no second delivery.
    assert!(matches!(
        sess.next(&mut sink),
        Err(XssimError::SessionClosed(_))
    ));
    assert_eq!(pulls_a.load(Ordering::SeqCst), 2);
    assert_eq!(pulls_b.load(Ordering::SeqCst), 2);
    assert_eq!(delivered.lock().unwrap().as_slice(), &[stats]);
    assert_eq!(sink.end_count(), 1);
}

#[test]
fn empty_inputs_drain_with_initial_stats() {
    let mut sess = SsimSession::new(boxed(vec![]), boxed(vec![]), SessionOpts::default()).unwrap();
    let mut sink = InMemorySink::new();
    let stats = sess.run(&mut sink).unwrap();
    assert_eq!(stats, SsimStats::default());
    assert_eq!(sink.caps(), None);
    assert_eq!(sink.end_count(), 1);
}

#[test]
fn caps_exchange_mismatch_fails_at_construction() {
    let fps = Fps::new(25, 1).unwrap();
    let first = InMemorySource::new(vec![]).with_caps(Caps::gray(16, 16, fps));
    let second = InMemorySource::new(vec![]).with_caps(Caps::gray(32, 16, fps));
    let err = SsimSession::new(Box::new(first), Box::new(second), SessionOpts::default())
        .err()
        .unwrap();
    assert!(matches!(err, XssimError::DimensionMismatch { .. }));
}

#[test]
fn caps_exchange_fps_reaches_sink() {
    let fps = Fps::new(24000, 1001).unwrap();
    let frames = vec![LumaFrame::filled(16, 16, 9)];
    let first = InMemorySource::new(frames.clone()).with_caps(Caps::gray(16, 16, fps));
    let second = InMemorySource::new(frames).with_caps(Caps::gray(16, 16, fps));
    let mut sess =
        SsimSession::new(Box::new(first), Box::new(second), SessionOpts::default()).unwrap();
    let mut sink = InMemorySink::new();
    sess.run(&mut sink).unwrap();
    assert_eq!(sink.caps().unwrap().fps, fps);
    assert_eq!(sess.output_caps().unwrap().fps, fps);
}

#[test]
fn pair_members_disagreeing_fail() {
    let mut sess = SsimSession::new(
        boxed(vec![LumaFrame::filled(16, 16, 0)]),
        boxed(vec![LumaFrame::filled(16, 20, 0)]),
        SessionOpts::default(),
    )
    .unwrap();
    let mut sink = InMemorySink::new();
    assert!(matches!(
        sess.next(&mut sink),
        Err(XssimError::DimensionMismatch { .. })
    ));
    assert_eq!(sess.state(), SessionState::Failed);
    assert!(sink.frames().is_empty());
}

#[test]
fn parallel_session_matches_sequential() {
    let frames_a: Vec<LumaFrame> = (0..3u8)
        .map(|i| {
            let data = (0..40 * 24).map(|p| ((p * 7 + i as usize * 13) % 256) as u8).collect();
            LumaFrame::packed(40, 24, data, FrameMeta::default()).unwrap()
        })
        .collect();
    let frames_b: Vec<LumaFrame> = (0..3u8)
        .map(|i| {
            let data = (0..40 * 24).map(|p| ((p * 5 + i as usize * 3) % 256) as u8).collect();
            LumaFrame::packed(40, 24, data, FrameMeta::default()).unwrap()
        })
        .collect();

    let run = |opts: SessionOpts| {
        let mut sess =
            SsimSession::new(boxed(frames_a.clone()), boxed(frames_b.clone()), opts).unwrap();
        let mut sink = InMemorySink::new();
        let stats = sess.run(&mut sink).unwrap();
        (stats, sink.frames().to_vec())
    };

    let seq = run(SessionOpts::default());
    let par = run(SessionOpts {
        parallel: true,
        threads: Some(2),
        ..SessionOpts::default()
    });
    assert_eq!(seq.0.avg.to_bits(), par.0.avg.to_bits());
    assert_eq!(seq.1, par.1);
}

#[test]
fn zero_threads_is_rejected() {
    let opts = SessionOpts {
        parallel: true,
        threads: Some(0),
        ..SessionOpts::default()
    };
    assert!(SsimSession::new(boxed(vec![]), boxed(vec![]), opts).is_err());
}

struct RejectingSink;

impl VisSink for RejectingSink {
    fn begin(&mut self, _caps: Caps) -> XssimResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, _index: u64, _frame: &VisFrame) -> XssimResult<()> {
        Err(XssimError::io("downstream refused the frame"))
    }

    fn end(&mut self) -> XssimResult<()> {
        Ok(())
    }
}

#[test]
fn rejected_frame_still_counts_consistently() {
    let frames = vec![LumaFrame::filled(16, 16, 40); 2];
    let mut sess =
        SsimSession::new(boxed(frames.clone()), boxed(frames), SessionOpts::default()).unwrap();

    let err = sess.next(&mut RejectingSink).unwrap_err();
    assert!(matches!(err, XssimError::Io(_)));
    assert_eq!(sess.state(), SessionState::Failed);
    assert_eq!(sess.results().count, 1);
    assert_eq!(sess.frames_processed(), sess.results().count);
}

#[test]
fn frames_processed_tracks_pairs() {
    let frames = vec![LumaFrame::filled(16, 16, 40); 3];
    let mut sess =
        SsimSession::new(boxed(frames.clone()), boxed(frames), SessionOpts::default()).unwrap();
    let mut sink = InMemorySink::new();
    assert_eq!(sess.frames_processed(), 0);
    sess.next(&mut sink).unwrap();
    assert_eq!(sess.frames_processed(), 1);
    let stats = sess.run(&mut sink).unwrap();
    assert_eq!(sess.frames_processed(), stats.count);
}
