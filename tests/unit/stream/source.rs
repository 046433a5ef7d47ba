use super::*;

use std::io::Cursor;

use crate::foundation::core::PixelFormat;

#[test]
fn in_memory_counts_pulls() {
    let mut s = InMemorySource::new([LumaFrame::filled(8, 8, 0)]);
    assert!(s.next_frame().unwrap().is_some());
    assert!(s.next_frame().unwrap().is_none());
    assert_eq!(s.pulled(), 2);
    assert_eq!(s.remaining(), 0);
    assert_eq!(s.caps(), None);
}

#[test]
fn raw_gray_yields_frames_with_meta() {
    let caps = Caps::gray(4, 2, Fps::new(25, 1).unwrap());
    let bytes: Vec<u8> = (0..16).collect();
    let mut src = RawSource::from_reader(Cursor::new(bytes), caps).unwrap();

    let f0 = src.next_frame().unwrap().unwrap();
    assert_eq!(f0.data(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(f0.meta().pts_ns, Some(0));

    let f1 = src.next_frame().unwrap().unwrap();
    assert_eq!(f1.row(1), &[12, 13, 14, 15]);
    assert_eq!(f1.meta().pts_ns, Some(40_000_000));

    assert!(src.next_frame().unwrap().is_none());
    assert!(src.next_frame().unwrap().is_none());
    assert_eq!(src.frames_read(), 2);
}

#[test]
fn raw_i420_drops_chroma() {
    let caps = Caps {
        width: 4,
        height: 2,
        fps: Fps::default(),
        format: PixelFormat::I420,
    };
    // luma 8 bytes, then 2x1 U and 2x1 V
    let mut bytes = vec![10u8; 8];
    bytes.extend_from_slice(&[200, 201, 202, 203]);
    bytes.extend(vec![20u8; 8]);
    bytes.extend_from_slice(&[210, 211, 212, 213]);

    let mut src = RawSource::from_reader(Cursor::new(bytes), caps).unwrap();
    assert_eq!(src.next_frame().unwrap().unwrap().data(), &[10u8; 8]);
    assert_eq!(src.next_frame().unwrap().unwrap().data(), &[20u8; 8]);
    assert!(src.next_frame().unwrap().is_none());
}

#[test]
fn raw_partial_trailing_frame_ends_stream() {
    let caps = Caps::gray(4, 2, Fps::default());
    let mut src = RawSource::from_reader(Cursor::new(vec![1u8; 11]), caps).unwrap();
    assert!(src.next_frame().unwrap().is_some());
    assert!(src.next_frame().unwrap().is_none());
}

#[test]
fn raw_rejects_empty_geometry() {
    let caps = Caps::gray(0, 2, Fps::default());
    assert!(RawSource::from_reader(Cursor::new(Vec::<u8>::new()), caps).is_err());
}

#[test]
fn raw_open_reports_missing_file() {
    let caps = Caps::gray(8, 8, Fps::default());
    let err = RawSource::open("target/does-not-exist.yuv", caps)
        .err()
        .unwrap();
    assert!(matches!(err, XssimError::Io(_)));
}
