use super::*;

#[test]
fn fps_rejects_zero_den() {
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::new(0, 1).is_ok());
}

#[test]
fn fps_parses_integer_and_rational() {
    assert_eq!("25".parse::<Fps>().unwrap(), Fps { num: 25, den: 1 });
    assert_eq!(
        "30000/1001".parse::<Fps>().unwrap(),
        Fps {
            num: 30000,
            den: 1001
        }
    );
    assert!("30/0".parse::<Fps>().is_err());
    assert!("abc".parse::<Fps>().is_err());
}

#[test]
fn frame_duration_is_none_for_unknown_rate() {
    assert_eq!(Fps::new(0, 1).unwrap().frame_duration_ns(), None);
    assert_eq!(
        Fps::new(25, 1).unwrap().frame_duration_ns(),
        Some(40_000_000)
    );
}

#[test]
fn meta_for_index_scales_pts() {
    let m = FrameMeta::for_index(3, Fps::new(25, 1).unwrap());
    assert_eq!(m.pts_ns, Some(120_000_000));
    assert_eq!(m.duration_ns, Some(40_000_000));
}

#[test]
fn i420_frame_len_rounds_chroma_up() {
    assert_eq!(PixelFormat::Gray8.frame_len(5, 3), 15);
    // 5x3 luma + 2 * (3x2) chroma
    assert_eq!(PixelFormat::I420.frame_len(5, 3), 27);
}

#[test]
fn round_up_4_behaves() {
    assert_eq!(round_up_4(0), 0);
    assert_eq!(round_up_4(1), 4);
    assert_eq!(round_up_4(16), 16);
    assert_eq!(round_up_4(17), 20);
}
