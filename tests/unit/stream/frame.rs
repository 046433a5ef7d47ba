use super::*;

#[test]
fn new_validates_layout() {
    assert!(LumaFrame::new(0, 4, 4, vec![0; 16], FrameMeta::default()).is_err());
    assert!(LumaFrame::new(4, 4, 3, vec![0; 16], FrameMeta::default()).is_err());
    assert!(LumaFrame::new(4, 4, 8, vec![0; 27], FrameMeta::default()).is_err());
    // last row does not need the stride padding
    assert!(LumaFrame::new(4, 4, 8, vec![0; 28], FrameMeta::default()).is_ok());
}

#[test]
fn row_skips_stride_padding() {
    let data: Vec<u8> = (0..12).collect();
    let f = LumaFrame::new(2, 2, 6, data, FrameMeta::default()).unwrap();
    assert_eq!(f.row(0), &[0, 1]);
    assert_eq!(f.row(1), &[6, 7]);
}

#[test]
fn vis_to_packed_drops_padding() {
    let vis = VisFrame {
        width: 2,
        height: 2,
        stride: 4,
        data: vec![1, 2, 0, 0, 3, 4, 0, 0],
        meta: FrameMeta::default(),
    };
    assert_eq!(vis.to_packed(), vec![1, 2, 3, 4]);
}
