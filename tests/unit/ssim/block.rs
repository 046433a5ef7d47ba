use super::*;

#[test]
fn constants_match_rounded_values() {
    assert_eq!(SSIM_C1, 416);
    assert_eq!(SSIM_C2, 235_963);
}

#[test]
fn core_sums_two_blocks() {
    // 8x4 image: left block all 1s, right block all 2s; B is A + 1.
    let stride = 8;
    let a: Vec<u8> = (0..4)
        .flat_map(|_| [1u8, 1, 1, 1, 2, 2, 2, 2])
        .collect();
    let b: Vec<u8> = a.iter().map(|v| v + 1).collect();

    let mut out = [BlockSums::default(); 2];
    ssim_4x4x2_core(&a, 0, stride, &b, 0, stride, &mut out);

    assert_eq!(
        out[0],
        BlockSums {
            s1: 16,
            s2: 32,
            ss: 16 * (1 + 4),
            s12: 16 * 2,
        }
    );
    assert_eq!(
        out[1],
        BlockSums {
            s1: 32,
            s2: 48,
            ss: 16 * (4 + 9),
            s12: 16 * 6,
        }
    );
}

#[test]
fn core_single_slot_skips_second_block() {
    // Only 4 columns exist; a single output slot must not touch columns 4..8.
    let a = vec![7u8; 16];
    let mut out = [BlockSums::default(); 1];
    ssim_4x4x2_core(&a, 0, 4, &a, 0, 4, &mut out);
    assert_eq!(out[0].s1, 7 * 16);
}

#[test]
fn end1_is_one_for_identical_windows() {
    // Identical non-constant content: s1 == s2 and ss/s12 consistent.
    let vals: Vec<u32> = (0..64).map(|i| (i * 37 % 251) as u32).collect();
    let s: u32 = vals.iter().sum();
    let sq: u32 = vals.iter().map(|v| v * v).sum();
    let w = BlockSums {
        s1: s,
        s2: s,
        ss: 2 * sq,
        s12: sq,
    };
    assert_eq!(ssim_end1(w), 1.0);
}

#[test]
fn end1_is_small_for_black_vs_white() {
    let w = BlockSums {
        s1: 0,
        s2: 64 * 255,
        ss: 64 * 255 * 255,
        s12: 0,
    };
    assert!(ssim_end1(w) < 0.01);
}

#[test]
fn end4_sums_window_values() {
    let blk = BlockSums {
        s1: 16 * 100,
        s2: 16 * 100,
        ss: 2 * 16 * 100 * 100,
        s12: 16 * 100 * 100,
    };
    let upper = [blk; 4];
    let lower = [blk; 4];
    let mut out = [0.0f32; 3];
    let total = ssim_end4(&upper, &lower, &mut out);
    assert_eq!(out, [1.0, 1.0, 1.0]);
    assert_eq!(total, 3.0);
}
