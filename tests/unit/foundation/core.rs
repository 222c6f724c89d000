use super::*;

#[test]
fn extent_rejects_zero() {
    assert!(Extent::new(0, 4).is_err());
    assert!(Extent::new(4, 0).is_err());
    assert_eq!(Extent::new(3, 2).unwrap().texel_count(), 6);
}

#[test]
fn extent_index_bounds() {
    let e = Extent::new(4, 2).unwrap();
    assert_eq!(e.index_of(0, 0), Some(0));
    assert_eq!(e.index_of(3, 1), Some(7));
    assert_eq!(e.index_of(4, 0), None);
    assert_eq!(e.index_of(-1, 0), None);
    assert_eq!(e.index_of(0, 2), None);
}

#[test]
fn unorm8_conversion_is_exact_at_endpoints() {
    assert_eq!(Rgba([1.0, 0.0, 0.0, 1.0]).to_unorm8(), [255, 0, 0, 255]);
    assert_eq!(Rgba([2.0, -1.0, 0.5, f32::NAN]).to_unorm8(), [255, 0, 128, 0]);
}

#[test]
fn unorm8_round_trips_through_float() {
    for c in [0u8, 1, 127, 128, 254, 255] {
        let px = [c, c, c, c];
        assert_eq!(Rgba::from_unorm8(px).to_unorm8(), px);
    }
}
