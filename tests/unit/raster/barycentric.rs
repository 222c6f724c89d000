use super::*;

fn tri() -> EdgeEvaluator {
    EdgeEvaluator::new([0.0, 0.0], [4.0, 0.0], [0.0, 4.0]).unwrap()
}

#[test]
fn corners_and_centroid() {
    let e = tri();
    assert_eq!(e.weights([0.0, 0.0]), [1.0, 0.0, 0.0]);
    assert_eq!(e.weights([4.0, 0.0]), [0.0, 1.0, 0.0]);
    assert_eq!(e.weights([0.0, 4.0]), [0.0, 0.0, 1.0]);

    let c = e.weights([4.0 / 3.0, 4.0 / 3.0]);
    for w in c {
        assert!((w - 1.0 / 3.0).abs() < 1e-12);
    }
    assert!(EdgeEvaluator::inside(c));
    assert!(!EdgeEvaluator::inside(e.weights([3.0, 3.0])));
}

#[test]
fn winding_does_not_matter() {
    let cw = EdgeEvaluator::new([0.0, 0.0], [0.0, 4.0], [4.0, 0.0]).unwrap();
    let w = cw.weights([1.0, 1.0]);
    assert!(EdgeEvaluator::inside(w));
    assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
}

#[test]
fn degenerate_triangles_are_rejected() {
    assert!(EdgeEvaluator::new([0.0, 0.0], [1.0, 1.0], [2.0, 2.0]).is_none());
    assert!(EdgeEvaluator::new([0.0, 0.0], [0.0, 0.0], [1.0, 0.0]).is_none());
    assert!(EdgeEvaluator::new([0.0, 0.0], [f64::NAN, 0.0], [1.0, 0.0]).is_none());
}

#[test]
fn row_matches_pointwise_weights() {
    let e = EdgeEvaluator::new([0.5, 0.25], [7.0, 1.5], [2.0, 6.5]).unwrap();
    let xs = [0.5, 1.5, 2.5, 3.5, 4.5];
    let mut out = Vec::new();
    e.row(2.5, xs, &mut out);
    assert_eq!(out.len(), xs.len());
    for (x, row) in xs.iter().zip(&out) {
        let point = e.weights([*x, 2.5]);
        for i in 0..3 {
            assert!((point[i] - row[i]).abs() < 1e-12);
        }
    }
}

#[test]
fn perspective_correction_pulls_toward_near_corner() {
    let (w, one_over_w) = perspective_correct([0.5, 0.5, 0.0], [1.0, 0.5, 1.0]);
    assert!((one_over_w - 0.75).abs() < 1e-12);
    assert!((w[0] - 2.0 / 3.0).abs() < 1e-6);
    assert!((w[1] - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(w[2], 0.0);

    let (same, _) = perspective_correct([0.2, 0.3, 0.5], [0.5, 0.5, 0.5]);
    assert!((same[0] - 0.2).abs() < 1e-6);
    assert!((same[2] - 0.5).abs() < 1e-6);
}

#[test]
fn corner_weights_pass_through_unchanged() {
    let (w, one_over_w) = perspective_correct([0.0, 1.0, 0.0], [1.0, 0.25, 1.0]);
    assert_eq!(w, [0.0, 1.0, 0.0]);
    assert_eq!(one_over_w, 0.25);
}
