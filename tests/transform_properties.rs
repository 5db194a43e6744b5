use proptest::prelude::*;
use shellscan::transform::{inverse, transform, ProportionTransform, ScaleParameters};

proptest! {
    #[test]
    fn round_trip_is_identity(p in 0.0f64..=1.0, n in 2usize..5000) {
        let back = inverse(transform(p, n).unwrap(), n).unwrap();
        prop_assert!((back - p).abs() < 1e-9, "p = {}, n = {}, back = {}", p, n, back);
    }

    #[test]
    fn transformed_values_stay_in_open_interval(p in 0.0f64..=1.0, n in 2usize..100_000) {
        let p_star = transform(p, n).unwrap();
        prop_assert!(p_star > 0.0 && p_star < 1.0);
    }

    #[test]
    fn order_is_preserved(a in 0.0f64..=1.0, b in 0.0f64..=1.0, n in 2usize..1000) {
        prop_assume!(a != b);
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let t = ProportionTransform::new(n).unwrap();
        prop_assert!(t.transform(low).unwrap() < t.transform(high).unwrap());
    }

    #[test]
    fn out_of_range_proportions_rejected(p in prop_oneof![-10.0f64..-1e-9, 1.0 + 1e-9..10.0f64]) {
        prop_assert!(transform(p, 10).is_err());
    }

    #[test]
    fn inverse_then_transform_is_identity(p_star in 0.0f64..=1.0, n in 2usize..5000) {
        let t = ProportionTransform::new(n).unwrap();
        let p = t.inverse(p_star).unwrap();
        // The inverse may leave [0, 1] for p* outside the image of [0, 1]
        prop_assume!((0.0..=1.0).contains(&p));
        prop_assert!((t.transform(p).unwrap() - p_star).abs() < 1e-9);
    }

    #[test]
    fn scaling_round_trip(
        mean in -100.0f64..100.0,
        sd in 0.01f64..50.0,
        x in -1000.0f64..1000.0,
    ) {
        let params = ScaleParameters::new(mean, sd).unwrap();
        let back = params.unscale(params.scale(x));
        prop_assert!((back - x).abs() < 1e-9 * (1.0 + x.abs()));
    }
}
